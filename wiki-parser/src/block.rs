//! Block contract handed from the article parsers to the section splitter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt;

/// A structured block of extracted article content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Block payload.
    #[serde(flatten)]
    pub kind: BlockKind,
    /// Set when the block sits inside a table of contents, reference list or navigation box.
    pub boilerplate: bool,
}

/// Block payload by element kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    /// Heading with its rank (`h2` / `== x ==` is rank 2).
    Heading {
        /// Heading rank as written in the source.
        level: u8,
        /// Visible heading text.
        text: String,
    },
    /// Running paragraph text.
    Paragraph {
        /// Collapsed paragraph text.
        text: String,
    },
    /// Bulleted or numbered list.
    List {
        /// Item texts in document order.
        items: Vec<String>,
    },
    /// Data or layout table.
    Table {
        /// Cell texts per row.
        rows: Vec<Vec<String>>,
        /// Infobox, navigation or message-box table that carries no article prose.
        layout: bool,
    },
}

impl Block {
    /// Heading block at the given rank.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::from_kind(BlockKind::Heading {
            level,
            text: text.into(),
        })
    }

    /// Paragraph block.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::from_kind(BlockKind::Paragraph { text: text.into() })
    }

    /// List block.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_kind(BlockKind::List {
            items: items.into_iter().map(Into::into).collect(),
        })
    }

    /// Content table block.
    pub fn table(rows: Vec<Vec<String>>) -> Self {
        Self::from_kind(BlockKind::Table {
            rows,
            layout: false,
        })
    }

    /// Layout table block (infobox, navbox, metadata).
    pub fn layout_table(rows: Vec<Vec<String>>) -> Self {
        Self::from_kind(BlockKind::Table { rows, layout: true })
    }

    /// Marks the block as living inside a boilerplate container.
    pub fn in_boilerplate(mut self) -> Self {
        self.boilerplate = true;
        self
    }

    fn from_kind(kind: BlockKind) -> Self {
        Self {
            kind,
            boilerplate: false,
        }
    }

    /// Plain-text rendering of the block, used for whole-article fallbacks.
    pub fn plain_text(&self) -> String {
        match &self.kind {
            BlockKind::Heading { text, .. } | BlockKind::Paragraph { text } => text.clone(),
            BlockKind::List { items } => items.join("\n"),
            BlockKind::Table { rows, .. } => rows
                .iter()
                .map(|row| row.join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Loosely-typed block as received over the wire from a content fetcher.
///
/// Every field except `kind` is optional here; [`Block::try_from`] checks that
/// the fields required by the kind are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    /// One of `heading`, `paragraph`, `list`, `table`.
    pub kind: String,
    /// Heading rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    /// Heading or paragraph text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// List item texts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
    /// Table rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<String>>>,
    /// Inside a table of contents, reference list or navigation box.
    #[serde(default, alias = "isBoilerplateContainer")]
    pub is_boilerplate_container: bool,
    /// Table classified as infobox/navigation/layout.
    #[serde(default, alias = "isLayout")]
    pub is_layout: bool,
}

impl Block {
    /// Validates one untyped wire block.
    ///
    /// Fields of the wrong JSON type fail this block only, so a caller walking a
    /// block array can skip it and keep the rest.
    pub fn from_wire(value: Value) -> Result<Self, BlockParseError> {
        let raw: RawBlock = serde_json::from_value(value)
            .map_err(|err| BlockParseError::Malformed(err.to_string()))?;
        Block::try_from(raw)
    }
}

impl TryFrom<RawBlock> for Block {
    type Error = BlockParseError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let kind = match raw.kind.trim().to_ascii_lowercase().as_str() {
            "heading" => {
                let level = raw.level.ok_or(BlockParseError::MissingField {
                    kind: "heading",
                    field: "level",
                })?;
                if level < 1 {
                    return Err(BlockParseError::InvalidLevel(level));
                }
                let text = raw.text.ok_or(BlockParseError::MissingField {
                    kind: "heading",
                    field: "text",
                })?;
                BlockKind::Heading {
                    level: u8::try_from(level).unwrap_or(u8::MAX),
                    text,
                }
            }
            "paragraph" => BlockKind::Paragraph {
                text: raw.text.ok_or(BlockParseError::MissingField {
                    kind: "paragraph",
                    field: "text",
                })?,
            },
            "list" => BlockKind::List {
                items: raw.items.ok_or(BlockParseError::MissingField {
                    kind: "list",
                    field: "items",
                })?,
            },
            "table" => BlockKind::Table {
                rows: raw.rows.ok_or(BlockParseError::MissingField {
                    kind: "table",
                    field: "rows",
                })?,
                layout: raw.is_layout,
            },
            _ => return Err(BlockParseError::UnknownKind(raw.kind)),
        };
        Ok(Block {
            kind,
            boilerplate: raw.is_boilerplate_container,
        })
    }
}

/// Errors surfaced while validating a wire block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockParseError {
    /// The `kind` tag is not one of the known block kinds.
    UnknownKind(String),
    /// A field required by the block kind was absent.
    MissingField {
        /// Block kind being parsed.
        kind: &'static str,
        /// Missing field name.
        field: &'static str,
    },
    /// Heading rank below 1.
    InvalidLevel(i64),
    /// The block is not an object, or a field has the wrong JSON type.
    Malformed(String),
}

impl fmt::Display for BlockParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(kind) => write!(f, "unknown block kind '{kind}'"),
            Self::MissingField { kind, field } => {
                write!(f, "{kind} block is missing '{field}'")
            }
            Self::InvalidLevel(level) => write!(f, "heading level {level} is below 1"),
            Self::Malformed(detail) => write!(f, "malformed block: {detail}"),
        }
    }
}

impl Error for BlockParseError {}
