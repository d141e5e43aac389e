//! Heading-driven partition of article blocks into titled sections.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use wiki_parser::{Block, BlockKind, BlockParseError, RawBlock};

/// Display title for the untitled lead section.
pub const INTRODUCTION: &str = "Introduction";

/// Heading titles that never open a section of their own.
pub const DEFAULT_BOILERPLATE_TITLES: &[&str] = &["See also", "References", "External links", "Notes"];

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const LIST_BULLET: &str = "• ";
const TABLE_LABEL: &str = "Table: ";
const TABLE_CELL_SEPARATOR: &str = " | ";

/// A titled span of article text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Heading text; empty for the lead section.
    pub title: String,
    /// Nesting level, 1 for top-level sections.
    pub level: u8,
    /// Accumulated body text.
    pub body: String,
}

impl Section {
    fn lead() -> Self {
        Self {
            title: String::new(),
            level: 1,
            body: String::new(),
        }
    }

    /// True for the untitled lead section.
    pub fn is_lead(&self) -> bool {
        self.title.is_empty()
    }

    /// Title suitable for display, `Introduction` for the lead.
    pub fn display_title(&self) -> &str {
        if self.is_lead() {
            INTRODUCTION
        } else {
            &self.title
        }
    }
}

/// Splitter tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Heading titles folded into the preceding section (exact, case-sensitive).
    pub boilerplate_titles: Vec<String>,
    /// Number of leading table rows rendered into the body.
    pub max_table_rows: usize,
    /// Highest section level emitted; deeper headings are clamped.
    pub max_level: u8,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            boilerplate_titles: DEFAULT_BOILERPLATE_TITLES
                .iter()
                .map(|title| title.to_string())
                .collect(),
            max_table_rows: 5,
            max_level: 9,
        }
    }
}

impl SplitterConfig {
    fn is_boilerplate_title(&self, title: &str) -> bool {
        self.boilerplate_titles.iter().any(|denied| denied == title)
    }

    /// `h2` and `== x ==` are the top level of an article body.
    fn section_level(&self, rank: u8) -> u8 {
        rank.saturating_sub(1).clamp(1, self.max_level.max(1))
    }
}

/// Stateless section splitter.
#[derive(Debug, Clone, Default)]
pub struct Splitter {
    config: SplitterConfig,
}

impl Splitter {
    /// Builds a splitter with the given config.
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    /// Returns the underlying config reference.
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Partitions blocks into sections in document order.
    ///
    /// Never returns an empty list: when every section is blank, a single lead
    /// section carries `fallback`, or the plain text of the blocks when no
    /// fallback is given.
    pub fn split(&self, blocks: &[Block], fallback: Option<&str>) -> Vec<Section> {
        let mut builder = SectionBuilder::new(&self.config);
        for block in blocks {
            builder.push(block);
        }
        let sections = builder.finish();
        if !sections.is_empty() {
            return sections;
        }
        let body = match fallback {
            Some(summary) => summary.to_string(),
            None => blocks
                .iter()
                .filter(|block| !block.boilerplate)
                .map(Block::plain_text)
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<_>>()
                .join(PARAGRAPH_SEPARATOR),
        };
        vec![Section {
            body,
            ..Section::lead()
        }]
    }

    /// Splits wire blocks, skipping any that fail validation.
    pub fn split_raw(&self, raw: Vec<RawBlock>, fallback: Option<&str>) -> Vec<Section> {
        self.split_valid(raw.into_iter().map(Block::try_from), fallback)
    }

    /// Splits an untyped JSON block array.
    ///
    /// Each element is decoded on its own, so a block with a mistyped field is
    /// skipped like any other malformed block.
    pub fn split_wire(&self, values: Vec<Value>, fallback: Option<&str>) -> Vec<Section> {
        self.split_valid(values.into_iter().map(Block::from_wire), fallback)
    }

    fn split_valid<I>(&self, parsed: I, fallback: Option<&str>) -> Vec<Section>
    where
        I: Iterator<Item = Result<Block, BlockParseError>>,
    {
        let blocks: Vec<Block> = parsed
            .enumerate()
            .filter_map(|(index, parsed)| match parsed {
                Ok(block) => Some(block),
                Err(err) => {
                    tracing::debug!(index, error = %err, "skipping malformed block");
                    None
                }
            })
            .collect();
        self.split(&blocks, fallback)
    }

    /// Splits plain article text with `== Heading ==` lines.
    pub fn split_text(&self, text: &str, fallback: Option<&str>) -> Vec<Section> {
        let blocks = wiki_parser::blocks_from_plain_text(text);
        self.split(&blocks, Some(fallback.unwrap_or(text)))
    }

    /// Splits article HTML.
    pub fn split_html(&self, html: &str, fallback: Option<&str>) -> Vec<Section> {
        let blocks = wiki_parser::extract_blocks(html);
        self.split(&blocks, fallback)
    }
}

struct SectionBuilder<'cfg> {
    config: &'cfg SplitterConfig,
    sections: Vec<Section>,
    by_title: HashMap<String, usize>,
    current: usize,
}

impl<'cfg> SectionBuilder<'cfg> {
    fn new(config: &'cfg SplitterConfig) -> Self {
        let mut by_title = HashMap::new();
        by_title.insert(INTRODUCTION.to_string(), 0);
        Self {
            config,
            sections: vec![Section::lead()],
            by_title,
            current: 0,
        }
    }

    fn push(&mut self, block: &Block) {
        if block.boilerplate {
            return;
        }
        match &block.kind {
            BlockKind::Heading { level, text } => self.open_section(*level, text.trim()),
            BlockKind::Paragraph { text } => {
                let text = text.trim();
                if !text.is_empty() {
                    self.append(text);
                    self.append(PARAGRAPH_SEPARATOR);
                }
            }
            BlockKind::List { items } => {
                let mut rendered = String::new();
                for item in items {
                    rendered.push_str(LIST_BULLET);
                    rendered.push_str(item.trim());
                    rendered.push('\n');
                }
                if !rendered.is_empty() {
                    rendered.push('\n');
                    self.append(&rendered);
                }
            }
            BlockKind::Table { layout: true, .. } => {}
            BlockKind::Table { rows, layout: false } => {
                let mut rendered = String::from(TABLE_LABEL);
                for row in rows.iter().take(self.config.max_table_rows) {
                    if row.is_empty() {
                        continue;
                    }
                    let cells: Vec<&str> = row.iter().map(|cell| cell.trim()).collect();
                    rendered.push_str(&cells.join(TABLE_CELL_SEPARATOR));
                    rendered.push('\n');
                }
                rendered.push('\n');
                self.append(&rendered);
            }
        }
    }

    fn open_section(&mut self, rank: u8, title: &str) {
        if title.is_empty() || self.config.is_boilerplate_title(title) {
            return;
        }
        if let Some(&index) = self.by_title.get(title) {
            self.current = index;
            return;
        }
        self.sections.push(Section {
            title: title.to_string(),
            level: self.config.section_level(rank),
            body: String::new(),
        });
        self.current = self.sections.len() - 1;
        self.by_title.insert(title.to_string(), self.current);
    }

    fn append(&mut self, text: &str) {
        self.sections[self.current].body.push_str(text);
    }

    fn finish(self) -> Vec<Section> {
        self.sections
            .into_iter()
            .filter(|section| !section.body.trim().is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn section(title: &str, level: u8, body: &str) -> Section {
        Section {
            title: title.to_string(),
            level,
            body: body.to_string(),
        }
    }

    #[test]
    fn text_without_headings_is_one_lead_section() {
        let splitter = Splitter::default();
        let sections = splitter.split_text("First paragraph.\nSecond paragraph.", None);
        assert_eq!(
            sections,
            vec![section("", 1, "First paragraph.\n\nSecond paragraph.\n\n")]
        );
        assert_eq!(sections[0].display_title(), INTRODUCTION);
    }

    #[test]
    fn boilerplate_heading_folds_into_previous_section() {
        let blocks = vec![
            Block::heading(2, "History"),
            Block::paragraph("h"),
            Block::heading(2, "References"),
            Block::paragraph("x"),
        ];
        assert_eq!(
            Splitter::default().split(&blocks, None),
            vec![section("History", 1, "h\n\nx\n\n")]
        );
    }

    #[test]
    fn repeated_title_accumulates_into_first_section() {
        let blocks = vec![
            Block::paragraph("lead"),
            Block::heading(2, "History"),
            Block::paragraph("one"),
            Block::heading(2, "Geography"),
            Block::paragraph("two"),
            Block::heading(3, "History"),
            Block::paragraph("three"),
        ];
        assert_eq!(
            Splitter::default().split(&blocks, None),
            vec![
                section("", 1, "lead\n\n"),
                section("History", 1, "one\n\nthree\n\n"),
                section("Geography", 1, "two\n\n"),
            ]
        );
    }

    #[test]
    fn renders_lists_and_tables() {
        let rows: Vec<Vec<String>> = (0..7)
            .map(|i| vec![format!("r{i}"), format!(" c{i} ")])
            .collect();
        let blocks = vec![
            Block::heading(2, "Data"),
            Block::list([" alpha ", "beta"]),
            Block::table(rows),
            Block::layout_table(vec![vec!["Born".into(), "1900".into()]]),
        ];
        assert_eq!(
            Splitter::default().split(&blocks, None),
            vec![section(
                "Data",
                1,
                "• alpha\n• beta\n\nTable: r0 | c0\nr1 | c1\nr2 | c2\nr3 | c3\nr4 | c4\n\n"
            )]
        );
    }

    #[test]
    fn skips_blocks_inside_boilerplate_containers() {
        let blocks = vec![
            Block::paragraph("Lead."),
            Block::list(["1 History", "2 Culture"]).in_boilerplate(),
            Block::heading(2, "Contents").in_boilerplate(),
            Block::paragraph("still lead"),
        ];
        assert_eq!(
            Splitter::default().split(&blocks, None),
            vec![section("", 1, "Lead.\n\nstill lead\n\n")]
        );
    }

    #[test]
    fn clamps_heading_levels() {
        let config = SplitterConfig {
            max_level: 3,
            ..SplitterConfig::default()
        };
        let blocks = vec![
            Block::heading(1, "Title"),
            Block::paragraph("a"),
            Block::heading(6, "Deep"),
            Block::paragraph("b"),
        ];
        assert_eq!(
            Splitter::new(config).split(&blocks, None),
            vec![section("Title", 1, "a\n\n"), section("Deep", 3, "b\n\n")]
        );
    }

    #[test]
    fn empty_heading_does_not_open_a_section() {
        let blocks = vec![
            Block::heading(2, "Early life"),
            Block::paragraph("a"),
            Block::heading(2, "   "),
            Block::paragraph("b"),
        ];
        assert_eq!(
            Splitter::default().split(&blocks, None),
            vec![section("Early life", 1, "a\n\nb\n\n")]
        );
    }

    #[test]
    fn introduction_heading_merges_into_lead() {
        let blocks = vec![
            Block::paragraph("a"),
            Block::heading(2, "Introduction"),
            Block::paragraph("b"),
        ];
        assert_eq!(
            Splitter::default().split(&blocks, None),
            vec![section("", 1, "a\n\nb\n\n")]
        );
    }

    #[test]
    fn never_returns_empty() {
        let splitter = Splitter::default();
        assert_eq!(
            splitter.split(&[], Some("A summary.")),
            vec![section("", 1, "A summary.")]
        );
        assert_eq!(splitter.split(&[], None), vec![section("", 1, "")]);
        assert_eq!(
            splitter.split(&[Block::heading(2, "Lonely")], None),
            vec![section("", 1, "Lonely")]
        );
        assert_eq!(splitter.split_text("   \n\n", None), vec![section("", 1, "   \n\n")]);
    }

    #[test]
    fn skips_malformed_wire_blocks() {
        let raw: Vec<RawBlock> = serde_json::from_str(
            r#"[
                {"kind": "heading", "level": 2, "text": "Plot"},
                {"kind": "paragraph"},
                {"kind": "marquee", "text": "ignored"},
                {"kind": "paragraph", "text": "Story."}
            ]"#,
        )
        .expect("raw blocks");
        assert_eq!(
            Splitter::default().split_raw(raw, None),
            vec![section("Plot", 1, "Story.\n\n")]
        );
    }

    #[test]
    fn mistyped_wire_block_is_skipped_not_fatal() {
        let values: Vec<Value> = serde_json::from_str(
            r#"[
                {"kind": "heading", "level": 2, "text": "Plot"},
                {"kind": "paragraph", "text": 5},
                {"kind": "heading", "level": "two", "text": "Cast"},
                {"kind": "list", "items": [null]},
                {"kind": "paragraph", "text": "Story."}
            ]"#,
        )
        .expect("json array");
        assert_eq!(
            Splitter::default().split_wire(values, None),
            vec![section("Plot", 1, "Story.\n\n")]
        );
    }

    #[test]
    fn custom_deny_list_is_exact_and_case_sensitive() {
        let config = SplitterConfig {
            boilerplate_titles: vec!["Trivia".to_string()],
            ..SplitterConfig::default()
        };
        let blocks = vec![
            Block::heading(2, "trivia"),
            Block::paragraph("kept"),
            Block::heading(2, "Trivia"),
            Block::paragraph("folded"),
        ];
        assert_eq!(
            Splitter::new(config).split(&blocks, None),
            vec![section("trivia", 1, "kept\n\nfolded\n\n")]
        );
    }

    #[test]
    fn splitting_is_deterministic() {
        let html = r#"<div id="mw-content-text"><p>Lead</p><h2>A</h2><p>x</p></div>"#;
        let splitter = Splitter::default();
        assert_eq!(splitter.split_html(html, None), splitter.split_html(html, None));
    }
}
