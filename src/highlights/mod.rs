//! Collaborative highlights: article keys, stored records and their overlay onto text.

use crate::language::{InvalidLanguage, Language};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

mod guarded;
pub mod overlay;
pub mod store;

pub use guarded::GuardedStore;
pub use overlay::{annotate, Overlay};
pub use store::{
    group_by_article, ArticleHighlights, HighlightBackend, HighlightMap, HighlightStore,
    JsonFileBackend, LanguageHighlights, MemoryBackend,
};

/// Context value that turns an append request into a read.
pub const RETRIEVE_ONLY_CONTEXT: &str = "retrieve_only";

const KEY_SEPARATOR: char = '_';

/// Identity of one article edition's highlight bucket.
///
/// Serialized as `"{title}_{lang}"`. Parsing splits on the last `_`, so a title
/// that itself ends in `_xx` cannot be told apart from a language suffix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArticleKey {
    title: String,
    language: Language,
}

impl ArticleKey {
    /// Builds a key from a title (whitespace collapsed) and language.
    pub fn new(title: &str, language: Language) -> Result<Self, ValidationError> {
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            return Err(ValidationError::EmptyArticleKey);
        }
        Ok(Self { title, language })
    }

    /// Parses a `"{title}_{lang}"` key.
    ///
    /// A key without any `_` is a bare title in the default language.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::EmptyArticleKey);
        }
        match raw.rsplit_once(KEY_SEPARATOR) {
            Some((title, code)) => {
                let language = Language::new(code).map_err(ValidationError::Language)?;
                Self::new(title, language)
            }
            None => Self::new(raw, Language::default()),
        }
    }

    /// Article title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Article language.
    pub fn language(&self) -> &Language {
        &self.language
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.title, self.language)
    }
}

/// One highlighted passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Trimmed highlighted text.
    pub text: String,
    /// Free-form label such as the section title; empty when none was given.
    #[serde(default)]
    pub context: String,
    /// Creation time in epoch seconds.
    #[serde(rename = "timestamp", default, deserialize_with = "epoch_seconds")]
    pub created_at: i64,
}

/// Older stores wrote fractional epoch seconds.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Epoch {
        Whole(i64),
        Fractional(f64),
    }

    Ok(match Epoch::deserialize(deserializer)? {
        Epoch::Whole(seconds) => seconds,
        Epoch::Fractional(seconds) => seconds.trunc() as i64,
    })
}

/// Errors surfaced by highlight operations.
#[derive(Debug)]
pub enum HighlightError {
    /// Request rejected before touching the store.
    Validation(ValidationError),
    /// Persistence failed.
    Storage(StorageError),
}

impl fmt::Display for HighlightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid highlight request: {err}"),
            Self::Storage(err) => write!(f, "highlight storage failed: {err}"),
        }
    }
}

impl std::error::Error for HighlightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<ValidationError> for HighlightError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<StorageError> for HighlightError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

/// Input rejected before any store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Article key was blank.
    EmptyArticleKey,
    /// Highlight text was blank after trimming.
    EmptyText,
    /// Language suffix of the key is not a valid code.
    Language(InvalidLanguage),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyArticleKey => write!(f, "article key is required"),
            Self::EmptyText => write!(f, "highlight text must not be empty"),
            Self::Language(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Language(err) => Some(err),
            Self::EmptyArticleKey | Self::EmptyText => None,
        }
    }
}

/// Persistence failures.
#[derive(Debug)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The store could not be serialized.
    Serialize(serde_json::Error),
    /// The operation did not finish within the configured bound.
    Timeout(Duration),
    /// A backend lock was poisoned by a panicking writer.
    Poisoned,
    /// The blocking task running the operation failed.
    Task(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error on {}: {source}", path.display()),
            Self::Serialize(err) => write!(f, "failed to serialize highlights: {err}"),
            Self::Timeout(limit) => write!(f, "store operation exceeded {}ms", limit.as_millis()),
            Self::Poisoned => write!(f, "highlight backend lock poisoned"),
            Self::Task(reason) => write!(f, "store task failed: {reason}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::Timeout(_) | Self::Poisoned | Self::Task(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lang(code: &str) -> Language {
        Language::new(code).expect("valid language")
    }

    #[test]
    fn key_round_trips_through_display() {
        let key = ArticleKey::new("  Jack   Sparrow ", lang("fr")).expect("key");
        assert_eq!(key.to_string(), "Jack Sparrow_fr");
        assert_eq!(ArticleKey::parse(&key.to_string()), Ok(key));
    }

    #[test]
    fn parse_splits_on_last_separator() {
        let key = ArticleKey::parse("Jack_Sparrow_en").expect("key");
        assert_eq!(key.title(), "Jack_Sparrow");
        assert_eq!(key.language().code(), "en");

        // A title ending in `_de` reads as a German key.
        let ambiguous = ArticleKey::parse("Rue_de").expect("key");
        assert_eq!(ambiguous.title(), "Rue");
        assert_eq!(ambiguous.language().code(), "de");
    }

    #[test]
    fn bare_title_uses_default_language() {
        let key = ArticleKey::parse("Rust").expect("key");
        assert_eq!(key.title(), "Rust");
        assert_eq!(key.language(), &Language::default());
    }

    #[test]
    fn rejects_blank_keys() {
        assert_eq!(ArticleKey::parse("   "), Err(ValidationError::EmptyArticleKey));
        assert_eq!(ArticleKey::parse("_en"), Err(ValidationError::EmptyArticleKey));
        assert!(matches!(
            ArticleKey::parse("Rust_"),
            Err(ValidationError::Language(_))
        ));
    }

    #[test]
    fn reads_fractional_and_missing_fields() {
        let legacy: Highlight =
            serde_json::from_str(r#"{"text": "a", "timestamp": 1700000000.75}"#).expect("legacy");
        assert_eq!(
            legacy,
            Highlight {
                text: "a".into(),
                context: String::new(),
                created_at: 1_700_000_000,
            }
        );
        let json = serde_json::to_value(&legacy).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"text": "a", "context": "", "timestamp": 1_700_000_000})
        );
    }
}
