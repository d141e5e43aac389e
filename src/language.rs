//! Article language codes passed explicitly through every call.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language used when a caller does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("de", "German"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("hi", "Hindi"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("tr", "Turkish"),
    ("zh", "Chinese"),
];

const MAX_CODE_LEN: usize = 16;

/// Encyclopedia edition code such as `en` or `zh-yue`.
///
/// Codes end up in host names, so only ASCII letters, digits and `-` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    /// Validates a language code.
    pub fn new(code: impl Into<String>) -> Result<Self, InvalidLanguage> {
        let code = code.into();
        let trimmed = code.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_CODE_LEN
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
            && !trimmed.starts_with('-')
            && !trimmed.ends_with('-');
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidLanguage(code))
        }
    }

    /// Parses an optional code, using `default` when absent or blank.
    pub fn or_default(code: Option<&str>, default: &Language) -> Result<Self, InvalidLanguage> {
        match code.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => Self::new(code),
            None => Ok(default.clone()),
        }
    }

    /// Raw language code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// English display name, or the code itself for unlisted languages.
    pub fn name(&self) -> &str {
        language_name(&self.0).unwrap_or(&self.0)
    }
}

impl Default for Language {
    fn default() -> Self {
        Self(DEFAULT_LANGUAGE.to_string())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Language {
    type Error = InvalidLanguage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.0
    }
}

/// Display name for a known language code.
pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGE_NAMES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

/// Languages offered in search forms, sorted by code.
pub fn known_languages() -> impl Iterator<Item = (&'static str, &'static str)> {
    LANGUAGE_NAMES.iter().copied()
}

/// A language code that cannot name an encyclopedia edition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLanguage(pub String);

impl fmt::Display for InvalidLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid language code '{}'", self.0)
    }
}

impl std::error::Error for InvalidLanguage {}
