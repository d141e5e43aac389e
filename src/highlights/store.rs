//! Append-only highlight store persisted as one JSON document.
//!
//! Every append is a read-modify-write of the whole document. Callers sharing a
//! store across threads or processes must serialize appends themselves; see
//! [`GuardedStore`](super::GuardedStore) for the in-process wrapper.

use super::{ArticleKey, Highlight, StorageError};
use crate::language::language_name;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Full store contents keyed by `"{title}_{lang}"`.
pub type HighlightMap = BTreeMap<String, Vec<Highlight>>;

/// Persistence substrate holding the serialized store.
pub trait HighlightBackend: Send + Sync {
    /// Returns the serialized store, or `None` when nothing was persisted yet.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replaces the serialized store. A failed write must leave the previous contents readable.
    fn write(&self, contents: &str) -> Result<(), StorageError>;
}

/// JSON file backend that writes through a sibling temp file and an atomic rename.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Backend for the file at `path`; parent directories are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl HighlightBackend for JsonFileBackend {
    fn read(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        if let Err(err) = fs::write(&tmp_path, contents) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::Io {
                path: tmp_path,
                source: err,
            });
        }
        fs::rename(&tmp_path, &self.path).map_err(|err| self.io_error(err))
    }
}

/// In-memory backend, handy for tests and ephemeral servers.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    contents: Mutex<Option<String>>,
}

impl MemoryBackend {
    /// Backend pre-loaded with serialized contents.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }
}

impl HighlightBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>, StorageError> {
        let guard = self.contents.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.clone())
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        let mut guard = self.contents.lock().map_err(|_| StorageError::Poisoned)?;
        *guard = Some(contents.to_string());
        Ok(())
    }
}

/// Highlight store over a persistence backend.
#[derive(Debug)]
pub struct HighlightStore<B = JsonFileBackend> {
    backend: B,
}

impl HighlightStore<JsonFileBackend> {
    /// Store backed by the JSON file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileBackend::new(path))
    }
}

impl<B: HighlightBackend> HighlightStore<B> {
    /// Store over an arbitrary backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Full snapshot of the store.
    ///
    /// Missing, unreadable or corrupt contents read as an empty store.
    pub fn load_all(&self) -> HighlightMap {
        match self.backend.read() {
            Ok(contents) => parse_store(contents.as_deref()),
            Err(err) => {
                tracing::warn!(error = %err, "highlight store unreadable, treating as empty");
                HighlightMap::new()
            }
        }
    }

    /// Highlights for one article edition in insertion order; empty when absent.
    pub fn get(&self, key: &ArticleKey) -> Vec<Highlight> {
        self.load_all()
            .remove(&key.to_string())
            .unwrap_or_default()
    }

    /// Appends a highlight stamped with the current time.
    pub fn append(
        &self,
        key: &ArticleKey,
        text: &str,
        context: &str,
    ) -> Result<Vec<Highlight>, StorageError> {
        self.append_at(key, text, context, now_epoch_seconds())
    }

    /// Appends a highlight with an explicit timestamp and returns the bucket.
    ///
    /// Blank text is a no-op that returns the current bucket. A backend that
    /// cannot be read is an error here, so an append never clobbers a file it
    /// failed to load; a corrupt file is replaced.
    pub fn append_at(
        &self,
        key: &ArticleKey,
        text: &str,
        context: &str,
        created_at: i64,
    ) -> Result<Vec<Highlight>, StorageError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(self.get(key));
        }

        let mut all = parse_store(self.backend.read()?.as_deref());
        let storage_key = key.to_string();
        let bucket = all.entry(storage_key).or_default();
        bucket.push(Highlight {
            text: text.to_string(),
            context: context.to_string(),
            created_at,
        });
        let updated = bucket.clone();

        let serialized = serde_json::to_string_pretty(&all).map_err(StorageError::Serialize)?;
        self.backend.write(&serialized).map_err(|err| {
            tracing::error!(key = %key, error = %err, "failed to persist highlight");
            err
        })?;
        Ok(updated)
    }
}

fn parse_store(contents: Option<&str>) -> HighlightMap {
    let Some(contents) = contents.filter(|contents| !contents.trim().is_empty()) else {
        return HighlightMap::new();
    };
    serde_json::from_str(contents).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "highlight store is corrupt, treating as empty");
        HighlightMap::new()
    })
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_secs() as i64)
        .unwrap_or(0)
}

/// Highlights for one article across its language editions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleHighlights {
    /// Article title.
    pub title: String,
    /// Editions with at least one highlight, sorted by code.
    pub languages: Vec<LanguageHighlights>,
}

/// Highlights for one article edition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageHighlights {
    /// Language code.
    pub language: String,
    /// Display name for the language.
    pub language_name: String,
    /// Highlights in insertion order.
    pub highlights: Vec<Highlight>,
}

/// Groups a store snapshot by title, then language, for cross-article review pages.
///
/// Keys whose language suffix is not a valid code are skipped.
pub fn group_by_article(all: HighlightMap) -> Vec<ArticleHighlights> {
    let mut grouped: BTreeMap<String, Vec<LanguageHighlights>> = BTreeMap::new();
    for (raw_key, highlights) in all {
        let key = match ArticleKey::parse(&raw_key) {
            Ok(key) => key,
            Err(err) => {
                tracing::debug!(key = %raw_key, error = %err, "skipping unparsable highlight key");
                continue;
            }
        };
        let code = key.language().code().to_string();
        grouped
            .entry(key.title().to_string())
            .or_default()
            .push(LanguageHighlights {
                language_name: language_name(&code).unwrap_or(&code).to_string(),
                language: code,
                highlights,
            });
    }
    grouped
        .into_iter()
        .map(|(title, mut languages)| {
            languages.sort_by(|a, b| a.language.cmp(&b.language));
            ArticleHighlights { title, languages }
        })
        .collect()
}
