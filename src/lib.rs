#![warn(missing_docs)]
//! Sectioned encyclopedia articles with collaborative highlights.
//!
//! Raw article content (HTML, plain text or pre-parsed blocks) is split into
//! titled sections, highlights are stored per article edition, and stored
//! highlights are overlaid onto section text for display and review. Sections
//! can be translated on demand through a chain of translation providers.

pub mod api;
pub mod article;
pub mod config;
pub mod export;
pub mod highlights;
pub mod language;
pub mod sections;
pub mod source;
pub mod translate;

pub use article::{assemble, ArticleContent, ArticleView, FetchedArticle, SectionView};
pub use config::{ServerCli, SplitterArgs};
pub use export::{export_article, export_filename, DocumentWriter, MarkdownWriter};
pub use highlights::{
    annotate, ArticleKey, GuardedStore, Highlight, HighlightError, HighlightStore, Overlay,
    StorageError, ValidationError,
};
pub use language::{Language, DEFAULT_LANGUAGE};
pub use sections::{Section, Splitter, SplitterConfig};
pub use source::{ArticleSource, ImageRef, SourceConfig, SourceError, WikipediaClient};
pub use translate::{TranslateConfig, TranslateError, Translator, TranslatorChain};
pub use wiki_parser::{Block, BlockKind, BlockParseError, RawBlock};
