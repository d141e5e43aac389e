//! Article assembly: fetched content, sections and highlights combined into a view.

use crate::highlights::{ArticleKey, Highlight, Overlay, ValidationError};
use crate::language::Language;
use crate::sections::{Section, Splitter};
use crate::source::{ImageRef, LanguageLink};
use serde::Serialize;
use wiki_parser::Block;

/// Article body in whichever form the fetcher produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleContent {
    /// Rendered article HTML.
    Html(String),
    /// Plain text with `== Heading ==` lines.
    Plain(String),
    /// Pre-partitioned blocks.
    Blocks(Vec<Block>),
}

/// An article as returned by the source, before sectioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArticle {
    /// Resolved title.
    pub title: String,
    /// Edition the article was fetched from.
    pub language: Language,
    /// Canonical URL, when known.
    pub url: Option<String>,
    /// Plain-text lead summary.
    pub summary: String,
    /// Article body.
    pub content: ArticleContent,
    /// Content images.
    pub images: Vec<ImageRef>,
    /// Other editions carrying the article.
    pub languages: Vec<LanguageLink>,
}

impl FetchedArticle {
    /// Highlight bucket key for this article.
    pub fn key(&self) -> Result<ArticleKey, ValidationError> {
        ArticleKey::new(&self.title, self.language.clone())
    }

    /// Splits the body, using the summary as the fallback lead.
    pub fn sections(&self, splitter: &Splitter) -> Vec<Section> {
        let fallback = Some(self.summary.as_str()).filter(|summary| !summary.trim().is_empty());
        match &self.content {
            ArticleContent::Html(html) => splitter.split_html(html, fallback),
            ArticleContent::Plain(text) => splitter.split_text(text, fallback),
            ArticleContent::Blocks(blocks) => splitter.split(blocks, fallback),
        }
    }
}

/// One section ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionView {
    /// Display title (`Introduction` for the lead).
    pub title: String,
    /// Section level.
    pub level: u8,
    /// Raw body text.
    pub body: String,
    /// HTML-escaped body with highlights wrapped in markers.
    pub annotated: String,
}

/// View model handed to presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleView {
    /// Article title.
    pub title: String,
    /// Edition code.
    pub language: String,
    /// Edition display name.
    pub language_name: String,
    /// Canonical URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Lead summary.
    pub summary: String,
    /// Sections in document order.
    pub sections: Vec<SectionView>,
    /// Stored highlights for this edition, oldest first.
    pub highlights: Vec<Highlight>,
    /// Content images.
    pub images: Vec<ImageRef>,
    /// Other editions.
    pub languages: Vec<LanguageLink>,
}

/// Builds the view model for one article.
pub fn assemble(
    article: &FetchedArticle,
    splitter: &Splitter,
    overlay: &Overlay,
    highlights: Vec<Highlight>,
) -> ArticleView {
    let phrases: Vec<&str> = highlights.iter().map(|h| h.text.as_str()).collect();
    let sections = article
        .sections(splitter)
        .into_iter()
        .map(|section| SectionView {
            title: section.display_title().to_string(),
            level: section.level,
            annotated: overlay.apply_html(&section.body, &phrases),
            body: section.body,
        })
        .collect();

    ArticleView {
        title: article.title.clone(),
        language: article.language.code().to_string(),
        language_name: article.language.name().to_string(),
        url: article.url.clone(),
        summary: article.summary.clone(),
        sections,
        highlights,
        images: article.images.clone(),
        languages: article.languages.clone(),
    }
}
