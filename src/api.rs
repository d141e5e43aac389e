//! HTTP routes over the splitter, highlight store and article source.

use crate::article::{assemble, ArticleView, FetchedArticle, SectionView};
use crate::export::{attachment_disposition, export_filename, export_markdown};
use crate::highlights::{
    group_by_article, ArticleHighlights, ArticleKey, GuardedStore, Highlight, HighlightError,
    JsonFileBackend, Overlay, StorageError,
};
use crate::language::{known_languages, Language};
use crate::sections::Splitter;
use crate::source::{ArticleSource, SourceError};
use crate::translate::{TranslateError, Translator};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

/// Fetched articles keyed by requested title and language.
pub type ArticleCache = Arc<Mutex<LruCache<ArticleKey, FetchedArticle>>>;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorBody>);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Highlight store with serialized, time-bounded access.
    pub store: GuardedStore<JsonFileBackend>,
    /// Article source.
    pub source: Arc<dyn ArticleSource>,
    /// Section translator.
    pub translator: Arc<dyn Translator>,
    /// Section splitter.
    pub splitter: Arc<Splitter>,
    /// Highlight markers.
    pub overlay: Arc<Overlay>,
    /// Language used when a request names none.
    pub default_language: Language,
    /// Optional article cache.
    pub article_cache: Option<ArticleCache>,
}

impl AppState {
    fn language(&self, code: Option<&str>) -> Result<Language, ApiError> {
        Language::or_default(code, &self.default_language)
            .map_err(|err| bad_request(err.to_string()))
    }

    async fn article(&self, title: &str, language: &Language) -> Result<FetchedArticle, ApiError> {
        let key = ArticleKey::new(title, language.clone())
            .map_err(|err| bad_request(err.to_string()))?;
        if let Some(cache) = &self.article_cache {
            if let Some(hit) = {
                let mut guard = cache.lock().await;
                guard.get(&key).cloned()
            } {
                return Ok(hit);
            }
        }

        let article = self
            .source
            .fetch_article(key.title(), language)
            .await
            .map_err(source_error)?;

        if let Some(cache) = &self.article_cache {
            let mut guard = cache.lock().await;
            guard.put(key, article.clone());
        }
        Ok(article)
    }
}

/// Builds an article cache, `None` when `capacity` is `None`.
pub fn build_cache(capacity: Option<NonZeroUsize>) -> Option<ArticleCache> {
    capacity.map(|capacity| Arc::new(Mutex::new(LruCache::new(capacity))))
}

/// All routes with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/languages", get(languages))
        .route("/v1/search", get(search))
        .route("/v1/articles/:title", get(view_article))
        .route("/v1/articles/:title/export", get(export_article))
        .route("/v1/sections", post(split_sections))
        .route("/v1/translate", post(translate_section))
        .route("/v1/highlights", get(all_highlights).post(submit_highlight))
        .route("/v1/highlights/:article_key", get(article_highlights))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON error payload.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable failure.
    pub message: String,
}

/// `?lang=` query.
#[derive(Debug, Default, Deserialize)]
pub struct LanguageParams {
    /// Edition code.
    #[serde(default)]
    pub lang: Option<String>,
}

/// `?q=&lang=` query.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Search text.
    pub q: String,
    /// Edition code.
    #[serde(default)]
    pub lang: Option<String>,
}

/// Search results.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Edition searched.
    pub language: String,
    /// Matching titles.
    pub results: Vec<String>,
}

/// One selectable language.
#[derive(Debug, Serialize)]
pub struct LanguageEntry {
    /// Edition code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
}

/// Highlight append or retrieval request.
#[derive(Debug, Deserialize)]
pub struct HighlightRequest {
    /// `"{title}_{lang}"`.
    pub article_key: String,
    /// Text to append; absent for retrieval.
    #[serde(default)]
    pub text: Option<String>,
    /// Free-form label, or `retrieve_only`.
    #[serde(default)]
    pub context: Option<String>,
}

/// Highlights of one article edition.
#[derive(Debug, Serialize)]
pub struct HighlightsResponse {
    /// Canonical key.
    pub article_key: String,
    /// Highlights in insertion order.
    pub highlights: Vec<Highlight>,
}

/// Offline split request: exactly one of `blocks`, `html` or `text`.
#[derive(Debug, Deserialize)]
pub struct SectionsRequest {
    /// Pre-partitioned wire blocks, validated one by one.
    #[serde(default)]
    pub blocks: Option<Vec<Value>>,
    /// Article HTML.
    #[serde(default)]
    pub html: Option<String>,
    /// Plain article text.
    #[serde(default)]
    pub text: Option<String>,
    /// Fallback lead body.
    #[serde(default)]
    pub summary: Option<String>,
    /// Annotate with highlights stored under this key.
    #[serde(default)]
    pub article_key: Option<String>,
}

/// Split result.
#[derive(Debug, Serialize)]
pub struct SectionsResponse {
    /// Sections in document order.
    pub sections: Vec<SectionView>,
}

/// Section translation request.
#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    /// Section text.
    pub text: String,
    /// Source edition; absent or `auto` asks the provider to detect it.
    #[serde(default)]
    pub from: Option<String>,
    /// Target edition; defaults to the server language.
    #[serde(default)]
    pub to: Option<String>,
}

/// Translated section text.
#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    /// Translation.
    pub translated_text: String,
    /// Source edition, `auto` when detected.
    pub from: String,
    /// Target edition.
    pub to: String,
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn languages() -> Json<Vec<LanguageEntry>> {
    Json(
        known_languages()
            .map(|(code, name)| LanguageEntry { code, name })
            .collect(),
    )
}

/// `GET /v1/search`.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("query text must not be empty"));
    }
    let language = state.language(params.lang.as_deref())?;
    let results = state
        .source
        .search(&params.q, &language)
        .await
        .map_err(source_error)?;
    Ok(Json(SearchResponse {
        language: language.code().to_string(),
        results,
    }))
}

/// `GET /v1/articles/:title`.
pub async fn view_article(
    State(state): State<AppState>,
    Path(title): Path<String>,
    Query(params): Query<LanguageParams>,
) -> Result<Json<ArticleView>, ApiError> {
    let language = state.language(params.lang.as_deref())?;
    let article = state.article(&title, &language).await?;
    let key = article
        .key()
        .map_err(|err| highlight_error(HighlightError::Validation(err)))?;
    let highlights = state.store.get(key).await.map_err(storage_error)?;
    Ok(Json(assemble(
        &article,
        &state.splitter,
        &state.overlay,
        highlights,
    )))
}

/// `GET /v1/articles/:title/export`, a Markdown attachment.
pub async fn export_article(
    State(state): State<AppState>,
    Path(title): Path<String>,
    Query(params): Query<LanguageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let language = state.language(params.lang.as_deref())?;
    let article = state.article(&title, &language).await?;
    let sections = article.sections(&state.splitter);
    let document = export_markdown(&article, &sections, chrono::Local::now().naive_local());
    let filename = export_filename(&title, language.code(), "md");
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(&filename)),
        ],
        document,
    ))
}

/// `POST /v1/sections`.
pub async fn split_sections(
    State(state): State<AppState>,
    Json(request): Json<SectionsRequest>,
) -> Result<Json<SectionsResponse>, ApiError> {
    let summary = request.summary.as_deref();
    let sections = match (request.blocks, request.html, request.text) {
        (Some(blocks), None, None) => state.splitter.split_wire(blocks, summary),
        (None, Some(html), None) => state.splitter.split_html(&html, summary),
        (None, None, Some(text)) => state.splitter.split_text(&text, summary),
        _ => return Err(bad_request("provide exactly one of blocks, html or text")),
    };

    let highlights = match request.article_key {
        Some(raw_key) => {
            let key = ArticleKey::parse(&raw_key)
                .map_err(|err| highlight_error(HighlightError::Validation(err)))?;
            state.store.get(key).await.map_err(storage_error)?
        }
        None => Vec::new(),
    };
    let phrases: Vec<&str> = highlights.iter().map(|h| h.text.as_str()).collect();

    Ok(Json(SectionsResponse {
        sections: sections
            .into_iter()
            .map(|section| SectionView {
                title: section.display_title().to_string(),
                level: section.level,
                annotated: state.overlay.apply_html(&section.body, &phrases),
                body: section.body,
            })
            .collect(),
    }))
}

/// `POST /v1/translate`.
pub async fn translate_section(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(bad_request("text to translate must not be empty"));
    }
    let source = match request.from.as_deref().map(str::trim) {
        None | Some("") | Some("auto") => None,
        Some(code) => Some(state.language(Some(code))?),
    };
    let target = state.language(request.to.as_deref())?;
    let translated_text = state
        .translator
        .translate(&request.text, source.as_ref(), &target)
        .await
        .map_err(translate_error)?;
    Ok(Json(TranslateResponse {
        translated_text,
        from: source.map_or_else(|| "auto".to_string(), |lang| lang.code().to_string()),
        to: target.code().to_string(),
    }))
}

/// `POST /v1/highlights`: append, or retrieve when no text is given.
pub async fn submit_highlight(
    State(state): State<AppState>,
    Json(request): Json<HighlightRequest>,
) -> Result<Json<HighlightsResponse>, ApiError> {
    let (key, highlights) = state
        .store
        .submit(&request.article_key, request.text, request.context)
        .await
        .map_err(highlight_error)?;
    Ok(Json(HighlightsResponse {
        article_key: key.to_string(),
        highlights,
    }))
}

/// `GET /v1/highlights/:article_key`.
pub async fn article_highlights(
    State(state): State<AppState>,
    Path(article_key): Path<String>,
) -> Result<Json<HighlightsResponse>, ApiError> {
    let (key, highlights) = state
        .store
        .submit(&article_key, None, None)
        .await
        .map_err(highlight_error)?;
    Ok(Json(HighlightsResponse {
        article_key: key.to_string(),
        highlights,
    }))
}

/// `GET /v1/highlights`, grouped by title then language.
pub async fn all_highlights(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArticleHighlights>>, ApiError> {
    let all = state.store.load_all().await.map_err(storage_error)?;
    Ok(Json(group_by_article(all)))
}

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    error_body(StatusCode::BAD_REQUEST, message)
}

fn highlight_error(err: HighlightError) -> ApiError {
    match err {
        HighlightError::Validation(err) => bad_request(err.to_string()),
        HighlightError::Storage(err) => storage_error(err),
    }
}

fn storage_error(err: StorageError) -> ApiError {
    tracing::error!(error = %err, "highlight store failure");
    match err {
        StorageError::Timeout(_) => error_body(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        _ => error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn source_error(err: SourceError) -> ApiError {
    match err {
        SourceError::NotFound(_) => error_body(StatusCode::NOT_FOUND, err.to_string()),
        SourceError::Endpoint(_) => error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        _ => {
            tracing::warn!(error = %err, "source request failed");
            error_body(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

fn translate_error(err: TranslateError) -> ApiError {
    match err {
        TranslateError::EmptyText => bad_request(err.to_string()),
        _ => {
            tracing::warn!(error = %err, "translation failed");
            error_body(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}
