//! Async client for the MediaWiki action API of an encyclopedia edition.

use crate::article::{ArticleContent, FetchedArticle};
use crate::language::Language;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Endpoint template; `{lang}` is replaced by the edition code.
pub const DEFAULT_ENDPOINT: &str = "https://{lang}.wikipedia.org/w/api.php";
/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("wikitruth/", env!("CARGO_PKG_VERSION"));

const SEARCH_LIMIT: &str = "10";
const MAX_IMAGE_CANDIDATES: usize = 20;
const MIN_IMAGE_WIDTH: u32 = 200;
const SKIPPED_IMAGE_MARKERS: &[&str] = &["icon", "logo", "flag", "commons-"];

/// Settings for [`WikipediaClient`].
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// API endpoint template containing `{lang}`.
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts per request, including the first.
    pub max_retries: usize,
    /// Base delay for exponential backoff.
    pub retry_base: Duration,
    /// User agent header.
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(15),
            max_retries: 3,
            retry_base: Duration::from_millis(500),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// A language edition that carries the same article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageLink {
    /// Edition code.
    pub code: String,
    /// Edition display name as reported by the source.
    pub name: String,
    /// Article title in that edition.
    pub title: String,
    /// Article URL in that edition, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Image attached to an article.
///
/// Serialized untagged: a bare URL string, or an object with dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    /// URL with unknown dimensions.
    Url(String),
    /// URL with dimensions and main-image flag.
    Detailed {
        /// Image URL.
        url: String,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Whether this is the lead image.
        is_main: bool,
    },
}

impl ImageRef {
    /// Image URL.
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Detailed { url, .. } => url,
        }
    }

    /// Whether this is the lead image.
    pub fn is_main(&self) -> bool {
        matches!(self, Self::Detailed { is_main: true, .. })
    }
}

/// Image metadata as reported by `prop=imageinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageInfo {
    /// Full-size URL.
    pub url: String,
    /// Width in pixels.
    #[serde(default)]
    pub width: Option<u32>,
    /// Height in pixels.
    #[serde(default)]
    pub height: Option<u32>,
}

/// Whether a file name is worth showing as article content.
pub fn is_content_image(name: &str) -> bool {
    let lower = name.to_lowercase();
    !lower.ends_with(".svg")
        && !SKIPPED_IMAGE_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
}

/// Resolves candidate file names into image references, in candidate order.
///
/// Files without metadata are dropped, files narrower than 200px are dropped,
/// and files with unknown width are kept as bare URLs. The first sized image is
/// the main image.
pub fn select_images(names: &[String], info: &HashMap<String, ImageInfo>) -> Vec<ImageRef> {
    let mut images = Vec::new();
    let mut main_taken = false;
    for name in names.iter().filter(|name| is_content_image(name)) {
        let Some(meta) = info.get(name) else {
            continue;
        };
        if images.iter().any(|image: &ImageRef| image.url() == meta.url) {
            continue;
        }
        match meta.width {
            None => images.push(ImageRef::Url(meta.url.clone())),
            Some(width) if width > MIN_IMAGE_WIDTH => {
                images.push(ImageRef::Detailed {
                    url: meta.url.clone(),
                    width,
                    height: meta.height.unwrap_or(0),
                    is_main: !main_taken,
                });
                main_taken = true;
            }
            Some(_) => {}
        }
    }
    images
}

/// HTTP client for one or more encyclopedia editions.
#[derive(Clone)]
pub struct WikipediaClient {
    client: Client,
    config: SourceConfig,
}

impl WikipediaClient {
    /// Builds a client.
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(SourceError::Http)?;
        Ok(Self { client, config })
    }

    /// API URL for an edition.
    pub fn endpoint(&self, language: &Language) -> Result<Url, SourceError> {
        let raw = self.config.endpoint.replace("{lang}", language.code());
        Url::parse(&raw).map_err(|err| SourceError::Endpoint(format!("{raw}: {err}")))
    }

    /// Up to ten matching article titles.
    pub async fn search(&self, query: &str, language: &Language) -> Result<Vec<String>, SourceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let response: SearchResponse = self
            .get_json(
                language,
                &[
                    ("action", "query"),
                    ("list", "search"),
                    ("srsearch", query),
                    ("srlimit", SEARCH_LIMIT),
                    ("srprop", ""),
                ],
            )
            .await?;
        Ok(response
            .query
            .search
            .into_iter()
            .map(|hit| hit.title)
            .collect())
    }

    /// Lead-section plain-text summary and canonical URL.
    pub async fn summary(&self, title: &str, language: &Language) -> Result<Summary, SourceError> {
        let response: PagesResponse<SummaryPage> = self
            .get_json(
                language,
                &[
                    ("action", "query"),
                    ("prop", "extracts|info"),
                    ("exintro", "1"),
                    ("explaintext", "1"),
                    ("inprop", "url"),
                    ("redirects", "1"),
                    ("titles", title),
                ],
            )
            .await?;
        let page = response
            .query
            .pages
            .into_iter()
            .next()
            .filter(|page| !page.missing)
            .ok_or_else(|| SourceError::NotFound(title.to_string()))?;
        Ok(Summary {
            title: page.title,
            text: page.extract.unwrap_or_default().trim().to_string(),
            url: page.fullurl,
        })
    }

    /// Fetches rendered HTML, summary, language links and images.
    ///
    /// Image lookup failures are logged and yield no images.
    pub async fn fetch_article(
        &self,
        title: &str,
        language: &Language,
    ) -> Result<FetchedArticle, SourceError> {
        let parsed: ParseResponse = self
            .get_json(
                language,
                &[
                    ("action", "parse"),
                    ("page", title),
                    ("prop", "text|langlinks|images"),
                    ("redirects", "1"),
                    ("disableeditsection", "1"),
                ],
            )
            .await?;
        let parsed = parsed.parse;
        let summary = self.summary(&parsed.title, language).await?;
        let images = match self.images(&parsed.images, language).await {
            Ok(images) => images,
            Err(err) => {
                tracing::warn!(title = %parsed.title, error = %err, "image lookup failed");
                Vec::new()
            }
        };

        Ok(FetchedArticle {
            title: parsed.title,
            language: language.clone(),
            url: summary.url,
            summary: summary.text,
            content: ArticleContent::Html(parsed.text),
            images,
            languages: parsed
                .langlinks
                .into_iter()
                .map(|link| LanguageLink {
                    name: link.langname.unwrap_or_else(|| link.lang.clone()),
                    code: link.lang,
                    title: link.title,
                    url: link.url,
                })
                .collect(),
        })
    }

    async fn images(&self, names: &[String], language: &Language) -> Result<Vec<ImageRef>, SourceError> {
        let candidates: Vec<String> = names
            .iter()
            .filter(|name| is_content_image(name))
            .take(MAX_IMAGE_CANDIDATES)
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let titles = candidates
            .iter()
            .map(|name| format!("File:{name}"))
            .collect::<Vec<_>>()
            .join("|");
        let response: PagesResponse<ImagePage> = self
            .get_json(
                language,
                &[
                    ("action", "query"),
                    ("prop", "imageinfo"),
                    ("iiprop", "url|size"),
                    ("titles", titles.as_str()),
                ],
            )
            .await?;
        let info = response
            .query
            .pages
            .into_iter()
            .filter_map(|page| {
                let name = page.title.split_once(':').map(|(_, name)| name.to_string())?;
                let info = page.imageinfo.into_iter().next()?;
                // Titles come back with spaces; parse output uses underscores.
                Some((name.replace(' ', "_"), info))
            })
            .collect::<HashMap<_, _>>();
        let normalized: Vec<String> = candidates
            .iter()
            .map(|name| name.replace(' ', "_"))
            .collect();
        Ok(select_images(&normalized, &info))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        language: &Language,
        params: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let endpoint = self.endpoint(language)?;
        let mut attempt = 0usize;
        loop {
            let response = self
                .client
                .get(endpoint.clone())
                .query(params)
                .query(&[("format", "json"), ("formatversion", "2")])
                .send()
                .await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body = resp.text().await.map_err(SourceError::Http)?;
                        return decode_payload(&body);
                    }
                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.config.max_retries {
                        attempt += 1;
                        tracing::debug!(%status, attempt, "retrying source request");
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(SourceError::Status { status, body });
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.config.max_retries {
                        attempt += 1;
                        tracing::debug!(error = %err, attempt, "retrying source request");
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(SourceError::Http(err));
                }
            }
        }
    }

    fn retry_backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.config.retry_base * (1 << capped)
    }
}

/// Where articles come from; implemented by [`WikipediaClient`].
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Up to ten matching article titles.
    async fn search(&self, query: &str, language: &Language) -> Result<Vec<String>, SourceError>;

    /// Full article with summary, language links and images.
    async fn fetch_article(
        &self,
        title: &str,
        language: &Language,
    ) -> Result<FetchedArticle, SourceError>;
}

#[async_trait]
impl ArticleSource for WikipediaClient {
    async fn search(&self, query: &str, language: &Language) -> Result<Vec<String>, SourceError> {
        WikipediaClient::search(self, query, language).await
    }

    async fn fetch_article(
        &self,
        title: &str,
        language: &Language,
    ) -> Result<FetchedArticle, SourceError> {
        WikipediaClient::fetch_article(self, title, language).await
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Decodes an API payload, surfacing in-band API errors.
fn decode_payload<T: DeserializeOwned>(body: &str) -> Result<T, SourceError> {
    let value: Value = serde_json::from_str(body).map_err(SourceError::Decode)?;
    if let Some(error) = value.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(match code.as_str() {
            "missingtitle" | "invalidtitle" => SourceError::NotFound(info),
            _ => SourceError::Api { code, info },
        });
    }
    serde_json::from_value(value).map_err(SourceError::Decode)
}

/// Lead-section summary of an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Resolved title after redirects.
    pub title: String,
    /// Plain-text lead.
    pub text: String,
    /// Canonical article URL.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse<P> {
    query: PagesQuery<P>,
}

#[derive(Debug, Deserialize)]
struct PagesQuery<P> {
    #[serde(default = "Vec::new")]
    pages: Vec<P>,
}

#[derive(Debug, Deserialize)]
struct SummaryPage {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    fullurl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagePage {
    title: String,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: ParsedPage,
}

#[derive(Debug, Deserialize)]
struct ParsedPage {
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    langlinks: Vec<RawLangLink>,
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLangLink {
    lang: String,
    title: String,
    #[serde(default)]
    langname: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Errors surfaced by the source client.
#[derive(Debug)]
pub enum SourceError {
    /// The request could not be sent or its body read.
    Http(reqwest::Error),
    /// The source answered with a non-success status.
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The article does not exist in the requested edition.
    NotFound(String),
    /// The source reported an in-band API error.
    Api {
        /// MediaWiki error code.
        code: String,
        /// Human-readable detail.
        info: String,
    },
    /// The response was not the expected JSON.
    Decode(serde_json::Error),
    /// The endpoint template does not produce a valid URL.
    Endpoint(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "source request failed: {err}"),
            Self::Status { status, body } => write!(f, "source returned {status}: {body}"),
            Self::NotFound(detail) => write!(f, "article not found: {detail}"),
            Self::Api { code, info } => write!(f, "source api error {code}: {info}"),
            Self::Decode(err) => write!(f, "failed to decode source response: {err}"),
            Self::Endpoint(detail) => write!(f, "invalid source endpoint {detail}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::Status { .. } | Self::NotFound(_) | Self::Api { .. } | Self::Endpoint(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn info(url: &str, width: Option<u32>) -> ImageInfo {
        ImageInfo {
            url: url.to_string(),
            width,
            height: width.map(|w| w / 2),
        }
    }

    #[test]
    fn filters_decorative_images() {
        for name in ["Flag_of_France.png", "Wiki_logo.jpg", "Edit-icon.png", "Map.svg", "Commons-logo.png"] {
            assert!(!is_content_image(name), "{name} should be skipped");
        }
        assert!(is_content_image("Eiffel_Tower.jpg"));
    }

    #[test]
    fn selects_sized_images_and_marks_first_main() {
        let names: Vec<String> = ["Tiny.jpg", "Tower.jpg", "Bridge.jpg", "Unsized.jpg", "Missing.jpg", "Flag_x.png"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut meta = HashMap::new();
        meta.insert("Tiny.jpg".to_string(), info("https://img/tiny", Some(120)));
        meta.insert("Tower.jpg".to_string(), info("https://img/tower", Some(800)));
        meta.insert("Bridge.jpg".to_string(), info("https://img/bridge", Some(640)));
        meta.insert("Unsized.jpg".to_string(), info("https://img/unsized", None));
        meta.insert("Flag_x.png".to_string(), info("https://img/flag", Some(900)));

        assert_eq!(
            select_images(&names, &meta),
            vec![
                ImageRef::Detailed {
                    url: "https://img/tower".into(),
                    width: 800,
                    height: 400,
                    is_main: true,
                },
                ImageRef::Detailed {
                    url: "https://img/bridge".into(),
                    width: 640,
                    height: 320,
                    is_main: false,
                },
                ImageRef::Url("https://img/unsized".into()),
            ]
        );
    }

    #[test]
    fn image_refs_serialize_untagged() {
        let images = vec![
            ImageRef::Url("https://img/a".into()),
            ImageRef::Detailed {
                url: "https://img/b".into(),
                width: 300,
                height: 200,
                is_main: true,
            },
        ];
        let value = serde_json::to_value(&images).expect("serialize");
        assert_eq!(
            value,
            json!([
                "https://img/a",
                {"url": "https://img/b", "width": 300, "height": 200, "is_main": true}
            ])
        );
        let back: Vec<ImageRef> = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, images);
    }

    #[test]
    fn decodes_search_hits() {
        let body = json!({"batchcomplete": true, "query": {"search": [{"ns": 0, "title": "Rust"}, {"ns": 0, "title": "Rust (language)"}]}});
        let parsed: SearchResponse = decode_payload(&body.to_string()).expect("decode");
        assert_eq!(
            parsed.query.search.into_iter().map(|hit| hit.title).collect::<Vec<_>>(),
            vec!["Rust".to_string(), "Rust (language)".to_string()]
        );
    }

    #[test]
    fn maps_missing_title_to_not_found() {
        let body = json!({"error": {"code": "missingtitle", "info": "The page you specified doesn't exist."}});
        let err = decode_payload::<ParseResponse>(&body.to_string()).expect_err("error payload");
        assert!(matches!(err, SourceError::NotFound(_)));

        let body = json!({"error": {"code": "ratelimited", "info": "slow down"}});
        let err = decode_payload::<ParseResponse>(&body.to_string()).expect_err("error payload");
        assert!(matches!(err, SourceError::Api { ref code, .. } if code == "ratelimited"));
    }

    #[test]
    fn decodes_parse_payload() {
        let body = json!({"parse": {
            "title": "Paris",
            "pageid": 22989,
            "text": "<p>Capital of France.</p>",
            "langlinks": [{"lang": "fr", "title": "Paris", "langname": "French", "url": "https://fr.wikipedia.org/wiki/Paris"}],
            "images": ["Paris_skyline.jpg"]
        }});
        let parsed: ParseResponse = decode_payload(&body.to_string()).expect("decode");
        assert_eq!(parsed.parse.title, "Paris");
        assert_eq!(parsed.parse.images, vec!["Paris_skyline.jpg".to_string()]);
        assert_eq!(parsed.parse.langlinks[0].langname.as_deref(), Some("French"));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            decode_payload::<SearchResponse>("<html>"),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn endpoint_substitutes_language() {
        let client = WikipediaClient::new(SourceConfig::default()).expect("client");
        let url = client
            .endpoint(&Language::new("de").expect("language"))
            .expect("endpoint");
        assert_eq!(url.as_str(), "https://de.wikipedia.org/w/api.php");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let client = WikipediaClient::new(SourceConfig {
            retry_base: Duration::from_millis(10),
            ..SourceConfig::default()
        })
        .expect("client");
        assert_eq!(client.retry_backoff(1), Duration::from_millis(20));
        assert_eq!(client.retry_backoff(2), Duration::from_millis(40));
        assert_eq!(client.retry_backoff(9), Duration::from_millis(320));
    }
}
