//! On-demand section translation through a chain of HTTP providers.

use crate::language::Language;
use async_trait::async_trait;
use html_escape::decode_html_entities;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default LibreTranslate instance.
pub const DEFAULT_LIBRE_ENDPOINT: &str = "https://libretranslate.de/translate";
/// Default Google Translate web endpoint.
pub const DEFAULT_GOOGLE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

const AUTO_SOURCE: &str = "auto";

/// Translates text between editions.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Translates `text` into `target`; `source` of `None` asks for detection.
    async fn translate(
        &self,
        text: &str,
        source: Option<&Language>,
        target: &Language,
    ) -> Result<String, TranslateError>;
}

/// Settings for the built-in provider chain.
#[derive(Debug, Clone)]
pub struct TranslateConfig {
    /// LibreTranslate `/translate` URL; `None` leaves the provider out.
    pub libre_endpoint: Option<String>,
    /// LibreTranslate API key.
    pub libre_api_key: Option<String>,
    /// Google Translate web URL; `None` leaves the provider out.
    pub google_endpoint: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent header.
    pub user_agent: String,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            libre_endpoint: Some(DEFAULT_LIBRE_ENDPOINT.to_string()),
            libre_api_key: None,
            google_endpoint: Some(DEFAULT_GOOGLE_ENDPOINT.to_string()),
            timeout: Duration::from_secs(10),
            user_agent: crate::source::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// LibreTranslate JSON API.
#[derive(Clone)]
pub struct LibreTranslate {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl LibreTranslate {
    /// Provider over an existing client.
    pub fn new(client: Client, endpoint: Url, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText", default)]
    translated_text: Option<String>,
}

#[async_trait]
impl Translator for LibreTranslate {
    fn name(&self) -> &str {
        "libretranslate"
    }

    async fn translate(
        &self,
        text: &str,
        source: Option<&Language>,
        target: &Language,
    ) -> Result<String, TranslateError> {
        let request = LibreRequest {
            q: text,
            source: source.map_or(AUTO_SOURCE, Language::code),
            target: target.code(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(TranslateError::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Status(status));
        }
        let body: LibreResponse = response.json().await.map_err(TranslateError::Http)?;
        body.translated_text
            .filter(|text| !text.trim().is_empty())
            .map(|text| decode_html_entities(&text).into_owned())
            .ok_or(TranslateError::EmptyResult)
    }
}

/// Google Translate web endpoint (`client=gtx`).
#[derive(Clone)]
pub struct GoogleTranslate {
    client: Client,
    endpoint: Url,
}

impl GoogleTranslate {
    /// Provider over an existing client.
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl Translator for GoogleTranslate {
    fn name(&self) -> &str {
        "google"
    }

    async fn translate(
        &self,
        text: &str,
        source: Option<&Language>,
        target: &Language,
    ) -> Result<String, TranslateError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("client", "gtx"),
                ("sl", source.map_or(AUTO_SOURCE, Language::code)),
                ("tl", target.code()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(TranslateError::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Status(status));
        }
        let body: Value = response.json().await.map_err(TranslateError::Http)?;
        google_translation(&body).ok_or(TranslateError::EmptyResult)
    }
}

/// Joins the translated pieces of a `translate_a/single` payload.
///
/// The payload is `[[["piece", "original", ...], ...], ...]`.
fn google_translation(body: &Value) -> Option<String> {
    let joined: String = body
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|part| part.get(0).and_then(Value::as_str))
        .collect();
    (!joined.trim().is_empty()).then_some(joined)
}

/// Tries each provider in order until one succeeds.
#[derive(Clone, Default)]
pub struct TranslatorChain {
    providers: Vec<Arc<dyn Translator>>,
}

impl TranslatorChain {
    /// Chain over the given providers, tried in order.
    pub fn new(providers: Vec<Arc<dyn Translator>>) -> Self {
        Self { providers }
    }

    /// LibreTranslate then Google, each included when its endpoint is set.
    pub fn from_config(config: &TranslateConfig) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(TranslateError::Http)?;
        let mut providers: Vec<Arc<dyn Translator>> = Vec::new();
        if let Some(endpoint) = &config.libre_endpoint {
            providers.push(Arc::new(LibreTranslate::new(
                client.clone(),
                parse_endpoint(endpoint)?,
                config.libre_api_key.clone(),
            )));
        }
        if let Some(endpoint) = &config.google_endpoint {
            providers.push(Arc::new(GoogleTranslate::new(
                client,
                parse_endpoint(endpoint)?,
            )));
        }
        Ok(Self::new(providers))
    }

    /// Number of configured providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True when no provider is configured.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl Translator for TranslatorChain {
    fn name(&self) -> &str {
        "chain"
    }

    /// Identical source and target return the text as given. Otherwise
    /// whitespace runs collapse to one space before the first provider is asked.
    async fn translate(
        &self,
        text: &str,
        source: Option<&Language>,
        target: &Language,
    ) -> Result<String, TranslateError> {
        if source == Some(target) {
            return Ok(text.to_string());
        }
        let text = collapse_whitespace(text);
        if text.is_empty() {
            return Err(TranslateError::EmptyText);
        }
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.translate(&text, source, target).await {
                Ok(translated) => return Ok(translated),
                Err(err) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %err,
                        "translation provider failed"
                    );
                    failures.push(format!("{}: {err}", provider.name()));
                }
            }
        }
        Err(TranslateError::Exhausted(failures))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_endpoint(raw: &str) -> Result<Url, TranslateError> {
    Url::parse(raw).map_err(|err| TranslateError::Endpoint(format!("{raw}: {err}")))
}

/// Translation failures.
#[derive(Debug)]
pub enum TranslateError {
    /// Nothing to translate.
    EmptyText,
    /// The request could not be sent or its body read.
    Http(reqwest::Error),
    /// The provider answered with a non-success status.
    Status(StatusCode),
    /// The provider answered without a translation.
    EmptyResult,
    /// A provider endpoint is not a valid URL.
    Endpoint(String),
    /// Every provider failed; one entry per provider.
    Exhausted(Vec<String>),
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyText => write!(f, "text to translate must not be empty"),
            Self::Http(err) => write!(f, "translation request failed: {err}"),
            Self::Status(status) => write!(f, "translation provider returned {status}"),
            Self::EmptyResult => write!(f, "translation provider returned no text"),
            Self::Endpoint(detail) => write!(f, "invalid translation endpoint {detail}"),
            Self::Exhausted(failures) if failures.is_empty() => {
                write!(f, "no translation provider is configured")
            }
            Self::Exhausted(failures) => {
                write!(f, "all translation providers failed ({})", failures.join("; "))
            }
        }
    }
}

impl std::error::Error for TranslateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Translator for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn translate(
            &self,
            text: &str,
            _source: Option<&Language>,
            target: &Language,
        ) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(prefix) => Ok(format!("{prefix}[{}] {text}", target.code())),
                None => Err(TranslateError::Status(StatusCode::SERVICE_UNAVAILABLE)),
            }
        }
    }

    fn lang(code: &str) -> Language {
        Language::new(code).expect("language")
    }

    #[tokio::test]
    async fn falls_back_to_the_next_provider() {
        let down = Scripted::new("down", None);
        let up = Scripted::new("up", Some("ok"));
        let chain = TranslatorChain::new(vec![
            down.clone() as Arc<dyn Translator>,
            up.clone() as Arc<dyn Translator>,
        ]);
        let translated = chain
            .translate("Bonjour\n\n  le   monde", Some(&lang("fr")), &lang("en"))
            .await
            .expect("translate");
        assert_eq!(translated, "ok[en] Bonjour le monde");
        assert_eq!(down.calls.load(Ordering::SeqCst), 1);
        assert_eq!(up.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_language_skips_providers() {
        let up = Scripted::new("up", Some("ok"));
        let chain = TranslatorChain::new(vec![up.clone() as Arc<dyn Translator>]);
        let text = "Hello\n\nworld";
        assert_eq!(
            chain
                .translate(text, Some(&lang("en")), &lang("en"))
                .await
                .expect("identity"),
            text
        );
        assert_eq!(up.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reports_every_failed_provider() {
        let chain = TranslatorChain::new(vec![
            Scripted::new("first", None) as Arc<dyn Translator>,
            Scripted::new("second", None) as Arc<dyn Translator>,
        ]);
        let err = chain
            .translate("Hola", None, &lang("en"))
            .await
            .expect_err("all down");
        let TranslateError::Exhausted(failures) = err else {
            panic!("expected exhausted, got {err:?}");
        };
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("first: "));
        assert!(failures[1].starts_with("second: "));
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let chain =
            TranslatorChain::new(vec![Scripted::new("up", Some("ok")) as Arc<dyn Translator>]);
        assert!(matches!(
            chain.translate(" \n ", None, &lang("de")).await,
            Err(TranslateError::EmptyText)
        ));
    }

    #[test]
    fn joins_google_pieces() {
        let body = json!([
            [["Hello ", "Bonjour ", null], ["world", "monde", null], [null, null, "x"]],
            null,
            "fr"
        ]);
        assert_eq!(google_translation(&body).as_deref(), Some("Hello world"));
        assert_eq!(google_translation(&json!([[]])), None);
        assert_eq!(google_translation(&json!({"error": 1})), None);
    }

    #[test]
    fn config_controls_provider_list() {
        let chain = TranslatorChain::from_config(&TranslateConfig::default()).expect("chain");
        assert_eq!(chain.len(), 2);

        let config = TranslateConfig {
            google_endpoint: None,
            ..TranslateConfig::default()
        };
        assert_eq!(TranslatorChain::from_config(&config).expect("chain").len(), 1);

        let config = TranslateConfig {
            libre_endpoint: Some("not a url".into()),
            ..TranslateConfig::default()
        };
        assert!(matches!(
            TranslatorChain::from_config(&config),
            Err(TranslateError::Endpoint(_))
        ));
    }
}
