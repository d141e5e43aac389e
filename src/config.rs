//! Command-line and environment configuration shared by the binaries.

use crate::language::{InvalidLanguage, Language, DEFAULT_LANGUAGE};
use crate::sections::{SplitterConfig, DEFAULT_BOILERPLATE_TITLES};
use crate::source::{SourceConfig, DEFAULT_ENDPOINT, DEFAULT_USER_AGENT};
use crate::translate::{TranslateConfig, DEFAULT_GOOGLE_ENDPOINT, DEFAULT_LIBRE_ENDPOINT};
use clap::{Args, Parser};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Section splitter knobs.
#[derive(Args, Debug, Clone)]
pub struct SplitterArgs {
    /// Headings folded into the preceding section, comma separated (empty = built-in list)
    #[arg(long, env = "WIKITRUTH_BOILERPLATE", default_value = "")]
    pub boilerplate: String,

    /// Table rows rendered into section bodies
    #[arg(long, env = "WIKITRUTH_TABLE_ROWS", default_value_t = 5)]
    pub table_rows: usize,
}

impl SplitterArgs {
    /// Converts the parsed arguments into a `SplitterConfig`.
    pub fn splitter_config(&self) -> SplitterConfig {
        let titles: Vec<String> = self
            .boilerplate
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        SplitterConfig {
            boilerplate_titles: if titles.is_empty() {
                DEFAULT_BOILERPLATE_TITLES
                    .iter()
                    .map(|title| title.to_string())
                    .collect()
            } else {
                titles
            },
            max_table_rows: self.table_rows,
            ..SplitterConfig::default()
        }
    }
}

/// HTTP server configuration.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "wikitruth-api",
    about = "HTTP API for sectioned encyclopedia articles and shared highlights"
)]
pub struct ServerCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "WIKITRUTH_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// JSON file holding every stored highlight.
    #[arg(long, env = "WIKITRUTH_HIGHLIGHTS", default_value = "data/highlights.json")]
    pub highlights: PathBuf,

    /// Language used when a request does not name one.
    #[arg(long, env = "WIKITRUTH_DEFAULT_LANG", default_value = DEFAULT_LANGUAGE)]
    pub default_lang: String,

    /// Milliseconds before a highlight store operation is abandoned.
    #[arg(long, env = "WIKITRUTH_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,

    /// Source API endpoint; `{lang}` is replaced by the edition code.
    #[arg(long, env = "WIKITRUTH_SOURCE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub source_endpoint: String,

    /// Seconds before source requests time out.
    #[arg(long, env = "WIKITRUTH_SOURCE_TIMEOUT_SECS", default_value_t = 15)]
    pub source_timeout_secs: u64,

    /// Attempts per source request for transient errors.
    #[arg(long, env = "WIKITRUTH_SOURCE_RETRIES", default_value_t = 3)]
    pub source_retries: usize,

    /// User agent sent to the source.
    #[arg(long, env = "WIKITRUTH_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Fetched articles kept in memory (0 disables caching).
    #[arg(long, env = "WIKITRUTH_ARTICLE_CACHE", default_value_t = 128)]
    pub article_cache: usize,

    /// LibreTranslate endpoint (empty disables the provider).
    #[arg(long, env = "WIKITRUTH_LIBRE_ENDPOINT", default_value = DEFAULT_LIBRE_ENDPOINT)]
    pub libre_endpoint: String,

    /// LibreTranslate API key.
    #[arg(long, env = "WIKITRUTH_LIBRE_API_KEY")]
    pub libre_api_key: Option<String>,

    /// Google Translate web endpoint (empty disables the provider).
    #[arg(
        long,
        env = "WIKITRUTH_GOOGLE_TRANSLATE_ENDPOINT",
        default_value = DEFAULT_GOOGLE_ENDPOINT
    )]
    pub google_translate_endpoint: String,

    /// Seconds before a translation request times out.
    #[arg(long, env = "WIKITRUTH_TRANSLATE_TIMEOUT_SECS", default_value_t = 10)]
    pub translate_timeout_secs: u64,

    /// Section splitter knobs.
    #[command(flatten)]
    pub splitter: SplitterArgs,
}

impl ServerCli {
    /// Validated default language.
    pub fn default_language(&self) -> Result<Language, InvalidLanguage> {
        Language::new(self.default_lang.as_str())
    }

    /// Bound applied to each store operation.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Source client settings.
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            endpoint: self.source_endpoint.clone(),
            timeout: Duration::from_secs(self.source_timeout_secs),
            max_retries: self.source_retries.max(1),
            user_agent: self.user_agent.clone(),
            ..SourceConfig::default()
        }
    }

    /// Translation provider settings.
    pub fn translate_config(&self) -> TranslateConfig {
        TranslateConfig {
            libre_endpoint: non_empty(&self.libre_endpoint),
            libre_api_key: self.libre_api_key.as_deref().and_then(non_empty),
            google_endpoint: non_empty(&self.google_translate_endpoint),
            timeout: Duration::from_secs(self.translate_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Article cache capacity, `None` when caching is disabled.
    pub fn article_cache_capacity(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.article_cache)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_describe_a_local_server() {
        let cli = ServerCli::try_parse_from(["wikitruth-api"]).expect("parse defaults");
        assert_eq!(cli.bind, "127.0.0.1:8080");
        assert_eq!(cli.store_timeout(), Duration::from_secs(2));
        assert_eq!(cli.default_language().expect("language").code(), "en");
        assert_eq!(cli.article_cache_capacity(), NonZeroUsize::new(128));
        assert_eq!(cli.splitter.splitter_config(), SplitterConfig::default());
    }

    #[test]
    fn overrides_boilerplate_and_cache() {
        let cli = ServerCli::try_parse_from([
            "wikitruth-api",
            "--boilerplate",
            "Références, Voir aussi,",
            "--article-cache",
            "0",
            "--source-retries",
            "0",
        ])
        .expect("parse");
        assert_eq!(
            cli.splitter.splitter_config().boilerplate_titles,
            vec!["Références".to_string(), "Voir aussi".to_string()]
        );
        assert_eq!(cli.article_cache_capacity(), None);
        assert_eq!(cli.source_config().max_retries, 1);
    }

    #[test]
    fn empty_translate_endpoint_disables_provider() {
        let cli = ServerCli::try_parse_from([
            "wikitruth-api",
            "--libre-endpoint",
            "",
            "--libre-api-key",
            "  ",
        ])
        .expect("parse");
        let config = cli.translate_config();
        assert_eq!(config.libre_endpoint, None);
        assert_eq!(config.libre_api_key, None);
        assert_eq!(config.google_endpoint.as_deref(), Some(DEFAULT_GOOGLE_ENDPOINT));
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn rejects_bad_default_language() {
        let cli = ServerCli::try_parse_from(["wikitruth-api", "--default-lang", "en.evil"])
            .expect("parse");
        assert!(cli.default_language().is_err());
    }
}
