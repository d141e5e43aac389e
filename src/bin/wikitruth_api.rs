use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wikitruth::api::{build_cache, router, AppState};
use wikitruth::{
    GuardedStore, HighlightStore, Overlay, ServerCli, Splitter, TranslatorChain, WikipediaClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = ServerCli::parse();
    let default_language = cli
        .default_language()
        .context("invalid default language")?;
    let source =
        WikipediaClient::new(cli.source_config()).context("failed to build source client")?;
    let translator = TranslatorChain::from_config(&cli.translate_config())
        .context("failed to build translation providers")?;
    if translator.is_empty() {
        tracing::warn!("no translation provider configured; /v1/translate will fail");
    }
    let store = GuardedStore::new(HighlightStore::open(&cli.highlights), cli.store_timeout());

    let state = AppState {
        store,
        source: Arc::new(source),
        translator: Arc::new(translator),
        splitter: Arc::new(Splitter::new(cli.splitter.splitter_config())),
        overlay: Arc::new(Overlay::default()),
        default_language,
        article_cache: build_cache(cli.article_cache_capacity()),
    };
    let app = router(state);

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    tracing::info!(
        %addr,
        highlights = %cli.highlights.display(),
        "wikitruth api listening"
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("server shutdown")?;
    Ok(())
}
