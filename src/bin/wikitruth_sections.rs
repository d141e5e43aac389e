use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use wikitruth::highlights::overlay::{DEFAULT_CLOSE, DEFAULT_OPEN};
use wikitruth::{ArticleKey, HighlightStore, Overlay, SectionView, Splitter, SplitterArgs};

#[derive(Parser, Debug)]
#[command(
    name = "wikitruth-sections",
    about = "Split an article into sections, optionally overlaying stored highlights"
)]
struct SectionsCli {
    /// Article file to read ('-' or omitted reads stdin).
    input: Option<PathBuf>,

    /// How to interpret the input.
    #[arg(long, value_enum, default_value_t = InputFormat::Html)]
    format: InputFormat,

    /// Lead text used when the article yields no sections.
    #[arg(long)]
    summary: Option<String>,

    /// Highlight store to read from.
    #[arg(long, env = "WIKITRUTH_HIGHLIGHTS", default_value = "data/highlights.json")]
    highlights: PathBuf,

    /// `{title}_{lang}` key whose highlights are overlaid.
    #[arg(long)]
    article_key: Option<String>,

    /// Opening marker for overlaid highlights.
    #[arg(long, default_value = DEFAULT_OPEN)]
    open: String,

    /// Closing marker for overlaid highlights.
    #[arg(long, default_value = DEFAULT_CLOSE)]
    close: String,

    #[command(flatten)]
    splitter: SplitterArgs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum InputFormat {
    /// Rendered article HTML.
    Html,
    /// Plain text with `== Heading ==` lines.
    Plain,
    /// JSON array of blocks.
    Blocks,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = SectionsCli::parse();
    let content = read_input(cli.input.as_ref())?;
    let splitter = Splitter::new(cli.splitter.splitter_config());
    let summary = cli.summary.as_deref();
    let sections = match cli.format {
        InputFormat::Html => splitter.split_html(&content, summary),
        InputFormat::Plain => splitter.split_text(&content, summary),
        InputFormat::Blocks => {
            let values: Vec<serde_json::Value> =
                serde_json::from_str(&content).context("input is not a JSON array")?;
            splitter.split_wire(values, summary)
        }
    };

    let phrases: Vec<String> = match &cli.article_key {
        Some(raw_key) => {
            let key = ArticleKey::parse(raw_key).context("invalid article key")?;
            HighlightStore::open(&cli.highlights)
                .get(&key)
                .into_iter()
                .map(|highlight| highlight.text)
                .collect()
        }
        None => Vec::new(),
    };
    let overlay = Overlay::new(cli.open, cli.close);
    let views: Vec<SectionView> = sections
        .into_iter()
        .map(|section| SectionView {
            title: section.display_title().to_string(),
            level: section.level,
            annotated: overlay.apply(&section.body, &phrases),
            body: section.body,
        })
        .collect();

    let json = serde_json::to_string_pretty(&views).context("failed to serialize sections")?;
    println!("{json}");
    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}
