use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

fn main() {
    if let Err(err) = run() {
        eprintln!("{}: {err}", env!("CARGO_PKG_NAME"));
        process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

    let mut format = Format::Html;
    let mut input = None;
    for arg in args {
        match arg.as_str() {
            flag if is_help_flag(flag) => {
                print_help(&program);
                return Ok(());
            }
            flag if is_version_flag(flag) => {
                println!("{}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--plain" => format = Format::Plain,
            "-" if input.is_none() => input = Some(Input::Stdin),
            path if input.is_none() && !path.starts_with("--") => {
                input = Some(Input::File(path.to_string()))
            }
            extra => {
                return Err(format!("unexpected argument: {extra}\n{}", usage(&program)));
            }
        }
    }

    let content = match input.unwrap_or(Input::Stdin) {
        Input::Stdin => read_stdin()?,
        Input::File(path) => read_file(&path)?,
    };

    let blocks = match format {
        Format::Html => wiki_parser::extract_blocks(&content),
        Format::Plain => wiki_parser::blocks_from_plain_text(&content),
    };
    let json = serde_json::to_string_pretty(&blocks)
        .map_err(|err| format!("failed to serialize JSON: {err}"))?;
    println!("{json}");
    Ok(())
}

enum Input {
    Stdin,
    File(String),
}

enum Format {
    Html,
    Plain,
}

fn is_help_flag(arg: &str) -> bool {
    arg == "-h" || arg == "--help"
}

fn is_version_flag(arg: &str) -> bool {
    arg == "-V" || arg == "--version"
}

fn read_file(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("failed to read '{path}': {err}"))
}

fn read_stdin() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|err| format!("failed to read stdin: {err}"))?;
    Ok(buf)
}

fn print_help(program: &str) {
    println!(
        "{}\n\nOptions:\n  --plain         Treat input as plain article text with == Heading == lines\n  -h, --help      Show this message\n  -V, --version   Print package version",
        usage(program)
    );
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [--plain] [ARTICLE_FILE|-]\n\n\
         Provide a path to a downloaded Wikipedia article or '-' to read from stdin. \
         When no path is passed, stdin is used. Blocks are printed as JSON."
    )
}
