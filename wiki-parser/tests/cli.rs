use std::io::Write;
use std::process::{Command, Stdio};

use pretty_assertions::assert_eq;
use serde_json::Value;

fn parse_stdout(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "cli exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("cli prints JSON")
}

#[test]
fn cli_reads_file_path() {
    let output = Command::new(env!("CARGO_BIN_EXE_wiki_parser"))
        .arg("tests/fixtures/html/sections-and-list.html")
        .output()
        .expect("run CLI");

    let expected: Value =
        serde_json::from_str(include_str!("fixtures/expected/sections-and-list.json"))
            .expect("expected JSON");
    assert_eq!(parse_stdout(&output), expected);
}

#[test]
fn cli_reads_plain_text_from_stdin() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_wiki_parser"))
        .arg("--plain")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn CLI");

    child
        .stdin
        .as_mut()
        .expect("stdin open")
        .write_all(b"Lead.\n\n== History ==\n* first\n* second\n")
        .expect("write stdin");

    let output = child.wait_with_output().expect("read CLI output");
    assert_eq!(
        parse_stdout(&output),
        serde_json::json!([
            { "kind": "paragraph", "text": "Lead.", "boilerplate": false },
            { "kind": "heading", "level": 2, "text": "History", "boilerplate": false },
            { "kind": "list", "items": ["first", "second"], "boilerplate": false }
        ])
    );
}

#[test]
fn cli_rejects_extra_arguments() {
    let output = Command::new(env!("CARGO_BIN_EXE_wiki_parser"))
        .args(["a.html", "b.html"])
        .output()
        .expect("run CLI");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unexpected argument: b.html"));
}
