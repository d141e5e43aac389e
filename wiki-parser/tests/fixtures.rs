use pretty_assertions::assert_eq;

use wiki_parser::extract_text;

#[test]
fn fixtures_match_expected_output() {
    let cases = [
        (
            "lead-with-infobox",
            include_str!("fixtures/html/lead-with-infobox.html"),
            include_str!("fixtures/expected/lead-with-infobox.txt"),
        ),
        (
            "no-structured-nodes",
            include_str!("fixtures/html/no-structured-nodes.html"),
            include_str!("fixtures/expected/no-structured-nodes.txt"),
        ),
        (
            "references-and-navbox",
            include_str!("fixtures/html/references-and-navbox.html"),
            include_str!("fixtures/expected/references-and-navbox.txt"),
        ),
        (
            "sections-and-list",
            include_str!("fixtures/html/sections-and-list.html"),
            include_str!("fixtures/expected/sections-and-list.txt"),
        ),
    ];

    for (name, html, expected) in cases {
        let actual = extract_text(html);
        assert_eq!(
            actual,
            expected.trim_end_matches('\n'),
            "fixture mismatch: {name}"
        );
    }
}
