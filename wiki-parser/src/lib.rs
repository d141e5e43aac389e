//! Extract structured article blocks from Wikipedia HTML.
//!
//! Headings, paragraphs, lists and tables are emitted in document order. Blocks
//! that live inside tables of contents, reference lists or navigation boxes are
//! kept but flagged as boilerplate, and infobox-style tables are flagged as
//! layout, so the section splitter decides what to drop.

use ego_tree::NodeRef;
use scraper::{node::Node, ElementRef, Html, Selector};

mod block;
mod plain;

pub use block::{Block, BlockKind, BlockParseError, RawBlock};
pub use plain::blocks_from_plain_text;

/// Elements whose text never reaches a block.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "sup", "noscript", "figure", "header", "footer", "nav", "aside",
];

/// Inline decorations dropped from collected text.
const SKIP_CLASSES: &[&str] = &[
    "mw-editsection",
    "mw-editsection-bracket",
    "reference",
    "shortdescription",
    "thumb",
    "thumbcaption",
];

/// Containers whose blocks are boilerplate rather than article prose.
const BOILERPLATE_CLASSES: &[&str] = &[
    "authority-control",
    "catlinks",
    "dablink",
    "hatnote",
    "metadata",
    "mw-footer",
    "mw-hidden-catlinks",
    "mw-normal-catlinks",
    "mw-references-columns",
    "mw-references-wrap",
    "navbox",
    "navbox-inner",
    "navbox-list",
    "printfooter",
    "refbegin",
    "reflist",
    "references",
    "sidebar",
    "toc",
    "toccolours",
    "vertical-navbox",
];

const BOILERPLATE_CLASS_PREFIXES: &[&str] = &["vector-toc", "toclimit-", "navbox-"];

/// Table classes marking infobox, navigation and message tables.
const LAYOUT_TABLE_CLASSES: &[&str] = &[
    "ambox",
    "infobox",
    "metadata",
    "navbox",
    "sidebar",
    "vertical-navbox",
];

const LAYOUT_TABLE_CLASS_PREFIXES: &[&str] = &["mbox", "navbox-", "infobox-"];

/// Extracts structured blocks from a Wikipedia HTML document.
///
/// # Example
///
/// ```
/// use wiki_parser::{extract_blocks, Block};
///
/// let html = r#"<div id="mw-content-text"><p>Hello <sup>[1]</sup>world.</p></div>"#;
/// assert_eq!(extract_blocks(html), vec![Block::paragraph("Hello world.")]);
/// ```
pub fn extract_blocks(html: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let root = select_content_root(&document).unwrap_or_else(|| document.root_element());

    let selector =
        Selector::parse("h1, h2, h3, h4, h5, h6, p, ul, ol, table").expect("valid block selector");
    let mut blocks = Vec::new();
    for element in root.select(&selector) {
        if is_nested_block(&element) || has_skipped_ancestor(&element) {
            continue;
        }
        let Some(mut block) = block_from_element(&element) else {
            continue;
        };
        if has_boilerplate_ancestor(&element) {
            block = block.in_boilerplate();
        }
        blocks.push(block);
    }

    if blocks.is_empty() {
        let mut buf = String::new();
        collect_text(&root, &mut buf);
        let normalized = normalize_whitespace(&buf);
        if !normalized.is_empty() {
            blocks.push(Block::paragraph(normalized));
        }
    }

    blocks
}

/// Extracts readable text, one block per line, leaving out boilerplate and layout tables.
///
/// # Example
///
/// ```
/// use wiki_parser::extract_text;
///
/// let html = r#"<div id="mw-content-text"><p>Hello <sup>[1]</sup>world.</p></div>"#;
/// assert_eq!(extract_text(html), "Hello world.");
/// ```
pub fn extract_text(html: &str) -> String {
    extract_blocks(html)
        .into_iter()
        .filter(|block| !block.boilerplate)
        .filter(|block| !matches!(block.kind, BlockKind::Table { layout: true, .. }))
        .map(|block| block.plain_text())
        .collect::<Vec<_>>()
        .join("\n")
}

fn select_content_root(document: &Html) -> Option<ElementRef<'_>> {
    let selectors = [
        "#mw-content-text .mw-parser-output",
        "#mw-content-text",
        "#bodyContent .mw-parser-output",
        "#bodyContent",
        "body .mw-parser-output",
        "body",
    ];
    for selector in selectors {
        let parsed = Selector::parse(selector).expect("valid selector");
        if let Some(node) = document.select(&parsed).next() {
            return Some(node);
        }
    }
    None
}

fn block_from_element(element: &ElementRef<'_>) -> Option<Block> {
    let tag = element.value().name();
    if let Some(level) = heading_level(tag) {
        // Empty headings still reach the splitter, which folds them.
        return Some(Block::heading(level, element_text(element)));
    }
    match tag {
        "p" => {
            let text = element_text(element);
            (!text.is_empty()).then(|| Block::paragraph(text))
        }
        "ul" | "ol" => {
            let items = list_items(element);
            (!items.is_empty()).then(|| Block::list(items))
        }
        "table" => {
            let rows = table_rows(element);
            if is_layout_table(element.value()) {
                Some(Block::layout_table(rows))
            } else {
                Some(Block::table(rows))
            }
        }
        _ => None,
    }
}

fn list_items(list: &ElementRef<'_>) -> Vec<String> {
    let selector = Selector::parse("li").expect("valid list item selector");
    list.select(&selector)
        .map(|item| {
            let mut buf = String::new();
            for child in item.children() {
                if ElementRef::wrap(child)
                    .is_some_and(|el| matches!(el.value().name(), "ul" | "ol"))
                {
                    continue;
                }
                collect_text(&child, &mut buf);
            }
            normalize_whitespace(&buf)
        })
        .collect()
}

fn table_rows(table: &ElementRef<'_>) -> Vec<Vec<String>> {
    let rows = Selector::parse("tr").expect("valid row selector");
    table
        .select(&rows)
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "th" | "td"))
                .map(|cell| element_text(&cell))
                .collect()
        })
        .collect()
}

fn element_text(element: &ElementRef<'_>) -> String {
    let mut buf = String::new();
    collect_text(element, &mut buf);
    normalize_whitespace(&buf)
}

fn collect_text(node: &NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(text);
        }
        Node::Element(element) => {
            if should_skip_element(element) {
                return;
            }
            for child in node.children() {
                collect_text(&child, out);
            }
        }
        _ => {
            for child in node.children() {
                collect_text(&child, out);
            }
        }
    }
}

fn should_skip_element(element: &scraper::node::Element) -> bool {
    let tag_name = element.name();
    if tag_name == "body" || tag_name == "html" {
        return false;
    }
    SKIP_TAGS.contains(&tag_name) || element.classes().any(|class| SKIP_CLASSES.contains(&class))
}

fn is_boilerplate_container(element: &scraper::node::Element) -> bool {
    element.classes().any(|class_name| {
        BOILERPLATE_CLASSES.contains(&class_name)
            || BOILERPLATE_CLASS_PREFIXES
                .iter()
                .any(|prefix| class_name.starts_with(prefix))
    }) || element.id() == Some("toc")
}

fn is_layout_table(element: &scraper::node::Element) -> bool {
    element.classes().any(|class_name| {
        LAYOUT_TABLE_CLASSES.contains(&class_name)
            || LAYOUT_TABLE_CLASS_PREFIXES
                .iter()
                .any(|prefix| class_name.starts_with(prefix))
    })
}

fn ancestor_elements<'a>(node: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    node.ancestors().filter_map(ElementRef::wrap)
}

/// Paragraphs inside list items or tables are part of the enclosing block.
fn is_nested_block(node: &ElementRef<'_>) -> bool {
    ancestor_elements(node).any(|ancestor| matches!(ancestor.value().name(), "ul" | "ol" | "table"))
}

fn has_skipped_ancestor(node: &ElementRef<'_>) -> bool {
    ancestor_elements(node).any(|ancestor| should_skip_element(ancestor.value()))
}

fn has_boilerplate_ancestor(node: &ElementRef<'_>) -> bool {
    ancestor_elements(node).any(|ancestor| is_boilerplate_container(ancestor.value()))
}

fn normalize_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_blocks, extract_text, Block};
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_paragraph_text() {
        let html = r#"
        <html>
          <body>
            <div id="mw-content-text">
              <p>Hello <sup>[1]</sup>world.</p>
              <p>Second paragraph.</p>
            </div>
          </body>
        </html>
        "#;

        assert_eq!(extract_text(html), "Hello world.\nSecond paragraph.");
    }

    #[test]
    fn extracts_blocks_with_kinds() {
        let html = r#"
        <div id="mw-content-text">
          <h2>Heading<span class="mw-editsection">[edit]</span></h2>
          <p>Paragraph text.</p>
          <ul><li>Item one</li><li>Item <b>two</b></li></ul>
          <table class="wikitable">
            <tr><th>Year</th><th>Event</th></tr>
            <tr><td>1990</td><td>Founded</td></tr>
          </table>
        </div>
        "#;

        assert_eq!(
            extract_blocks(html),
            vec![
                Block::heading(2, "Heading"),
                Block::paragraph("Paragraph text."),
                Block::list(["Item one", "Item two"]),
                Block::table(vec![
                    vec!["Year".into(), "Event".into()],
                    vec!["1990".into(), "Founded".into()],
                ]),
            ]
        );
    }

    #[test]
    fn flags_boilerplate_and_layout_tables() {
        let html = r#"
        <div id="mw-content-text">
          <table class="infobox"><tr><td>Born</td><td>1900</td></tr></table>
          <p>Keep this.</p>
          <div class="reflist"><ol><li>Cite one</li></ol></div>
          <div class="navbox"><p>Nav text</p></div>
        </div>
        "#;

        assert_eq!(
            extract_blocks(html),
            vec![
                Block::layout_table(vec![vec!["Born".into(), "1900".into()]]),
                Block::paragraph("Keep this."),
                Block::list(["Cite one"]).in_boilerplate(),
                Block::paragraph("Nav text").in_boilerplate(),
            ]
        );
        assert_eq!(extract_text(html), "Keep this.");
    }

    #[test]
    fn nested_lists_become_separate_items() {
        let html = r#"
        <div id="mw-content-text">
          <ul><li>Parent<ul><li>Child</li></ul></li><li><p>Wrapped</p></li></ul>
        </div>
        "#;

        assert_eq!(
            extract_blocks(html),
            vec![Block::list(["Parent", "Child", "Wrapped"])]
        );
    }

    #[test]
    fn falls_back_to_body_when_missing_content_div() {
        let html = r#"<body><p>Body text</p></body>"#;
        assert_eq!(extract_text(html), "Body text");
    }

    #[test]
    fn falls_back_to_root_text_without_blocks() {
        let html = r#"<body><div>No blocks here.</div></body>"#;
        assert_eq!(extract_blocks(html), vec![Block::paragraph("No blocks here.")]);
    }
}
