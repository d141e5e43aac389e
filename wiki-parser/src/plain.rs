//! Blocks from plain article text where headings are written `== Title ==`.

use crate::Block;

const LIST_MARKERS: &[&str] = &["* ", "- ", "• "];

/// Splits plain article content into blocks.
///
/// Heading rank is the number of `=` on one side, so `== History ==` is rank 2.
/// Consecutive bullet lines become one list block; every other non-empty line
/// is a paragraph.
///
/// # Example
///
/// ```
/// use wiki_parser::{blocks_from_plain_text, Block};
///
/// let blocks = blocks_from_plain_text("Lead.\n\n== History ==\nEarly days.");
/// assert_eq!(
///     blocks,
///     vec![
///         Block::paragraph("Lead."),
///         Block::heading(2, "History"),
///         Block::paragraph("Early days."),
///     ]
/// );
/// ```
pub fn blocks_from_plain_text(content: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut items: Vec<String> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(item) = list_item(trimmed) {
            items.push(item.to_string());
            continue;
        }
        flush_list(&mut blocks, &mut items);
        if trimmed.is_empty() {
            continue;
        }
        match heading_line(trimmed) {
            Some((level, title)) => blocks.push(Block::heading(level, title)),
            None => blocks.push(Block::paragraph(trimmed)),
        }
    }
    flush_list(&mut blocks, &mut items);

    blocks
}

fn flush_list(blocks: &mut Vec<Block>, items: &mut Vec<String>) {
    if !items.is_empty() {
        blocks.push(Block::list(std::mem::take(items)));
    }
}

fn list_item(line: &str) -> Option<&str> {
    LIST_MARKERS
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
}

fn heading_line(line: &str) -> Option<(u8, &str)> {
    let leading = line.chars().take_while(|&ch| ch == '=').count();
    let trailing = line.chars().rev().take_while(|&ch| ch == '=').count();
    if leading < 2 || leading != trailing || line.len() <= leading * 2 {
        return None;
    }
    let title = line[leading..line.len() - trailing].trim();
    let level = u8::try_from(leading).unwrap_or(u8::MAX);
    Some((level, title))
}
