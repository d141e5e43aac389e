//! Wraps highlighted phrases in display markers.
//!
//! Matches are located on the original text and claimed longest-first, so a
//! shorter phrase never matches inside a longer one that was already wrapped and
//! never matches the markers themselves.

use html_escape::encode_text;
use regex::RegexBuilder;
use std::collections::{BTreeMap, HashSet};

/// Default opening marker.
pub const DEFAULT_OPEN: &str = "<mark>";
/// Default closing marker.
pub const DEFAULT_CLOSE: &str = "</mark>";

const DEFAULT_REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Marker configuration for highlight overlays.
#[derive(Debug, Clone)]
pub struct Overlay {
    open: String,
    close: String,
    regex_size_limit: usize,
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN, DEFAULT_CLOSE)
    }
}

impl Overlay {
    /// Overlay with custom markers.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
        }
    }

    /// Caps compiled pattern size; phrases over the cap fall back to exact matching.
    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.regex_size_limit = limit;
        self
    }

    /// Wraps each whole-word, case-insensitive occurrence of every highlight.
    ///
    /// The original casing of the text is preserved. Empty text or an empty
    /// highlight list returns the text unchanged.
    pub fn apply<S: AsRef<str>>(&self, text: &str, highlights: &[S]) -> String {
        self.render(text, highlights, |segment, out| out.push_str(segment))
    }

    /// Like [`Overlay::apply`] but HTML-escapes every text segment.
    ///
    /// Use this when the markers are HTML and the output is rendered as markup.
    pub fn apply_html<S: AsRef<str>>(&self, text: &str, highlights: &[S]) -> String {
        self.render(text, highlights, |segment, out| {
            out.push_str(&encode_text(segment))
        })
    }

    fn render<S, F>(&self, text: &str, highlights: &[S], mut push: F) -> String
    where
        S: AsRef<str>,
        F: FnMut(&str, &mut String),
    {
        let spans = self.spans(text, highlights);
        let marker_len = self.open.len() + self.close.len();
        let mut out = String::with_capacity(text.len() + spans.len() * marker_len);
        let mut cursor = 0;
        for (start, end) in spans {
            push(&text[cursor..start], &mut out);
            out.push_str(&self.open);
            push(&text[start..end], &mut out);
            out.push_str(&self.close);
            cursor = end;
        }
        push(&text[cursor..], &mut out);
        out
    }

    /// Non-overlapping byte spans to wrap, sorted by start.
    fn spans<S: AsRef<str>>(&self, text: &str, highlights: &[S]) -> Vec<(usize, usize)> {
        if text.is_empty() {
            return Vec::new();
        }
        // Claimed spans never overlap, keyed by start.
        let mut claimed: BTreeMap<usize, usize> = BTreeMap::new();
        for phrase in ordered_phrases(highlights) {
            for (start, end) in self.find_matches(text, phrase) {
                let overlaps = claimed
                    .range(..end)
                    .next_back()
                    .is_some_and(|(_, &claimed_end)| claimed_end > start);
                if !overlaps {
                    claimed.insert(start, end);
                }
            }
        }
        claimed.into_iter().collect()
    }

    fn find_matches(&self, text: &str, phrase: &str) -> Vec<(usize, usize)> {
        let regex = match RegexBuilder::new(&regex::escape(phrase))
            .case_insensitive(true)
            .size_limit(self.regex_size_limit)
            .build()
        {
            Ok(regex) => regex,
            Err(err) => {
                tracing::debug!(error = %err, "highlight pattern rejected, using exact match");
                return text
                    .match_indices(phrase)
                    .map(|(start, found)| (start, start + found.len()))
                    .collect();
            }
        };

        let mut matches = Vec::new();
        let mut at = 0;
        while at <= text.len() {
            let Some(found) = regex.find_at(text, at) else {
                break;
            };
            if is_word_bounded(text, found.start(), found.end()) {
                matches.push((found.start(), found.end()));
                at = found.end().max(found.start() + 1);
            } else {
                // Retry one character past the rejected start.
                at = found.start()
                    + text[found.start()..]
                        .chars()
                        .next()
                        .map_or(1, char::len_utf8);
            }
        }
        matches
    }
}

/// Trimmed, deduplicated phrases, longest first.
///
/// Case variants stay distinct so the exact-match fallback gives each its own
/// pass; under case-insensitive matching the later variant claims nothing new.
fn ordered_phrases<S: AsRef<str>>(highlights: &[S]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut phrases: Vec<&str> = highlights
        .iter()
        .map(|h| h.as_ref().trim())
        .filter(|h| !h.is_empty() && seen.insert(*h))
        .collect();
    phrases.sort_by_key(|phrase| std::cmp::Reverse(phrase.chars().count()));
    phrases
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|ch| ch.is_ascii_alphanumeric())
        && !after.is_some_and(|ch| ch.is_ascii_alphanumeric())
}

/// Applies the default `<mark>` overlay.
pub fn annotate<S: AsRef<str>>(text: &str, highlights: &[S]) -> String {
    Overlay::default().apply(text, highlights)
}
