//! Article export through a pluggable document writer.

use crate::article::FetchedArticle;
use crate::sections::Section;
use chrono::NaiveDateTime;

/// Deepest heading level a document format is asked to render.
pub const MAX_DOCUMENT_HEADING: u8 = 9;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MAX_MARKDOWN_HEADING: usize = 6;

/// Sink for document structure.
pub trait DocumentWriter {
    /// Document title.
    fn title(&mut self, text: &str);
    /// Heading at `level` (1 is the outermost).
    fn heading(&mut self, text: &str, level: u8);
    /// Body paragraph.
    fn paragraph(&mut self, text: &str);
}

/// Renders documents as Markdown.
#[derive(Debug, Default)]
pub struct MarkdownWriter {
    out: String,
}

impl MarkdownWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered document.
    pub fn finish(self) -> String {
        self.out
    }

    fn push_block(&mut self, block: &str) {
        self.out.push_str(block);
        self.out.push_str("\n\n");
    }
}

impl DocumentWriter for MarkdownWriter {
    fn title(&mut self, text: &str) {
        self.push_block(&format!("# {}", text.trim()));
    }

    // Level 1 sits below the title.
    fn heading(&mut self, text: &str, level: u8) {
        let hashes = (usize::from(level) + 1).clamp(2, MAX_MARKDOWN_HEADING);
        self.push_block(&format!("{} {}", "#".repeat(hashes), text.trim()));
    }

    fn paragraph(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.push_block(text);
        }
    }
}

/// Writes an article: title, metadata, summary, then every section.
pub fn export_article<W: DocumentWriter>(
    article: &FetchedArticle,
    sections: &[Section],
    exported_at: NaiveDateTime,
    writer: &mut W,
) {
    writer.title(&article.title);
    writer.paragraph(&format!("Source: {}", source_url(article)));
    writer.paragraph(&format!(
        "Language: {} ({})",
        article.language.name(),
        article.language.code()
    ));
    writer.paragraph(&format!(
        "Exported on: {}",
        exported_at.format(TIMESTAMP_FORMAT)
    ));

    writer.heading("Summary", 1);
    writer.paragraph(&article.summary);

    writer.heading("Full Content", 1);
    for section in sections {
        if !section.is_lead() {
            writer.heading(
                &section.title,
                section.level.saturating_add(1).min(MAX_DOCUMENT_HEADING),
            );
        }
        writer.paragraph(&section.body);
    }
}

/// Renders an article to Markdown.
pub fn export_markdown(
    article: &FetchedArticle,
    sections: &[Section],
    exported_at: NaiveDateTime,
) -> String {
    let mut writer = MarkdownWriter::new();
    export_article(article, sections, exported_at, &mut writer);
    writer.finish()
}

/// Download name with path separators in the title replaced.
pub fn export_filename(title: &str, language: &str, extension: &str) -> String {
    let safe = title.replace(['/', '\\'], "_");
    format!("{safe}_{language}.{extension}")
}

/// `Content-Disposition` value for downloading `filename` as an attachment.
///
/// Control characters are dropped. Non-ASCII names get an ASCII `filename`
/// fallback plus a UTF-8 `filename*` parameter.
pub fn attachment_disposition(filename: &str) -> String {
    let cleaned: String = filename.chars().filter(|ch| !ch.is_control()).collect();
    let fallback: String = cleaned
        .chars()
        .map(|ch| match ch {
            '"' => '\'',
            '\\' => '_',
            ch if ch.is_ascii() => ch,
            _ => '_',
        })
        .collect();
    if cleaned.is_ascii() {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(&cleaned)
        )
    }
}

fn source_url(article: &FetchedArticle) -> String {
    match &article.url {
        Some(url) => url.clone(),
        None => format!(
            "https://{}.wikipedia.org/wiki/{}",
            article.language.code(),
            article.title.replace(' ', "_")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleContent;
    use crate::language::Language;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn exported_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(14, 5, 0))
            .expect("valid timestamp")
    }

    fn article(url: Option<&str>) -> FetchedArticle {
        FetchedArticle {
            title: "Tour Eiffel".into(),
            language: Language::new("fr").expect("language"),
            url: url.map(str::to_string),
            summary: "Une tour.".into(),
            content: ArticleContent::Plain(String::new()),
            images: Vec::new(),
            languages: Vec::new(),
        }
    }

    fn section(title: &str, level: u8, body: &str) -> Section {
        Section {
            title: title.into(),
            level,
            body: body.into(),
        }
    }

    #[test]
    fn renders_markdown_document() {
        let sections = vec![
            section("", 1, "Lead text.\n\n"),
            section("Histoire", 1, "Construite en 1889.\n\n"),
            section("Détails", 2, "• Fer\n• Rivets\n\n"),
        ];
        let doc = export_markdown(
            &article(Some("https://fr.wikipedia.org/wiki/Tour_Eiffel")),
            &sections,
            exported_at(),
        );
        assert_eq!(
            doc,
            "# Tour Eiffel\n\n\
             Source: https://fr.wikipedia.org/wiki/Tour_Eiffel\n\n\
             Language: French (fr)\n\n\
             Exported on: 2024-03-09 14:05:00\n\n\
             ## Summary\n\n\
             Une tour.\n\n\
             ## Full Content\n\n\
             Lead text.\n\n\
             ### Histoire\n\n\
             Construite en 1889.\n\n\
             #### Détails\n\n\
             • Fer\n• Rivets\n\n"
        );
    }

    #[derive(Default)]
    struct Recorder {
        headings: Vec<(String, u8)>,
    }

    impl DocumentWriter for Recorder {
        fn title(&mut self, _text: &str) {}

        fn heading(&mut self, text: &str, level: u8) {
            self.headings.push((text.to_string(), level));
        }

        fn paragraph(&mut self, _text: &str) {}
    }

    #[test]
    fn section_headings_are_shifted_and_capped() {
        let mut recorder = Recorder::default();
        export_article(
            &article(None),
            &[section("Deep", 9, "x"), section("Top", 1, "y")],
            exported_at(),
            &mut recorder,
        );
        assert_eq!(
            recorder.headings,
            vec![
                ("Summary".to_string(), 1),
                ("Full Content".to_string(), 1),
                ("Deep".to_string(), 9),
                ("Top".to_string(), 2),
            ]
        );
    }

    #[test]
    fn builds_source_url_when_missing() {
        assert_eq!(
            source_url(&article(None)),
            "https://fr.wikipedia.org/wiki/Tour_Eiffel"
        );
    }

    #[test]
    fn filename_replaces_path_separators() {
        assert_eq!(export_filename("AC/DC \\ live", "en", "md"), "AC_DC _ live_en.md");
    }

    #[test]
    fn disposition_strips_controls_and_encodes_unicode() {
        assert_eq!(
            attachment_disposition("Evil\r\nSet-Cookie: x_en.md"),
            "attachment; filename=\"EvilSet-Cookie: x_en.md\""
        );
        assert_eq!(
            attachment_disposition("Say \"hi\"_en.md"),
            "attachment; filename=\"Say 'hi'_en.md\""
        );
        assert_eq!(
            attachment_disposition("東京_ja.md"),
            "attachment; filename=\"___ja.md\"; filename*=UTF-8''%E6%9D%B1%E4%BA%AC_ja.md"
        );
    }
}
