//! Document assembly: orchestrates reader → cleaner → emitter across the
//! spine and produces the final Markdown artifact.

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::book::{Book, Metadata, strip_fragment};
use crate::clean::clean_fragment;
use crate::epub::read_epub;
use crate::error::Result;
use crate::markdown::{collapse_blank_lines, render_markdown};

/// Separator appended after every section.
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// A finished conversion: the document text and a suggested filename.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub content: String,
    pub filename: String,
}

/// Convert the EPUB at `path` to a Markdown document.
///
/// This is the top-level pipeline entry point. Container-level problems
/// (missing file, corrupt archive, unreadable manifest) surface as errors;
/// per-chapter problems are logged and skipped.
pub fn generate_markdown<P: AsRef<Path>>(path: P) -> Result<Conversion> {
    let book = read_epub(path)?;
    Ok(convert_book(&book))
}

/// Convert an already-loaded [`Book`] to a Markdown document.
///
/// Spine items are processed strictly in reading order. Each one is
/// cleaned and emitted independently; a section that comes out empty is
/// dropped, and a section whose text lacks a leading heading gets one
/// synthesized from the table of contents when a title is known for its
/// href.
pub fn convert_book(book: &Book) -> Conversion {
    let toc_map = book.toc_map();

    let mut document = front_matter(&book.metadata);

    for (href, raw) in book.spine_documents() {
        let tree = clean_fragment(raw);
        let markdown = render_markdown(&tree);

        if markdown.trim().is_empty() {
            tracing::debug!(href = %href, "dropping empty section");
            continue;
        }

        let toc_title = toc_map.get(strip_fragment(href));
        let section = match toc_title {
            Some(title) if !starts_with_heading(&markdown) => {
                format!("# {}\n\n{}", title, markdown)
            }
            _ => markdown,
        };

        document.push_str(&section);
        document.push_str(SECTION_SEPARATOR);
    }

    let mut content = collapse_blank_lines(&document);
    content.push('\n');

    Conversion {
        content,
        filename: format!(
            "{}_{}.md",
            sanitize_filename(&book.metadata.title),
            sanitize_filename(&book.metadata.author)
        ),
    }
}

/// Fixed metadata block prepended to every document.
fn front_matter(metadata: &Metadata) -> String {
    let date = chrono::Local::now().format("%Y-%m-%d");
    format!(
        "# 書名：{}\n\n# 作者：{}\n\n# 轉換日期：{}\n\n---\n\n",
        metadata.title, metadata.author, date
    )
}

/// True when the text opens with a Markdown heading marker (`#`+ then
/// whitespace).
fn starts_with_heading(text: &str) -> bool {
    let rest = text.trim_start_matches('#');
    rest.len() < text.len() && rest.starts_with(char::is_whitespace)
}

/// Strip characters that are unsafe in filenames and trim whitespace.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Write a conversion into `output_dir` (created if absent).
///
/// Returns the path of the written file.
pub fn write_markdown(conversion: &Conversion, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(&conversion.filename);
    std::fs::write(&path, &conversion.content)?;
    Ok(path)
}

/// Bundle multiple conversions into a ZIP archive, one `.md` entry each.
///
/// Used by batch front-ends when more than one input succeeds.
pub fn bundle_zip<W: Write + Seek>(conversions: &[Conversion], writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for conversion in conversions {
        zip.start_file(&conversion.filename, options)?;
        zip.write_all(conversion.content.as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::TocEntry;

    fn one_item_book(title: &str, author: &str, html: &[u8]) -> Book {
        let mut book = Book::new();
        book.metadata = Metadata::new(title).with_author(author);
        book.add_resource("ch01.xhtml", html.to_vec(), "application/xhtml+xml");
        book.add_spine_item("ch01", "ch01.xhtml", "application/xhtml+xml");
        book
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(r#"a\b/c*d?e:f"g<h>i|j"#), "abcdefghij");
        assert_eq!(sanitize_filename("  Wuthering Heights  "), "Wuthering Heights");
    }

    #[test]
    fn test_starts_with_heading() {
        assert!(starts_with_heading("# Title"));
        assert!(starts_with_heading("### Deep\nbody"));
        assert!(!starts_with_heading("#NoSpace"));
        assert!(!starts_with_heading("plain text"));
        assert!(!starts_with_heading(""));
    }

    #[test]
    fn test_front_matter_and_body() {
        let book = one_item_book("T", "A", b"<p>Hello</p>");
        let conversion = convert_book(&book);

        assert!(conversion.content.contains("# 書名：T"));
        assert!(conversion.content.contains("# 作者：A"));
        assert!(conversion.content.contains("# 轉換日期："));
        assert!(conversion.content.contains("Hello"));
        assert_eq!(conversion.filename, "T_A.md");
        // No TOC title known, so no heading is injected.
        assert!(!conversion.content.contains("# Hello"));
    }

    #[test]
    fn test_toc_title_injected_when_heading_missing() {
        let mut book = one_item_book("T", "A", b"<p>body text</p>");
        book.toc.push(TocEntry::new("Chapter 2", "ch01.xhtml#start"));

        let conversion = convert_book(&book);
        assert!(
            conversion.content.contains("# Chapter 2\n\nbody text"),
            "{}",
            conversion.content
        );
    }

    #[test]
    fn test_toc_title_not_injected_over_existing_heading() {
        let mut book = one_item_book("T", "A", b"<h2>Own Heading</h2><p>body</p>");
        book.toc.push(TocEntry::new("Chapter 2", "ch01.xhtml"));

        let conversion = convert_book(&book);
        assert!(!conversion.content.contains("# Chapter 2"));
        assert!(conversion.content.contains("## Own Heading"));
    }

    #[test]
    fn test_empty_sections_dropped() {
        let mut book = one_item_book("T", "A", b"<p>first</p>");
        book.add_resource("empty.xhtml", b"<div>   </div>".to_vec(), "application/xhtml+xml");
        book.add_spine_item("empty", "empty.xhtml", "application/xhtml+xml");
        book.add_resource("last.xhtml", b"<p>last</p>".to_vec(), "application/xhtml+xml");
        book.add_spine_item("last", "last.xhtml", "application/xhtml+xml");

        let conversion = convert_book(&book);
        assert!(conversion.content.contains("first"));
        assert!(conversion.content.contains("last"));
        // Front matter rule + two section separators; nothing for the
        // empty item.
        assert_eq!(conversion.content.matches("---").count(), 3);
    }

    #[test]
    fn test_no_newline_runs_in_final_document() {
        let book = one_item_book("T", "A", b"<p>a</p><div></div><p>b</p>");
        let conversion = convert_book(&book);
        assert!(!conversion.content.contains("\n\n\n"));
    }

    #[test]
    fn test_write_markdown_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("deep");
        let conversion = Conversion {
            content: "# x\n".to_string(),
            filename: "x.md".to_string(),
        };

        let path = write_markdown(&conversion, &nested).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# x\n");
    }
}
