//! # epubdown
//!
//! Convert EPUB ebooks into clean, single-file Markdown documents,
//! suitable for ingestion by text-analysis tools.
//!
//! The pipeline runs strictly left to right per chapter:
//! raw bytes → parsed tree → cleaned tree → Markdown text → assembled
//! document. Noise elements (scripts, styles, navigation chrome) are
//! stripped, images become text placeholders, in-book links are
//! flattened to plain text, and the result carries a fixed front-matter
//! block plus per-chapter separators.
//!
//! ## Quick Start
//!
//! ```no_run
//! use epubdown::generate_markdown;
//!
//! let conversion = generate_markdown("book.epub").unwrap();
//! std::fs::write(&conversion.filename, &conversion.content).unwrap();
//! ```
//!
//! ## Working with Books
//!
//! The reader and the converter can also be used separately, e.g. for
//! in-memory sources:
//!
//! ```no_run
//! use std::io::Cursor;
//! use epubdown::{convert_book, epub::read_epub_from_reader};
//!
//! let bytes: Vec<u8> = std::fs::read("book.epub")?;
//! let book = read_epub_from_reader(Cursor::new(bytes))?;
//! let conversion = convert_book(&book);
//! println!("{}", conversion.filename);
//! # Ok::<(), epubdown::Error>(())
//! ```

pub mod book;
pub mod clean;
pub mod dom;
pub mod epub;
pub mod error;
pub mod markdown;
pub mod pipeline;
pub(crate) mod util;

pub use book::{Book, Metadata, SpineItem, TocEntry};
pub use epub::{read_epub, read_epub_from_reader};
pub use error::{Error, Result};
pub use pipeline::{Conversion, convert_book, generate_markdown, write_markdown};
