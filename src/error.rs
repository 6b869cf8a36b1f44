//! Error types for epubdown operations.

use thiserror::Error;

/// Errors that can occur while loading an EPUB or writing output.
///
/// Item-level problems (a single chapter that fails to decode or parse)
/// never surface here: decoding falls back to a legacy encoding, HTML
/// parsing is lenient, and empty sections are dropped by the assembler.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
