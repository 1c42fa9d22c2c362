//! Error type shared by the .docx reader and writer.

use thiserror::Error;

/// Errors raised while reading or writing .docx packages.
#[derive(Error, Debug)]
pub enum DocxError {
    /// The byte stream is not a readable ZIP archive.
    #[error("not a valid document archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Reading from or writing to the archive failed.
    #[error("document I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A part required by the package structure is absent.
    #[error("required package part not found: {0}")]
    PartNotFound(String),

    /// The archive opened fine but holds no extractable text.
    #[error("document appears to be empty")]
    NoTextContent,

    /// A part exists but its XML is not usable.
    #[error("malformed document XML: {0}")]
    MalformedXml(String),
}
