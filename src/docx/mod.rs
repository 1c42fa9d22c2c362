//! DOCX (Office Open XML) support for the editor.
//!
//! A .docx file is an OPC (Open Packaging Conventions) package: a ZIP archive
//! of XML parts wired together by relationship files. This module handles both
//! directions. [`docx_to_html`] unpacks a package and converts its main
//! document into the semantic HTML the editor works on, and [`html_to_docx`]
//! serializes edited HTML back into a minimal valid package.
//!
//! # Example
//!
//! ```rust,no_run
//! use redline_core::docx;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file_data = std::fs::read("contract.docx")?;
//!     let converted = docx::docx_to_html(&file_data)?;
//!     println!("{}", converted.html);
//!     Ok(())
//! }
//! ```

mod document;
mod error;
mod opc;
mod reader;
mod types;
mod writer;

pub use document::WordDocument;
pub use error::DocxError;
pub use opc::OpcPackage;
pub use reader::{docx_to_html, ConvertedDocument};
pub use types::{
    ContentType, CoreProperties, NumberingDefinitions, NumberingRef, PackagePart, Paragraph,
    ParagraphProperties, Relationship, RelationshipType, Run, RunProperties, Style,
};
pub use writer::html_to_docx;
