use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Content types declared in [Content_Types].xml.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    /// Main document body (word/document.xml)
    MainDocument,
    /// Document styles (word/styles.xml)
    Styles,
    /// Numbering definitions (word/numbering.xml)
    Numbering,
    /// Core properties (docProps/core.xml)
    CoreProperties,
    /// Relationships part
    Relationships,
    /// PNG image
    ImagePng,
    /// JPEG image
    ImageJpeg,
    /// GIF image
    ImageGif,
    /// BMP image
    ImageBmp,
    /// WebP image
    ImageWebP,
    /// TIFF image
    ImageTiff,
    /// SVG image
    ImageSvg,
    /// Anything else
    Unknown(String),
}

impl ContentType {
    /// Parse a content type string into the enum.
    pub fn from_string(s: &str) -> Self {
        match s {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml" => {
                ContentType::MainDocument
            }
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml" => {
                ContentType::Styles
            }
            "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml" => {
                ContentType::Numbering
            }
            "application/vnd.openxmlformats-package.core-properties+xml" => {
                ContentType::CoreProperties
            }
            "application/vnd.openxmlformats-package.relationships+xml" => {
                ContentType::Relationships
            }
            "image/png" => ContentType::ImagePng,
            "image/jpeg" | "image/jpg" => ContentType::ImageJpeg,
            "image/gif" => ContentType::ImageGif,
            "image/bmp" => ContentType::ImageBmp,
            "image/webp" => ContentType::ImageWebP,
            "image/tiff" | "image/tif" => ContentType::ImageTiff,
            "image/svg+xml" => ContentType::ImageSvg,
            _ => ContentType::Unknown(s.to_string()),
        }
    }

    /// Check if this is an image content type.
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            ContentType::ImagePng
                | ContentType::ImageJpeg
                | ContentType::ImageGif
                | ContentType::ImageBmp
                | ContentType::ImageWebP
                | ContentType::ImageTiff
                | ContentType::ImageSvg
        ) || matches!(self, ContentType::Unknown(s) if s.starts_with("image/"))
    }

    /// MIME string usable in a data URI, if this type carries one.
    pub fn mime(&self) -> Option<&str> {
        match self {
            ContentType::ImagePng => Some("image/png"),
            ContentType::ImageJpeg => Some("image/jpeg"),
            ContentType::ImageGif => Some("image/gif"),
            ContentType::ImageBmp => Some("image/bmp"),
            ContentType::ImageWebP => Some("image/webp"),
            ContentType::ImageTiff => Some("image/tiff"),
            ContentType::ImageSvg => Some("image/svg+xml"),
            ContentType::Unknown(s) if s.starts_with("image/") => Some(s),
            _ => None,
        }
    }
}

/// Relationship type constants (ECMA-376).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// Office document relationship (package root -> main document)
    OfficeDocument,
    /// Styles relationship
    Styles,
    /// Numbering relationship
    Numbering,
    /// Core properties relationship
    CoreProperties,
    /// Image relationship
    Image,
    /// Unknown relationship type
    Unknown(String),
}

impl RelationshipType {
    /// Parse a relationship type URI into the enum.
    pub fn from_string(s: &str) -> Self {
        match s {
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" => {
                RelationshipType::OfficeDocument
            }
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" => {
                RelationshipType::Styles
            }
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" => {
                RelationshipType::Numbering
            }
            "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" => {
                RelationshipType::CoreProperties
            }
            rel if rel.contains("relationships/image") => RelationshipType::Image,
            _ => RelationshipType::Unknown(s.to_string()),
        }
    }

    /// Check if this is an image relationship type.
    pub fn is_image(&self) -> bool {
        matches!(self, RelationshipType::Image)
    }
}

/// A relationship between parts in the package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship ID (e.g. "rId1")
    pub id: String,
    /// Type of relationship
    pub relationship_type: RelationshipType,
    /// Target URI, usually relative to the source part
    pub target: String,
    /// Target mode (Internal or External)
    pub target_mode: Option<String>,
}

/// A part in the OPC package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagePart {
    /// Normalized part name (e.g. "/word/document.xml")
    pub name: String,
    /// Content type of the part
    pub content_type: ContentType,
    /// Raw binary data of the part
    pub data: Vec<u8>,
}

/// A parsed paragraph from the main document body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paragraph {
    /// Concatenated run text
    pub text: String,
    /// Paragraph properties (style, alignment, numbering)
    pub properties: ParagraphProperties,
    /// Runs in this paragraph
    pub runs: Vec<Run>,
}

/// Properties of a paragraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParagraphProperties {
    /// Style ID from w:pStyle
    pub style_id: Option<String>,
    /// Alignment from w:jc ("center", "left", ...)
    pub alignment: Option<String>,
    /// Numbering reference from w:numPr, if this paragraph is a list item
    pub numbering: Option<NumberingRef>,
}

/// A paragraph's reference into the numbering definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumberingRef {
    /// Numbering instance ID from w:numId
    pub num_id: String,
    /// Indentation level from w:ilvl (0 = outermost)
    pub level: u32,
}

/// A run of text with uniform formatting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Run {
    /// Text content, with breaks and tabs folded to "\n" / "\t"
    pub text: String,
    /// Run properties
    pub properties: RunProperties,
    /// Relationship ID of an embedded image, if the run holds a drawing
    pub image_ref: Option<String>,
}

/// Formatting flags of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunProperties {
    /// Bold toggle
    pub bold: Option<bool>,
    /// Italic toggle
    pub italic: Option<bool>,
    /// Underline kind from w:u ("single", "none", ...)
    pub underline: Option<String>,
    /// Strike-through toggle
    pub strike: Option<bool>,
    /// Small caps toggle
    pub small_caps: Option<bool>,
    /// All caps toggle
    pub caps: Option<bool>,
    /// Character style ID from w:rStyle
    pub style_id: Option<String>,
}

impl RunProperties {
    /// True when no formatting flag is set.
    pub fn is_default(&self) -> bool {
        self == &RunProperties::default()
    }
}

/// A style definition from word/styles.xml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Style {
    /// Style ID (e.g. "Heading1")
    pub id: String,
    /// Display name (e.g. "Heading 1")
    pub name: Option<String>,
    /// Style type (paragraph, character, table, numbering)
    pub style_type: String,
    /// Style ID of the parent style
    pub based_on: Option<String>,
    /// Whether this is the default style for its type
    pub is_default: bool,
}

/// Numbering definitions from word/numbering.xml, reduced to what the
/// HTML conversion needs: which instances render as bullets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumberingDefinitions {
    /// numId -> abstractNumId
    pub instances: HashMap<String, String>,
    /// abstractNumId -> numbering format of the outermost level
    /// ("bullet", "decimal", "lowerLetter", ...)
    pub level_formats: HashMap<String, String>,
}

impl NumberingDefinitions {
    /// Whether the given numbering instance renders as a bullet list.
    pub fn is_bullet(&self, num_id: &str) -> bool {
        self.instances
            .get(num_id)
            .and_then(|abs| self.level_formats.get(abs))
            .map(|fmt| fmt == "bullet")
            .unwrap_or(false)
    }
}

/// Core document properties from docProps/core.xml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
}
