//! WordProcessingML document parser.
//!
//! Pulls paragraphs, runs, styles, and numbering definitions out of the
//! package parts with targeted regular expressions. This is not a general
//! XML parser; it reads the subset of WordProcessingML the HTML conversion
//! consumes and shrugs off everything else.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::error::DocxError;
use super::opc::OpcPackage;
use super::types::{
    CoreProperties, NumberingDefinitions, NumberingRef, Paragraph, ParagraphProperties, Run,
    RunProperties, Style,
};

static BODY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:body(?:\s[^>]*)?>(.*?)</w:body>").unwrap());
static PARA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").unwrap());
static PPR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<w:pPr>(.*?)</w:pPr>").unwrap());
static RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:r(?:\s[^>]*)?>(.*?)</w:r>").unwrap());
static RPR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<w:rPr>(.*?)</w:rPr>").unwrap());
// Text plus the break-like elements that fold into run text.
static RUN_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(?:br|cr)\s*/>|<w:tab\s*/>").unwrap()
});
// Toggle properties appear bare (<w:b/>) or with an explicit value.
static RUN_TOGGLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<w:(b|i|strike|smallCaps|caps)(?:\s+w:val="([^"]*)")?\s*/>"#).unwrap()
});
static UNDERLINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:u\s[^>]*w:val="([^"]*)""#).unwrap());
static RSTYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:rStyle[^>]*w:val="([^"]*)""#).unwrap());
static PSTYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:pStyle[^>]*w:val="([^"]*)""#).unwrap());
static JC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<w:jc[^>]*w:val="([^"]*)""#).unwrap());
static NUMPR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<w:numPr>(.*?)</w:numPr>").unwrap());
static NUMID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:numId[^>]*w:val="([^"]*)""#).unwrap());
static ILVL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<w:ilvl[^>]*w:val="(\d+)""#).unwrap());
static BLIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a:blip[^>]*r:embed="([^"]*)""#).unwrap());

static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:style\s+([^>]*)>(.*?)</w:style>").unwrap());
static STYLE_ID_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"w:styleId="([^"]*)""#).unwrap());
static STYLE_TYPE_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"w:type="([^"]*)""#).unwrap());
static STYLE_DEFAULT_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"w:default="(?:1|true)""#).unwrap());
static STYLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:name[^>]*w:val="([^"]*)""#).unwrap());
static BASED_ON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:basedOn[^>]*w:val="([^"]*)""#).unwrap());

static NUM_INSTANCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<w:num\s[^>]*w:numId="([^"]*)"[^>]*>(.*?)</w:num>"#).unwrap());
static ABSTRACT_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:abstractNumId[^>]*w:val="([^"]*)""#).unwrap());
static ABSTRACT_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<w:abstractNum\s[^>]*w:abstractNumId="([^"]*)"[^>]*>(.*?)</w:abstractNum>"#)
        .unwrap()
});
static NUMFMT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:numFmt[^>]*w:val="([^"]*)""#).unwrap());

static NUMERIC_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x[0-9A-Fa-f]+|\d+);").unwrap());

/// WordProcessingML document parser.
#[derive(Debug, Clone, Default)]
pub struct WordDocument {
    /// Extracted text, paragraphs joined with newlines
    pub text: String,
    /// Parsed paragraphs in body order
    pub paragraphs: Vec<Paragraph>,
    /// Document styles indexed by style ID
    pub styles: HashMap<String, Style>,
    /// Numbering definitions
    pub numbering: NumberingDefinitions,
    /// Core properties (title, author, timestamps)
    pub core_properties: Option<CoreProperties>,
}

impl WordDocument {
    /// Parse the Word document carried by an OPC package.
    pub fn parse(package: &OpcPackage) -> Result<Self, DocxError> {
        let mut document = WordDocument::default();
        document.parse_main_document(package)?;
        document.parse_styles(package);
        document.parse_numbering(package);
        document.parse_core_properties(package);
        Ok(document)
    }

    /// Parse the main document body.
    fn parse_main_document(&mut self, package: &OpcPackage) -> Result<(), DocxError> {
        let main_part_name = package.main_document_part_name();
        let main_part = package
            .get_part(&main_part_name)
            .ok_or_else(|| DocxError::PartNotFound(main_part_name.clone()))?;

        let xml_str = String::from_utf8_lossy(&main_part.data);
        let body = match BODY_RE.captures(&xml_str) {
            Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(""),
            None => return Err(DocxError::MalformedXml("missing <w:body> element".into())),
        };

        for para_cap in PARA_RE.captures_iter(body) {
            if let Some(para) = Self::parse_paragraph(&para_cap[1]) {
                self.paragraphs.push(para);
            }
        }

        self.text = self
            .paragraphs
            .iter()
            .map(|p| p.text.clone())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(())
    }

    /// Parse one paragraph from its inner XML. Paragraphs with no runs
    /// (typically empty paragraph marks) are dropped.
    fn parse_paragraph(para_xml: &str) -> Option<Paragraph> {
        let mut paragraph = Paragraph::default();

        if let Some(ppr_cap) = PPR_RE.captures(para_xml) {
            paragraph.properties = Self::parse_paragraph_properties(&ppr_cap[1]);
        }

        for run_cap in RUN_RE.captures_iter(para_xml) {
            let run_xml = &run_cap[1];
            let mut run = Run::default();

            for text_cap in RUN_TEXT_RE.captures_iter(run_xml) {
                match text_cap.get(1) {
                    Some(text) => run.text.push_str(&unescape_xml_text(text.as_str())),
                    None if text_cap[0].starts_with("<w:tab") => run.text.push('\t'),
                    None => run.text.push('\n'),
                }
            }

            if let Some(rpr_cap) = RPR_RE.captures(run_xml) {
                Self::parse_run_properties(&rpr_cap[1], &mut run.properties);
            }

            if let Some(blip_cap) = BLIP_RE.captures(run_xml) {
                run.image_ref = Some(blip_cap[1].to_string());
            }

            if !run.text.is_empty() || run.image_ref.is_some() {
                paragraph.runs.push(run);
            }
        }

        if paragraph.runs.is_empty() {
            return None;
        }

        paragraph.text = paragraph.runs.iter().map(|r| r.text.clone()).collect();
        Some(paragraph)
    }

    /// Parse paragraph properties from the inner w:pPr XML.
    fn parse_paragraph_properties(ppr_xml: &str) -> ParagraphProperties {
        let mut props = ParagraphProperties::default();

        if let Some(caps) = PSTYLE_RE.captures(ppr_xml) {
            props.style_id = Some(caps[1].to_string());
        }
        if let Some(caps) = JC_RE.captures(ppr_xml) {
            props.alignment = Some(caps[1].to_string());
        }
        if let Some(num_caps) = NUMPR_RE.captures(ppr_xml) {
            let num_xml = &num_caps[1];
            if let Some(id_caps) = NUMID_RE.captures(num_xml) {
                let level = ILVL_RE
                    .captures(num_xml)
                    .and_then(|c| c[1].parse::<u32>().ok())
                    .unwrap_or(0);
                props.numbering = Some(NumberingRef {
                    num_id: id_caps[1].to_string(),
                    level,
                });
            }
        }

        props
    }

    /// Parse run properties from the inner w:rPr XML.
    fn parse_run_properties(rpr_xml: &str, props: &mut RunProperties) {
        for cap in RUN_TOGGLE_RE.captures_iter(rpr_xml) {
            let on = cap
                .get(2)
                .map(|v| v.as_str() != "0" && v.as_str() != "false")
                .unwrap_or(true);
            match &cap[1] {
                "b" => props.bold = Some(on),
                "i" => props.italic = Some(on),
                "strike" => props.strike = Some(on),
                "smallCaps" => props.small_caps = Some(on),
                "caps" => props.caps = Some(on),
                _ => {}
            }
        }

        if let Some(caps) = UNDERLINE_RE.captures(rpr_xml) {
            props.underline = Some(caps[1].to_string());
        }
        if let Some(caps) = RSTYLE_RE.captures(rpr_xml) {
            props.style_id = Some(caps[1].to_string());
        }
    }

    /// Parse styles (word/styles.xml). Missing part is not an error.
    fn parse_styles(&mut self, package: &OpcPackage) {
        let styles_part = match package.get_part("/word/styles.xml") {
            Some(part) => part,
            None => return,
        };

        let xml_str = String::from_utf8_lossy(&styles_part.data);

        for cap in STYLE_RE.captures_iter(&xml_str) {
            let attrs = &cap[1];
            let style_xml = &cap[2];

            let style_id = match STYLE_ID_ATTR_RE.captures(attrs) {
                Some(id_cap) => id_cap[1].to_string(),
                None => continue,
            };

            let style = Style {
                id: style_id.clone(),
                name: STYLE_NAME_RE
                    .captures(style_xml)
                    .map(|c| unescape_xml_text(&c[1])),
                style_type: STYLE_TYPE_ATTR_RE
                    .captures(attrs)
                    .map(|c| c[1].to_string())
                    .unwrap_or_else(|| "paragraph".to_string()),
                based_on: BASED_ON_RE.captures(style_xml).map(|c| c[1].to_string()),
                is_default: STYLE_DEFAULT_ATTR_RE.is_match(attrs),
            };

            self.styles.insert(style_id, style);
        }
    }

    /// Parse numbering definitions (word/numbering.xml). Missing part is
    /// not an error; lists then fall back to numbered rendering.
    fn parse_numbering(&mut self, package: &OpcPackage) {
        let numbering_part = match package.get_part("/word/numbering.xml") {
            Some(part) => part,
            None => return,
        };

        let xml_str = String::from_utf8_lossy(&numbering_part.data);

        for cap in ABSTRACT_DEF_RE.captures_iter(&xml_str) {
            // The first numFmt belongs to the outermost level.
            if let Some(fmt_cap) = NUMFMT_RE.captures(&cap[2]) {
                self.numbering
                    .level_formats
                    .insert(cap[1].to_string(), fmt_cap[1].to_string());
            }
        }

        for cap in NUM_INSTANCE_RE.captures_iter(&xml_str) {
            if let Some(ref_cap) = ABSTRACT_REF_RE.captures(&cap[2]) {
                self.numbering
                    .instances
                    .insert(cap[1].to_string(), ref_cap[1].to_string());
            }
        }
    }

    /// Parse core properties (docProps/core.xml). Missing part is fine.
    fn parse_core_properties(&mut self, package: &OpcPackage) {
        let core_part = match package.get_part("/docProps/core.xml") {
            Some(part) => part,
            None => return,
        };

        let xml_str = String::from_utf8_lossy(&core_part.data);
        let field = |tag: &str| -> Option<String> {
            let pattern = format!(r"<{0}[^>]*>([^<]*)</{0}>", regex::escape(tag));
            Regex::new(&pattern)
                .ok()?
                .captures(&xml_str)
                .map(|c| unescape_xml_text(&c[1]))
        };

        self.core_properties = Some(CoreProperties {
            title: field("dc:title"),
            creator: field("dc:creator"),
            created: field("dcterms:created"),
            modified: field("dcterms:modified"),
        });
    }

    /// Resolved style name for a paragraph, if its style ID is known.
    pub fn style_name(&self, style_id: &str) -> Option<&str> {
        self.styles.get(style_id).and_then(|s| s.name.as_deref())
    }
}

/// Decode the XML entities the writer side produces, plus numeric
/// character references.
pub(crate) fn unescape_xml_text(text: &str) -> String {
    let decoded = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures| {
        let body = &caps[1];
        let code = match body.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => body.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });

    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
