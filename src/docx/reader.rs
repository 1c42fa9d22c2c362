//! DOCX to semantic HTML conversion.
//!
//! Behavior in three steps:
//! - a transform pass over parsed paragraphs recovers formatting that only
//!   exists as direct flags (centering, small caps) by synthesizing style IDs
//! - a declarative style table routes each paragraph to its HTML shape
//! - runs are merged into maximal same-format spans and wrapped in tags
//!
//! Embedded images become base64 data URIs. An image that cannot be resolved
//! never fails the conversion; it is skipped with a warning.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::html::{self, Element, HtmlNode};

use super::document::WordDocument;
use super::error::DocxError;
use super::opc::OpcPackage;
use super::types::{Paragraph, Run, Style};

/// Outcome of a DOCX to HTML conversion.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    /// Semantic HTML for the editing surface
    pub html: String,
    /// Non-fatal conversion notes (unknown styles, dropped images)
    pub warnings: Vec<String>,
    /// Number of paragraphs with content
    pub paragraph_count: usize,
    /// Word count of the extracted text
    pub word_count: usize,
    /// Character count of the extracted text
    pub char_count: usize,
    /// Document title from core properties, if present
    pub title: Option<String>,
}

/// The HTML shape a paragraph style maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockShape {
    Paragraph {
        class: Option<&'static str>,
        bold: bool,
    },
    Heading(u8),
    ListItem,
    Quote,
    Code,
}

/// One entry of the declarative style mapping table.
struct ParagraphRule {
    style_name: Option<&'static str>,
    style_id: Option<&'static str>,
    shape: BlockShape,
}

const PLAIN: BlockShape = BlockShape::Paragraph {
    class: None,
    bold: false,
};

const CENTERED: BlockShape = BlockShape::Paragraph {
    class: Some("text-center"),
    bold: false,
};

/// Style names whose mapping already centers; the transform pass must not
/// override these with the synthetic centered style.
const CENTERED_STYLE_NAMES: [&str; 3] = ["Title", "Centered", "Center"];

const PARAGRAPH_RULES: &[ParagraphRule] = &[
    ParagraphRule {
        style_name: Some("Normal"),
        style_id: None,
        shape: PLAIN,
    },
    ParagraphRule {
        style_name: Some("Body Text"),
        style_id: None,
        shape: PLAIN,
    },
    ParagraphRule {
        style_name: Some("Plain Text"),
        style_id: None,
        shape: PLAIN,
    },
    ParagraphRule {
        style_name: Some("Title"),
        style_id: None,
        shape: BlockShape::Paragraph {
            class: Some("text-center"),
            bold: true,
        },
    },
    ParagraphRule {
        style_name: Some("Centered"),
        style_id: None,
        shape: CENTERED,
    },
    ParagraphRule {
        style_name: Some("Center"),
        style_id: None,
        shape: CENTERED,
    },
    // Synthesized by the transform pass for center-aligned paragraphs.
    ParagraphRule {
        style_name: None,
        style_id: Some("centered-paragraph"),
        shape: CENTERED,
    },
    ParagraphRule {
        style_name: Some("Heading 1"),
        style_id: Some("Heading1"),
        shape: BlockShape::Heading(1),
    },
    ParagraphRule {
        style_name: Some("Heading 2"),
        style_id: Some("Heading2"),
        shape: BlockShape::Heading(2),
    },
    ParagraphRule {
        style_name: Some("Heading 3"),
        style_id: Some("Heading3"),
        shape: BlockShape::Heading(3),
    },
    ParagraphRule {
        style_name: Some("Heading 4"),
        style_id: Some("Heading4"),
        shape: BlockShape::Heading(4),
    },
    ParagraphRule {
        style_name: Some("Heading 5"),
        style_id: Some("Heading5"),
        shape: BlockShape::Heading(5),
    },
    ParagraphRule {
        style_name: Some("Heading 6"),
        style_id: Some("Heading6"),
        shape: BlockShape::Heading(6),
    },
    ParagraphRule {
        style_name: Some("List Paragraph"),
        style_id: Some("ListParagraph"),
        shape: BlockShape::ListItem,
    },
    ParagraphRule {
        style_name: Some("List Number"),
        style_id: None,
        shape: BlockShape::ListItem,
    },
    ParagraphRule {
        style_name: Some("List Number 2"),
        style_id: None,
        shape: BlockShape::ListItem,
    },
    ParagraphRule {
        style_name: Some("List Number 3"),
        style_id: None,
        shape: BlockShape::ListItem,
    },
    ParagraphRule {
        style_name: Some("List Bullet"),
        style_id: None,
        shape: BlockShape::ListItem,
    },
    ParagraphRule {
        style_name: Some("Quote"),
        style_id: None,
        shape: BlockShape::Quote,
    },
    ParagraphRule {
        style_name: Some("Code"),
        style_id: None,
        shape: BlockShape::Code,
    },
];

/// Convert raw .docx bytes into semantic HTML.
pub fn docx_to_html(file_data: &[u8]) -> Result<ConvertedDocument, DocxError> {
    let package = OpcPackage::new(file_data)?;
    let mut word_doc = WordDocument::parse(&package)?;

    {
        let WordDocument {
            paragraphs, styles, ..
        } = &mut word_doc;
        for paragraph in paragraphs.iter_mut() {
            transform_paragraph(paragraph, styles);
        }
    }

    let mut warnings = Vec::new();
    let blocks = build_blocks(&word_doc, &package, &mut warnings);
    let html = html::render(&blocks);

    if html.is_empty() {
        return Err(DocxError::NoTextContent);
    }

    log::debug!(
        "converted document: {} paragraphs, {} warnings",
        word_doc.paragraphs.len(),
        warnings.len()
    );

    Ok(ConvertedDocument {
        html,
        warnings,
        paragraph_count: word_doc.paragraphs.len(),
        word_count: word_doc.text.unicode_words().count(),
        char_count: word_doc.text.chars().count(),
        title: word_doc
            .core_properties
            .as_ref()
            .and_then(|p| p.title.clone()),
    })
}

/// Recover direct formatting the name-based mapping cannot see.
///
/// A center-aligned paragraph whose style does not already produce centered
/// output gets the synthetic `centered-paragraph` style ID; a run with any
/// caps flag gets the synthetic `small-caps` character style.
fn transform_paragraph(paragraph: &mut Paragraph, styles: &HashMap<String, Style>) {
    let style_id = paragraph.properties.style_id.as_deref();
    let style_name = style_id
        .and_then(|id| styles.get(id))
        .and_then(|s| s.name.as_deref());

    let already_centered = style_id == Some("centered-paragraph")
        || matches!(style_name, Some(name) if CENTERED_STYLE_NAMES
            .iter()
            .any(|known| known.eq_ignore_ascii_case(name)));
    let centered = matches!(
        paragraph.properties.alignment.as_deref(),
        Some("center") | Some("centered")
    );
    if centered && !already_centered {
        paragraph.properties.style_id = Some("centered-paragraph".to_string());
    }

    for run in &mut paragraph.runs {
        if run.properties.small_caps == Some(true) || run.properties.caps == Some(true) {
            run.properties.style_id = Some("small-caps".to_string());
        }
    }
}

/// Route a paragraph to its HTML shape through the mapping table.
fn shape_for(paragraph: &Paragraph, doc: &WordDocument, warnings: &mut Vec<String>) -> BlockShape {
    let style_id = paragraph.properties.style_id.as_deref();
    let style_name = style_id.and_then(|id| doc.style_name(id));

    for rule in PARAGRAPH_RULES {
        if let (Some(want), Some(have)) = (rule.style_name, style_name) {
            if want.eq_ignore_ascii_case(have) {
                return rule.shape;
            }
        }
        if let (Some(want), Some(have)) = (rule.style_id, style_id) {
            if want == have {
                return rule.shape;
            }
        }
    }

    // Numbered paragraphs without a mapped style still render as list items.
    if paragraph.properties.numbering.is_some() {
        return BlockShape::ListItem;
    }

    if let Some(id) = style_id {
        let warning = match style_name {
            Some(name) => format!("unrecognised paragraph style: {} (style id {})", name, id),
            None => format!("unrecognised paragraph style id: {}", id),
        };
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }

    PLAIN
}

/// Decide whether a list paragraph renders as a bullet or a numbered item.
fn list_tag(paragraph: &Paragraph, doc: &WordDocument) -> &'static str {
    let style_name = paragraph
        .properties
        .style_id
        .as_deref()
        .and_then(|id| doc.style_name(id));
    if matches!(style_name, Some(name) if name.to_ascii_lowercase().contains("bullet")) {
        return "ul";
    }
    if let Some(numbering) = &paragraph.properties.numbering {
        if doc.numbering.is_bullet(&numbering.num_id) {
            return "ul";
        }
    }
    "ol"
}

/// Build the block-level HTML nodes for the whole document.
fn build_blocks(
    doc: &WordDocument,
    package: &OpcPackage,
    warnings: &mut Vec<String>,
) -> Vec<HtmlNode> {
    let mut blocks: Vec<HtmlNode> = Vec::new();
    let mut open_list: Option<Element> = None;

    for paragraph in &doc.paragraphs {
        let shape = shape_for(paragraph, doc, warnings);
        let inline = build_inline_nodes(&paragraph.runs, package, warnings);

        if shape != BlockShape::ListItem {
            close_list(&mut open_list, &mut blocks);
        }

        match shape {
            BlockShape::ListItem => {
                let tag = list_tag(paragraph, doc);
                let mut item = Element::new("li");
                item.children = inline;

                match &mut open_list {
                    Some(list) if list.tag == tag => list.children.push(HtmlNode::Element(item)),
                    _ => {
                        close_list(&mut open_list, &mut blocks);
                        let mut list = Element::new(tag);
                        list.children.push(HtmlNode::Element(item));
                        open_list = Some(list);
                    }
                }
            }
            BlockShape::Paragraph { class, bold } => {
                let mut p = Element::new("p");
                if let Some(class) = class {
                    p.set_attr("class", class);
                }
                p.children = if bold {
                    let mut strong = Element::new("strong");
                    strong.children = inline;
                    vec![HtmlNode::Element(strong)]
                } else {
                    inline
                };
                blocks.push(HtmlNode::Element(p));
            }
            BlockShape::Heading(level) => {
                let mut heading = Element::new(&format!("h{}", level));
                heading.children = inline;
                blocks.push(HtmlNode::Element(heading));
            }
            BlockShape::Quote => {
                let mut p = Element::new("p");
                p.children = inline;
                let mut quote = Element::new("blockquote");
                quote.children = vec![HtmlNode::Element(p)];
                blocks.push(HtmlNode::Element(quote));
            }
            BlockShape::Code => {
                let mut pre = Element::new("pre");
                pre.children = inline;
                blocks.push(HtmlNode::Element(pre));
            }
        }
    }

    close_list(&mut open_list, &mut blocks);
    blocks
}

fn close_list(open_list: &mut Option<Element>, blocks: &mut Vec<HtmlNode>) {
    if let Some(list) = open_list.take() {
        blocks.push(HtmlNode::Element(list));
    }
}

/// Effective inline formatting of a run after style resolution.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct InlineStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    small_caps: bool,
}

fn inline_style(run: &Run) -> InlineStyle {
    let props = &run.properties;
    InlineStyle {
        bold: props.bold == Some(true),
        italic: props.italic == Some(true),
        underline: matches!(props.underline.as_deref(), Some(kind) if kind != "none"),
        strike: props.strike == Some(true),
        small_caps: props.style_id.as_deref() == Some("small-caps"),
    }
}

/// Convert runs into inline HTML, merging adjacent runs with the same
/// effective formatting into maximal spans.
fn build_inline_nodes(
    runs: &[Run],
    package: &OpcPackage,
    warnings: &mut Vec<String>,
) -> Vec<HtmlNode> {
    let mut nodes = Vec::new();
    let mut pending: Option<(InlineStyle, String)> = None;

    for run in runs {
        if let Some(rel_id) = &run.image_ref {
            flush_pending(&mut pending, &mut nodes);
            match embed_image(package, rel_id) {
                Some(img) => nodes.push(HtmlNode::Element(img)),
                None => warnings.push(format!("image {} could not be embedded", rel_id)),
            }
            if run.text.is_empty() {
                continue;
            }
        }

        let style = inline_style(run);
        match &mut pending {
            Some((current, text)) if *current == style => text.push_str(&run.text),
            _ => {
                flush_pending(&mut pending, &mut nodes);
                pending = Some((style, run.text.clone()));
            }
        }
    }

    flush_pending(&mut pending, &mut nodes);
    nodes
}

fn flush_pending(pending: &mut Option<(InlineStyle, String)>, nodes: &mut Vec<HtmlNode>) {
    if let Some((style, text)) = pending.take() {
        nodes.extend(styled_nodes(style, &text));
    }
}

/// Wrap a text span in the tags its formatting calls for. Line breaks in
/// run text become <br> elements.
fn styled_nodes(style: InlineStyle, text: &str) -> Vec<HtmlNode> {
    let mut nodes = Vec::new();
    for (i, segment) in text.split('\n').enumerate() {
        if i > 0 {
            nodes.push(HtmlNode::Element(Element::new("br")));
        }
        if !segment.is_empty() {
            nodes.push(HtmlNode::Text(segment.to_string()));
        }
    }

    if style.small_caps {
        let mut span = Element::new("span");
        span.set_attr("class", "small-caps");
        span.children = nodes;
        nodes = vec![HtmlNode::Element(span)];
    }
    for (enabled, tag) in [
        (style.strike, "s"),
        (style.underline, "u"),
        (style.italic, "em"),
        (style.bold, "strong"),
    ] {
        if enabled {
            let mut wrapper = Element::new(tag);
            wrapper.children = nodes;
            nodes = vec![HtmlNode::Element(wrapper)];
        }
    }
    nodes
}

/// Inline an embedded image as a data URI.
fn embed_image(package: &OpcPackage, rel_id: &str) -> Option<Element> {
    let part = package.resolve_document_target(rel_id)?;
    let mime = part.content_type.mime()?;
    let mut img = Element::new("img");
    img.set_attr(
        "src",
        &format!("data:{};base64,{}", mime, BASE64.encode(&part.data)),
    );
    Some(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::types::{NumberingRef, ParagraphProperties, RunProperties};
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn run(text: &str, properties: RunProperties) -> Run {
        Run {
            text: text.to_string(),
            properties,
            image_ref: None,
        }
    }

    fn paragraph(runs: Vec<Run>, properties: ParagraphProperties) -> Paragraph {
        Paragraph {
            text: runs.iter().map(|r| r.text.clone()).collect(),
            properties,
            runs,
        }
    }

    fn doc_with(paragraphs: Vec<Paragraph>) -> WordDocument {
        WordDocument {
            paragraphs,
            ..Default::default()
        }
    }

    fn render_doc(doc: &WordDocument) -> String {
        let package = OpcPackage::default();
        let mut warnings = Vec::new();
        html::render(&build_blocks(doc, &package, &mut warnings))
    }

    fn package_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        drop(zip);
        buffer
    }

    #[test]
    fn test_plain_paragraph_renders_as_p() {
        let doc = doc_with(vec![paragraph(
            vec![run("Hello world", RunProperties::default())],
            ParagraphProperties::default(),
        )]);
        assert_eq!(render_doc(&doc), "<p>Hello world</p>");
    }

    #[test]
    fn test_heading_style_id_renders_as_heading() {
        let doc = doc_with(vec![paragraph(
            vec![run("Section", RunProperties::default())],
            ParagraphProperties {
                style_id: Some("Heading2".into()),
                ..Default::default()
            },
        )]);
        assert_eq!(render_doc(&doc), "<h2>Section</h2>");
    }

    fn style(id: &str, name: &str) -> Style {
        Style {
            id: id.to_string(),
            name: Some(name.to_string()),
            style_type: "paragraph".to_string(),
            based_on: None,
            is_default: false,
        }
    }

    #[test]
    fn test_body_text_style_renders_as_plain_paragraph() {
        let mut doc = doc_with(vec![paragraph(
            vec![run("body", RunProperties::default())],
            ParagraphProperties {
                style_id: Some("BodyText".into()),
                ..Default::default()
            },
        )]);
        doc.styles
            .insert("BodyText".into(), style("BodyText", "Body Text"));

        let package = OpcPackage::default();
        let mut warnings = Vec::new();
        let html_out = html::render(&build_blocks(&doc, &package, &mut warnings));
        assert_eq!(html_out, "<p>body</p>");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_centered_style_name_renders_centered() {
        let mut doc = doc_with(vec![paragraph(
            vec![run("c", RunProperties::default())],
            ParagraphProperties {
                style_id: Some("Centered".into()),
                ..Default::default()
            },
        )]);
        doc.styles
            .insert("Centered".into(), style("Centered", "Centered"));

        assert_eq!(render_doc(&doc), "<p class=\"text-center\">c</p>");
    }

    #[test]
    fn test_centered_style_name_skips_transform_synthesis() {
        let mut para = paragraph(
            vec![run("c", RunProperties::default())],
            ParagraphProperties {
                style_id: Some("Centered".into()),
                alignment: Some("center".into()),
                ..Default::default()
            },
        );
        let mut styles = HashMap::new();
        styles.insert("Centered".to_string(), style("Centered", "Centered"));

        transform_paragraph(&mut para, &styles);
        assert_eq!(para.properties.style_id.as_deref(), Some("Centered"));
    }

    #[test]
    fn test_centered_alignment_synthesizes_centered_style() {
        let mut para = paragraph(
            vec![run("Centered", RunProperties::default())],
            ParagraphProperties {
                alignment: Some("center".into()),
                ..Default::default()
            },
        );
        transform_paragraph(&mut para, &HashMap::new());
        assert_eq!(
            para.properties.style_id.as_deref(),
            Some("centered-paragraph")
        );

        let doc = doc_with(vec![para]);
        assert_eq!(render_doc(&doc), "<p class=\"text-center\">Centered</p>");
    }

    #[test]
    fn test_caps_run_synthesizes_small_caps_span() {
        let mut para = paragraph(
            vec![run(
                "Whereas",
                RunProperties {
                    caps: Some(true),
                    ..Default::default()
                },
            )],
            ParagraphProperties::default(),
        );
        transform_paragraph(&mut para, &HashMap::new());

        let doc = doc_with(vec![para]);
        assert_eq!(
            render_doc(&doc),
            "<p><span class=\"small-caps\">Whereas</span></p>"
        );
    }

    #[test]
    fn test_adjacent_same_format_runs_merge() {
        let bold = RunProperties {
            bold: Some(true),
            ..Default::default()
        };
        let doc = doc_with(vec![paragraph(
            vec![run("Hel", bold.clone()), run("lo", bold)],
            ParagraphProperties::default(),
        )]);
        assert_eq!(render_doc(&doc), "<p><strong>Hello</strong></p>");
    }

    #[test]
    fn test_formatting_tags_nest() {
        let doc = doc_with(vec![paragraph(
            vec![run(
                "x",
                RunProperties {
                    bold: Some(true),
                    italic: Some(true),
                    underline: Some("single".into()),
                    strike: Some(true),
                    ..Default::default()
                },
            )],
            ParagraphProperties::default(),
        )]);
        assert_eq!(render_doc(&doc), "<p><strong><em><u><s>x</s></u></em></strong></p>");
    }

    #[test]
    fn test_numbered_paragraphs_group_into_ordered_list() {
        let list_props = || ParagraphProperties {
            numbering: Some(NumberingRef {
                num_id: "2".into(),
                level: 0,
            }),
            ..Default::default()
        };
        let doc = doc_with(vec![
            paragraph(vec![run("first", RunProperties::default())], list_props()),
            paragraph(vec![run("second", RunProperties::default())], list_props()),
            paragraph(
                vec![run("after", RunProperties::default())],
                ParagraphProperties::default(),
            ),
        ]);
        assert_eq!(
            render_doc(&doc),
            "<ol><li>first</li><li>second</li></ol><p>after</p>"
        );
    }

    #[test]
    fn test_bullet_numbering_renders_unordered_list() {
        let mut doc = doc_with(vec![paragraph(
            vec![run("bullet", RunProperties::default())],
            ParagraphProperties {
                numbering: Some(NumberingRef {
                    num_id: "1".into(),
                    level: 0,
                }),
                ..Default::default()
            },
        )]);
        doc.numbering.instances.insert("1".into(), "0".into());
        doc.numbering.level_formats.insert("0".into(), "bullet".into());

        assert_eq!(render_doc(&doc), "<ul><li>bullet</li></ul>");
    }

    #[test]
    fn test_unknown_style_warns_once_and_falls_back() {
        let doc = doc_with(vec![
            paragraph(
                vec![run("a", RunProperties::default())],
                ParagraphProperties {
                    style_id: Some("Fancy".into()),
                    ..Default::default()
                },
            ),
            paragraph(
                vec![run("b", RunProperties::default())],
                ParagraphProperties {
                    style_id: Some("Fancy".into()),
                    ..Default::default()
                },
            ),
        ]);

        let package = OpcPackage::default();
        let mut warnings = Vec::new();
        let html_out = html::render(&build_blocks(&doc, &package, &mut warnings));
        assert_eq!(html_out, "<p>a</p><p>b</p>");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Fancy"));
    }

    #[test]
    fn test_run_breaks_become_br() {
        let doc = doc_with(vec![paragraph(
            vec![run("one\ntwo", RunProperties::default())],
            ParagraphProperties::default(),
        )]);
        assert_eq!(render_doc(&doc), "<p>one<br>two</p>");
    }

    #[test]
    fn test_docx_to_html_rejects_garbage() {
        assert!(docx_to_html(b"not a zip").is_err());
    }

    #[test]
    fn test_archive_without_document_part_is_reported() {
        let _ = env_logger::builder().is_test(true).try_init();
        let bytes = package_bytes(&[(
            "[Content_Types].xml",
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        )]);

        let err = docx_to_html(&bytes).unwrap_err();
        assert!(matches!(err, DocxError::PartNotFound(ref name) if name == "/word/document.xml"));
    }

    #[test]
    fn test_document_with_empty_body_is_reported() {
        let bytes = package_bytes(&[(
            "word/document.xml",
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body></w:body></w:document>"#,
        )]);

        let err = docx_to_html(&bytes).unwrap_err();
        assert!(matches!(err, DocxError::NoTextContent));
    }
}
