//! Edited HTML to DOCX serialization.
//!
//! Walks the editor's HTML (including redline spans and repair classes) and
//! emits a minimal valid package: content types, relationships, styles,
//! numbering, core properties, and the document body. Fidelity is a
//! documented subset: paragraphs, headings, flattened lists, quotes, code
//! blocks, and inline formatting. Anything else is unwrapped, never fatal.

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

use super::error::DocxError;
use crate::html::{self, Element, HtmlNode};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const EMPTY_RUN: &str = "<w:r><w:t></w:t></w:r>";

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
    r#"<Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/>"#,
    r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
    "</Types>",
);

const ROOT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    "</Relationships>",
);

const DOCUMENT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>"#,
    "</Relationships>",
);

/// Style definitions for the exported document: a Normal default plus the
/// three heading levels the editor produces most often. Deeper headings
/// still carry their pStyle and render with Word's built-in fallbacks.
const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/>"#,
    r#"<w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr>"#,
    r#"<w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:b/><w:sz w:val="32"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/>"#,
    r#"<w:pPr><w:keepNext/><w:spacing w:before="200" w:after="100"/><w:outlineLvl w:val="1"/></w:pPr>"#,
    r#"<w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:b/><w:sz w:val="28"/></w:rPr></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/>"#,
    r#"<w:pPr><w:keepNext/><w:spacing w:before="160" w:after="80"/><w:outlineLvl w:val="2"/></w:pPr>"#,
    r#"<w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:b/><w:sz w:val="24"/></w:rPr></w:style>"#,
    "</w:styles>",
);

/// Two numbering instances: numId 1 renders bullets, numId 2 decimals.
/// List items always reference one of these at level 0.
const NUMBERING_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="&#8226;"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum>"#,
    r#"<w:abstractNum w:abstractNumId="1"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum>"#,
    r#"<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>"#,
    r#"<w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num>"#,
    "</w:numbering>",
);

/// Serialize edited HTML into .docx bytes.
pub fn html_to_docx(html_content: &str, title: Option<&str>) -> Result<Vec<u8>, DocxError> {
    let nodes = html::parse_fragment(html_content);
    let document_xml = build_document_xml(&nodes);
    package_parts(&document_xml, title)
}

/// Build word/document.xml from the parsed HTML body.
fn build_document_xml(nodes: &[HtmlNode]) -> String {
    let mut body = String::new();
    for node in nodes {
        append_block(node, &mut body);
    }
    // The body must hold at least one block.
    if body.is_empty() {
        body.push_str("<w:p><w:r><w:t></w:t></w:r></w:p>");
    }

    format!(
        concat!(
            r#"{}<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}",
            r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#,
            r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/>"#,
            "</w:sectPr></w:body></w:document>",
        ),
        XML_DECLARATION, body
    )
}

fn append_block(node: &HtmlNode, out: &mut String) {
    let element = match node.as_element() {
        Some(el) => el,
        // Bare text between blocks carries no paragraph of its own.
        None => return,
    };

    match element.tag.as_str() {
        "p" => out.push_str(&paragraph_xml(element)),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => out.push_str(&heading_xml(element)),
        "ul" | "ol" => append_list(element, out),
        "blockquote" => out.push_str(&quote_xml(element)),
        "pre" => out.push_str(&code_xml(element)),
        _ => {
            for child in &element.children {
                append_block(child, out);
            }
        }
    }
}

fn paragraph_xml(element: &Element) -> String {
    let mut ppr = String::new();
    if element.has_class("text-center") {
        ppr.push_str(r#"<w:pPr><w:jc w:val="center"/></w:pPr>"#);
    } else if element.has_class("indent") {
        ppr.push_str(r#"<w:pPr><w:ind w:left="720"/></w:pPr>"#);
    }
    format!("<w:p>{}{}</w:p>", ppr, runs_or_empty(runs_xml(element, false)))
}

fn heading_xml(element: &Element) -> String {
    let level: u8 = element.tag.trim_start_matches('h').parse().unwrap_or(1);
    let mut ppr = format!(r#"<w:pPr><w:pStyle w:val="Heading{}"/>"#, level);
    if element.has_class("text-center") {
        ppr.push_str(r#"<w:jc w:val="center"/>"#);
    }
    ppr.push_str("</w:pPr>");
    format!("<w:p>{}{}</w:p>", ppr, runs_or_empty(runs_xml(element, false)))
}

/// Emit every list item under this list as one level-0 numbered paragraph.
/// Nested lists flatten: their items follow the parent item in order.
fn append_list(element: &Element, out: &mut String) {
    let numbered = element.tag == "ol";
    let mut items = Vec::new();
    collect_list_items(element, &mut items);
    for item in items {
        out.push_str(&list_item_xml(item, numbered));
    }
}

fn collect_list_items<'a>(element: &'a Element, items: &mut Vec<&'a Element>) {
    for child in &element.children {
        if let Some(el) = child.as_element() {
            if el.tag == "li" {
                items.push(el);
            }
            collect_list_items(el, items);
        }
    }
}

fn list_item_xml(element: &Element, numbered: bool) -> String {
    let num_id = if numbered { "2" } else { "1" };
    let ppr = format!(
        r#"<w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="{}"/></w:numPr></w:pPr>"#,
        num_id
    );
    // Nested lists are emitted as their own items, so skip them here.
    format!("<w:p>{}{}</w:p>", ppr, runs_or_empty(runs_xml(element, true)))
}

fn quote_xml(element: &Element) -> String {
    let ppr = r#"<w:pPr><w:ind w:left="720" w:right="720"/></w:pPr>"#;
    format!("<w:p>{}{}</w:p>", ppr, runs_or_empty(runs_xml(element, false)))
}

fn code_xml(element: &Element) -> String {
    format!(
        concat!(
            "<w:p><w:r>",
            r#"<w:rPr><w:rFonts w:ascii="Courier New" w:hAnsi="Courier New"/></w:rPr>"#,
            r#"<w:t xml:space="preserve">{}</w:t>"#,
            "</w:r></w:p>",
        ),
        escape_xml_text(&element.text_content())
    )
}

fn runs_or_empty(runs: String) -> String {
    if runs.is_empty() {
        EMPTY_RUN.to_string()
    } else {
        runs
    }
}

/// Inline formatting accumulated while descending into an element.
#[derive(Debug, Clone, Copy, Default)]
struct RunFormat {
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    addition: bool,
    deletion: bool,
    small_caps: bool,
}

fn runs_xml(element: &Element, skip_lists: bool) -> String {
    let mut out = String::new();
    collect_runs(&element.children, RunFormat::default(), skip_lists, &mut out);
    out
}

fn collect_runs(nodes: &[HtmlNode], format: RunFormat, skip_lists: bool, out: &mut String) {
    for node in nodes {
        match node {
            HtmlNode::Text(text) => {
                if !text.is_empty() {
                    out.push_str(&run_xml(text, format));
                }
            }
            HtmlNode::Element(el) => {
                if skip_lists && (el.tag == "ul" || el.tag == "ol") {
                    continue;
                }

                let mut next = format;
                if el.has_class("redline-addition") {
                    next.addition = true;
                } else if el.has_class("redline-deletion") {
                    next.deletion = true;
                } else if el.has_class("small-caps") {
                    next.small_caps = true;
                }
                match el.tag.as_str() {
                    "strong" | "b" => next.bold = true,
                    "em" | "i" => next.italic = true,
                    "u" => next.underline = true,
                    "s" | "strike" | "del" => next.strike = true,
                    _ => {}
                }

                collect_runs(&el.children, next, skip_lists, out);
            }
        }
    }
}

fn run_xml(text: &str, format: RunFormat) -> String {
    let mut rpr = String::new();
    if format.bold {
        rpr.push_str("<w:b/>");
    }
    if format.italic {
        rpr.push_str("<w:i/>");
    }
    if format.underline && !format.addition {
        rpr.push_str(r#"<w:u w:val="single"/>"#);
    }
    if format.strike && !format.deletion {
        rpr.push_str("<w:strike/>");
    }
    if format.addition {
        rpr.push_str(r#"<w:color w:val="FF0000"/><w:u w:val="single"/>"#);
    }
    if format.deletion {
        rpr.push_str(r#"<w:color w:val="FF0000"/><w:strike/>"#);
    }
    if format.small_caps {
        rpr.push_str("<w:smallCaps/>");
    }

    let rpr = if rpr.is_empty() {
        String::new()
    } else {
        format!("<w:rPr>{}</w:rPr>", rpr)
    };
    format!(
        r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        rpr,
        escape_xml_text(text)
    )
}

/// Assemble the package parts into a ZIP byte stream.
fn package_parts(document_xml: &str, title: Option<&str>) -> Result<Vec<u8>, DocxError> {
    let mut writer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut writer);

        let zip_options = FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(9));

        zip.start_file("[Content_Types].xml", zip_options)?;
        zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

        zip.start_file("_rels/.rels", zip_options)?;
        zip.write_all(ROOT_RELS_XML.as_bytes())?;

        zip.start_file("word/_rels/document.xml.rels", zip_options)?;
        zip.write_all(DOCUMENT_RELS_XML.as_bytes())?;

        zip.start_file("word/document.xml", zip_options)?;
        zip.write_all(document_xml.as_bytes())?;

        zip.start_file("word/styles.xml", zip_options)?;
        zip.write_all(STYLES_XML.as_bytes())?;

        zip.start_file("word/numbering.xml", zip_options)?;
        zip.write_all(NUMBERING_XML.as_bytes())?;

        zip.start_file("docProps/core.xml", zip_options)?;
        zip.write_all(core_properties_xml(title).as_bytes())?;

        zip.finish()?;
    }
    Ok(writer.into_inner())
}

fn core_properties_xml(title: Option<&str>) -> String {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push_str(concat!(
        r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties""#,
        r#" xmlns:dc="http://purl.org/dc/elements/1.1/""#,
        r#" xmlns:dcterms="http://purl.org/dc/terms/""#,
        r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
    ));
    match title {
        Some(title) => xml.push_str(&format!("<dc:title>{}</dc:title>", escape_xml_text(title))),
        None => xml.push_str("<dc:title/>"),
    }
    xml.push_str(&format!(
        r#"<dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created>"#,
        now
    ));
    xml.push_str(&format!(
        r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{}</dcterms:modified>"#,
        now
    ));
    xml.push_str("</cp:coreProperties>");
    xml
}

/// Escape the five reserved markup characters in text content.
pub(crate) fn escape_xml_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_xml_for(html_content: &str) -> String {
        build_document_xml(&html::parse_fragment(html_content))
    }

    #[test]
    fn test_empty_html_produces_one_empty_paragraph() {
        let xml = document_xml_for("");
        assert!(xml.contains("<w:p><w:r><w:t></w:t></w:r></w:p>"));
    }

    #[test]
    fn test_empty_paragraph_with_break_placeholder() {
        let xml = document_xml_for("<p><br></p>");
        assert!(xml.contains("<w:p><w:r><w:t></w:t></w:r></w:p>"));
    }

    #[test]
    fn test_paragraph_classes_map_to_properties() {
        let xml = document_xml_for(r#"<p class="text-center">t</p><p class="indent">i</p>"#);
        assert!(xml.contains(r#"<w:jc w:val="center"/>"#));
        assert!(xml.contains(r#"<w:ind w:left="720"/>"#));
    }

    #[test]
    fn test_heading_carries_style_and_optional_centering() {
        let xml = document_xml_for(r#"<h3 class="text-center">S</h3>"#);
        assert!(xml.contains(r#"<w:pStyle w:val="Heading3"/>"#));
        assert!(xml.contains(r#"<w:jc w:val="center"/>"#));
    }

    #[test]
    fn test_inline_formatting_accumulates() {
        let xml = document_xml_for("<p><strong><em>x</em></strong></p>");
        assert!(xml.contains("<w:b/>"));
        assert!(xml.contains("<w:i/>"));
    }

    #[test]
    fn test_redline_spans_map_to_colored_runs() {
        let xml = document_xml_for(concat!(
            r#"<p><span class="redline-addition">new</span>"#,
            r#"<span class="redline-deletion">old</span></p>"#,
        ));
        assert!(xml.contains(r#"<w:color w:val="FF0000"/><w:u w:val="single"/>"#));
        assert!(xml.contains(r#"<w:color w:val="FF0000"/><w:strike/>"#));
    }

    #[test]
    fn test_small_caps_span_maps_to_small_caps_run() {
        let xml = document_xml_for(r#"<p><span class="small-caps">whereas</span></p>"#);
        assert!(xml.contains("<w:smallCaps/>"));
    }

    #[test]
    fn test_nested_list_items_flatten_without_duplication() {
        let xml = document_xml_for("<ol><li>a</li><li>b<ol><li>c</li></ol></li></ol>");
        assert_eq!(xml.matches(r#"<w:numId w:val="2"/>"#).count(), 3);
        // The parent item must not swallow the nested item's text.
        let b_para = xml
            .split("<w:p>")
            .find(|chunk| chunk.contains(">b<"))
            .unwrap();
        assert!(!b_para.contains(">c<"));
    }

    #[test]
    fn test_unordered_list_uses_bullet_instance() {
        let xml = document_xml_for("<ul><li>x</li></ul>");
        assert!(xml.contains(r#"<w:numId w:val="1"/>"#));
    }

    #[test]
    fn test_unsupported_wrappers_are_unwrapped() {
        let xml = document_xml_for("<div><section><p>kept</p></section></div>");
        assert!(xml.contains(">kept<"));
        assert_eq!(xml.matches("<w:p>").count(), 1);
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = document_xml_for("<p>a &amp; b &lt; c</p>");
        assert!(xml.contains("a &amp; b &lt; c"));
    }

    #[test]
    fn test_xml_escaping() {
        assert_eq!(escape_xml_text("a<b>c&d"), "a&lt;b&gt;c&amp;d");
        assert_eq!(escape_xml_text(r#""q" 'a'"#), "&quot;q&quot; &apos;a&apos;");
    }

    #[test]
    fn test_package_is_zip_with_expected_parts() {
        let data = html_to_docx("<p>Hello</p>", Some("Greeting")).unwrap();
        assert!(data.starts_with(b"PK"));

        let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/_rels/document.xml.rels",
            "word/document.xml",
            "word/styles.xml",
            "word/numbering.xml",
            "docProps/core.xml",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing part {}", name);
        }
    }

    #[test]
    fn test_round_trip_preserves_text_and_block_order() {
        let original = "<h1>Title</h1><p>Body text.</p><ol><li>first</li><li>second</li></ol>";
        let data = html_to_docx(original, None).unwrap();

        let converted = crate::docx::reader::docx_to_html(&data).unwrap();
        assert_eq!(converted.html, original);
    }

    #[test]
    fn test_round_trip_preserves_bullet_lists() {
        let original = "<ul><li>alpha</li><li>beta</li></ul>";
        let data = html_to_docx(original, None).unwrap();

        let converted = crate::docx::reader::docx_to_html(&data).unwrap();
        assert_eq!(converted.html, original);
    }
}
