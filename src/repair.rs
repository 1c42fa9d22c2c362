//! Structural repair for converted HTML.
//!
//! Conversion out of a binary document sometimes degrades badly: paragraph
//! breaks collapse, title lines fuse into body text, list markers flatten
//! into prose. This module runs a fixed pipeline of heuristics over the
//! converted HTML:
//!
//! 1. Empty paragraphs gain a line-break placeholder so they stay editable
//! 2. A single giant paragraph is re-segmented by textual surgery
//! 3. Formatting classes are inferred over the parsed tree
//! 4. Nested ordered lists are assigned their numbering styles
//!
//! Every stage tolerates a no-match: absence of a pattern is a no-op, never
//! an error. Running the pipeline twice yields what one run yields.

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

use crate::html::{self, Element, HtmlNode};

static EMPTY_PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>\s*</p>").unwrap());
static PARAGRAPH_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p[^>]*>.*?</p>").unwrap());
static PARAGRAPH_CONTENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<p[^>]*>(.*)</p>").unwrap());

// Single-paragraph surgery patterns.
static TITLE_PHRASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<strong>([^<]+?)(Subscription[^<]+Agreement[^<]*)</strong>").unwrap());
static LEADING_BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<strong>[^<]+</strong>").unwrap());
static UPPERCASE_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b([A-Z][A-Z\s,.:;()"\-\d]+[.?!])"#).unwrap());
static NUMBERED_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.:;])\s+(\d+)\.\s+([A-Z][^.]+\.)\s*").unwrap());
static LETTERED_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([.])\s+([A-Z])\.\s+"<strong>([^<]+)</strong>"\s*means"#).unwrap());
static LIST_BEFORE_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</li>\s*</p>\s*<h3>").unwrap());
static SENTENCE_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s+[A-Z]").unwrap());
static NO_SPLIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b(?:Mr|Mrs|Ms|Dr|Inc|Ltd|Corp|Co|vs|etc|e\.g|i\.e)|<li>|<strong>|<h3>\d+)$")
        .unwrap()
});

// Class-inference patterns applied to the re-rendered tree.
static SMALL_CAPS_SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<span class="small-caps">([^<]+)</span>"#).unwrap());
static LIST_OPEN_PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(<ol[^>]*>)\s*<p>").unwrap());
static PARAGRAPH_CLOSE_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</p>\s*(</ol>)").unwrap());

/// Paragraph openers that mark standard boilerplate needing an indent.
const INDENT_OPENERS: [&str; 2] = ["This Subscription", "The parties"];

/// Run the full repair pipeline over converted HTML.
pub fn repair_html(html_content: &str) -> String {
    // Stage 1: keep empty paragraphs visible and editable.
    let mut processed = EMPTY_PARAGRAPH_RE
        .replace_all(html_content, "<p><br></p>")
        .into_owned();

    // Stage 2: one giant paragraph in a long document means the source
    // conversion lost its paragraph breaks. Re-segment it.
    let paragraph_count = PARAGRAPH_TAG_RE.find_iter(&processed).count();
    if paragraph_count == 1 && processed.chars().count() > 1000 {
        log::debug!("single collapsed paragraph detected, re-segmenting");
        processed = recover_single_paragraph(&processed);
    }

    // Stage 3: infer formatting classes over the parsed tree.
    processed = infer_formatting_classes(&processed);

    // Stage 4: assign numbering styles to nested ordered lists.
    processed = infer_list_numbering(&processed);

    // Surgery can strand close tags that re-parse into fresh empty
    // paragraphs. Normalize those too, so a second run changes nothing.
    EMPTY_PARAGRAPH_RE
        .replace_all(&processed, "<p><br></p>")
        .into_owned()
}

/// Best-effort re-segmentation of a document that collapsed into a single
/// paragraph. Textual surgery, not parsing: the output may be tag soup,
/// which the tree-based stages then normalize.
fn recover_single_paragraph(html_content: &str) -> String {
    let mut content = match PARAGRAPH_CONTENT_RE.captures(html_content) {
        Some(caps) if !caps[1].is_empty() => caps[1].to_string(),
        _ => return html_content.to_string(),
    };

    // A leading bold "company + agreement title" phrase becomes two
    // centered title paragraphs, with the rest indented.
    if content.starts_with("<strong>") {
        if let Some(caps) = TITLE_PHRASE_RE.captures(&content) {
            let company = caps[1].trim().to_string();
            let agreement = caps[2].trim().to_string();
            let replacement = format!(
                "</p><p class=\"text-center\"><strong>{}</strong></p>\
                 <p class=\"text-center\"><strong>{}</strong></p><p class=\"indent\">",
                company, agreement
            );
            content = LEADING_BOLD_RE
                .replace(&content, NoExpand(&replacement))
                .into_owned();
        }
    }

    // Runs of mostly-uppercase words read as small caps.
    content = UPPERCASE_RUN_RE
        .replace_all(&content, |caps: &regex::Captures| {
            let matched = &caps[0];
            let words: Vec<&str> = matched.split_whitespace().collect();
            let uppercase = words
                .iter()
                .filter(|w| w.chars().count() > 2 && **w == w.to_uppercase())
                .count();
            if words.len() > 5 && uppercase as f64 / words.len() as f64 > 0.6 {
                format!("<span class=\"small-caps\">{}</span>", matched)
            } else {
                matched.to_string()
            }
        })
        .into_owned();

    // "N. Title." after a clause end is a section heading.
    content = NUMBERED_HEADING_RE
        .replace_all(&content, "${1}</p><h3>${2}. ${3}</h3><p>")
        .into_owned();

    // Lettered definition items open a letter-numbered list. The list
    // starts at the letter's ordinal so "C." begins at 3.
    content = LETTERED_ITEM_RE
        .replace_all(&content, |caps: &regex::Captures| {
            let letter = caps[2].chars().next().unwrap_or('A');
            let start = letter as u32 - 64;
            format!(
                "{}</p><ol type=\"A\" start=\"{}\"><li><strong>\"{}\"</strong> means",
                &caps[1], start, &caps[3]
            )
        })
        .into_owned();

    // A heading boundary closes any list still open before it.
    content = LIST_BEFORE_HEADING_RE
        .replace_all(&content, "</li></ol></p><h3>")
        .into_owned();

    content = split_sentences(&content);

    format!("<p>{}</p>", content)
}

/// Split run-on text at period + whitespace + capital boundaries. The ten
/// characters behind each candidate are checked so abbreviations and open
/// tags stay intact; the number of a heading promoted by the earlier stage
/// is guarded the same way, keeping "2. Payment." in one piece.
fn split_sentences(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut last_end = 0;

    for found in SENTENCE_BOUNDARY_RE.find_iter(content) {
        let mut window_start = found.start().saturating_sub(10);
        while !content.is_char_boundary(window_start) {
            window_start -= 1;
        }
        if NO_SPLIT_RE.is_match(&content[window_start..found.start()]) {
            continue;
        }

        let capital = match found.as_str().chars().last() {
            Some(c) => c,
            None => continue,
        };
        result.push_str(&content[last_end..found.start()]);
        result.push_str(".</p><p>");
        result.push(capital);
        last_end = found.end();
    }

    result.push_str(&content[last_end..]);
    result
}

/// Walk the parsed tree tagging paragraphs with formatting classes, then
/// patch up list structure on the rendered string.
fn infer_formatting_classes(html_content: &str) -> String {
    let mut nodes = html::parse_fragment(html_content);

    let mut index = 0;
    tag_paragraphs(&mut nodes, &mut index);

    let rendered = html::render(&nodes);

    // Small caps render through styling; the wrapped text itself reads
    // lowercase.
    let rendered = SMALL_CAPS_SPAN_RE
        .replace_all(&rendered, |caps: &regex::Captures| {
            format!("<span class=\"small-caps\">{}</span>", caps[1].to_lowercase())
        })
        .into_owned();

    // Stray paragraphs sitting directly in an ordered list become items.
    let rendered = LIST_OPEN_PARAGRAPH_RE
        .replace_all(&rendered, "${1}<li>")
        .into_owned();
    PARAGRAPH_CLOSE_LIST_RE
        .replace_all(&rendered, "</li>${1}")
        .into_owned()
}

fn tag_paragraphs(nodes: &mut [HtmlNode], index: &mut usize) {
    for node in nodes.iter_mut() {
        let element = match node.as_element_mut() {
            Some(el) => el,
            None => continue,
        };
        if element.tag == "p" {
            tag_paragraph(element, *index);
            *index += 1;
        }
        tag_paragraphs(&mut element.children, index);
    }
}

fn tag_paragraph(paragraph: &mut Element, index: usize) {
    let text = paragraph.text_content();
    let bold_only = is_bold_only(paragraph);

    // The first two short bold-only paragraphs read as a title block.
    if index < 2 && bold_only && text.chars().count() < 100 {
        paragraph.add_class("text-center");
    }

    // Bold-only agreement titles are centered wherever they sit.
    if bold_only && text.contains("Agreement") {
        paragraph.add_class("text-center");
    }

    if INDENT_OPENERS.iter().any(|opener| text.starts_with(opener)) {
        paragraph.add_class("indent");
    }

    // "By accepting" boilerplate and long fully-uppercase paragraphs near
    // the top are small-caps blocks. The wrap happens once; re-runs leave
    // it alone.
    let already_wrapped = paragraph.children.len() == 1
        && matches!(
            &paragraph.children[0],
            HtmlNode::Element(el) if el.tag == "span" && el.has_class("small-caps")
        );
    let small_caps_block = text.starts_with("By accepting")
        || (text == text.to_uppercase() && text.chars().count() > 100 && index < 10);
    if !already_wrapped && small_caps_block {
        let inner = std::mem::take(&mut paragraph.children);
        let mut span = Element::new("span");
        span.set_attr("class", "small-caps");
        span.children = inner;
        paragraph.children = vec![HtmlNode::Element(span)];
    }
}

/// True when the paragraph holds exactly one attribute-free `<strong>`
/// wrapping plain text.
fn is_bold_only(paragraph: &Element) -> bool {
    if paragraph.children.len() != 1 {
        return false;
    }
    match &paragraph.children[0] {
        HtmlNode::Element(el) => {
            el.tag == "strong"
                && el.attrs.is_empty()
                && el.children.len() == 1
                && matches!(&el.children[0], HtmlNode::Text(text) if !text.is_empty())
        }
        HtmlNode::Text(_) => false,
    }
}

/// Walk top-level ordered lists and style their nested lists by depth:
/// letters one level down, parenthesized numbers two levels down.
fn infer_list_numbering(html_content: &str) -> String {
    let mut nodes = html::parse_fragment(html_content);
    apply_list_levels(&mut nodes, None);
    html::render(&nodes)
}

fn apply_list_levels(nodes: &mut [HtmlNode], parent_tag: Option<&str>) {
    for node in nodes.iter_mut() {
        if let HtmlNode::Element(el) = node {
            let top_level_parent =
                matches!(parent_tag, None | Some("p") | Some("div") | Some("td"));
            if el.tag == "ol" && top_level_parent {
                assign_nested_list_styles(el, 0);
            }
            apply_list_levels(&mut el.children, Some(el.tag.as_str()));
        }
    }
}

fn assign_nested_list_styles(list: &mut Element, level: usize) {
    for item in list.children.iter_mut() {
        let li = match item.as_element_mut() {
            Some(el) if el.tag == "li" => el,
            _ => continue,
        };
        for child in li.children.iter_mut() {
            if let Some(inner) = child.as_element_mut() {
                if inner.tag == "ol" {
                    match level {
                        0 => {
                            inner.set_attr("type", "A");
                            inner.add_class("uppercase-alpha-list");
                        }
                        1 => inner.add_class("parentheses-numbering"),
                        _ => {}
                    }
                    assign_nested_list_styles(inner, level + 1);
                }
            }
        }
    }
}
