//! Owned HTML tree used by the converters and the structural repair passes.
//!
//! Parsing goes through `html5ever`, so malformed markup is normalized the
//! same way a browser would normalize it: entities are decoded, misnested
//! paragraphs are auto-closed, and stray markup is reparented into the body.
//! The tree itself is plain owned data, which lets the repair passes clone
//! and rewrite it without going back through the parser.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Tags serialized without a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A single node in the owned HTML tree.
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Element(Element),
    Text(String),
}

impl HtmlNode {
    /// Returns the element if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            HtmlNode::Element(el) => Some(el),
            HtmlNode::Text(_) => None,
        }
    }

    /// Mutable variant of [`as_element`](Self::as_element).
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            HtmlNode::Element(el) => Some(el),
            HtmlNode::Text(_) => None,
        }
    }

    /// Text of this node and all descendants, like DOM `textContent`.
    pub fn text_content(&self) -> String {
        match self {
            HtmlNode::Text(text) => text.clone(),
            HtmlNode::Element(el) => el.text_content(),
        }
    }
}

/// An element with ordered attributes and child nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Lowercase tag name.
    pub tag: String,

    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,

    /// Child nodes in source order.
    pub children: Vec<HtmlNode>,
}

impl Element {
    /// Create an empty element with the given tag.
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.attrs.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }

    /// The whitespace-separated class list.
    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whether the class attribute contains the given class.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| *c == class)
    }

    /// Append a class to the class attribute unless already present.
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let merged = match self.attr("class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.set_attr("class", &merged);
    }

    /// Concatenated descendant text, like DOM `textContent`.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Serialized markup of the children, like DOM `innerHTML`.
    pub fn inner_html(&self) -> String {
        render(&self.children)
    }
}

fn collect_text(nodes: &[HtmlNode], out: &mut String) {
    for node in nodes {
        match node {
            HtmlNode::Text(text) => out.push_str(text),
            HtmlNode::Element(el) => collect_text(&el.children, out),
        }
    }
}

/// Parse an HTML fragment into owned body content.
///
/// The fragment is run through a full HTML5 parse, so the result reflects
/// what a browser's DOM would hold for the same input. Comments and
/// processing instructions are dropped.
pub fn parse_fragment(html: &str) -> Vec<HtmlNode> {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    match find_element(&dom.document, "body") {
        Some(body) => convert_children(&body),
        None => Vec::new(),
    }
}

fn find_element(node: &Handle, tag: &str) -> Option<Handle> {
    if let NodeData::Element { name, .. } = &node.data {
        if name.local.to_string().eq_ignore_ascii_case(tag) {
            return Some(node.clone());
        }
    }
    for child in node.children.borrow().iter() {
        if let Some(found) = find_element(child, tag) {
            return Some(found);
        }
    }
    None
}

fn convert_children(node: &Handle) -> Vec<HtmlNode> {
    let mut out = Vec::new();
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => {
                out.push(HtmlNode::Text(contents.borrow().to_string()));
            }
            NodeData::Element { name, attrs, .. } => {
                let mut element = Element::new(&name.local.to_string());
                for attr in attrs.borrow().iter() {
                    element
                        .attrs
                        .push((attr.name.local.to_string(), attr.value.to_string()));
                }
                element.children = convert_children(child);
                out.push(HtmlNode::Element(element));
            }
            _ => {}
        }
    }
    out
}

/// Serialize nodes back to markup.
pub fn render(nodes: &[HtmlNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(node, &mut out);
    }
    out
}

fn render_node(node: &HtmlNode, out: &mut String) {
    match node {
        HtmlNode::Text(text) => out.push_str(&escape_text(text)),
        HtmlNode::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if is_void(&el.tag) {
                return;
            }
            for child in &el.children {
                render_node(child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Escape text content for serialization.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape an attribute value for serialization.
pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[HtmlNode]) -> &Element {
        nodes
            .iter()
            .find_map(|n| n.as_element())
            .expect("expected at least one element")
    }

    #[test]
    fn test_parse_and_render_round_trip() {
        let html = r#"<p class="indent">Hello <strong>world</strong></p>"#;
        let nodes = parse_fragment(html);
        assert_eq!(render(&nodes), html);
    }

    #[test]
    fn test_parse_decodes_entities() {
        let nodes = parse_fragment("<p>a &amp; b</p>");
        let p = first_element(&nodes);
        assert_eq!(p.text_content(), "a & b");
        // Re-serialization escapes again.
        assert_eq!(render(&nodes), "<p>a &amp; b</p>");
    }

    #[test]
    fn test_parse_closes_misnested_paragraphs() {
        let nodes = parse_fragment("<p>one<p>two");
        let paragraphs: Vec<_> = nodes
            .iter()
            .filter_map(|n| n.as_element())
            .filter(|el| el.tag == "p")
            .collect();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text_content(), "one");
        assert_eq!(paragraphs[1].text_content(), "two");
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let nodes = parse_fragment("<p><br></p>");
        assert_eq!(render(&nodes), "<p><br></p>");
    }

    #[test]
    fn test_attr_lookup_and_set() {
        let mut el = Element::new("ol");
        assert_eq!(el.attr("type"), None);
        el.set_attr("type", "A");
        el.set_attr("start", "3");
        assert_eq!(el.attr("type"), Some("A"));
        el.set_attr("type", "1");
        assert_eq!(el.attr("type"), Some("1"));
        assert_eq!(el.attrs.len(), 2);
    }

    #[test]
    fn test_add_class_merges() {
        let mut el = Element::new("ol");
        el.add_class("uppercase-alpha-list");
        el.add_class("uppercase-alpha-list");
        assert_eq!(el.attr("class"), Some("uppercase-alpha-list"));
        el.add_class("legal");
        assert_eq!(el.attr("class"), Some("uppercase-alpha-list legal"));
        assert!(el.has_class("legal"));
    }

    #[test]
    fn test_inner_html() {
        let nodes = parse_fragment("<p><strong>Title</strong></p>");
        let p = first_element(&nodes);
        assert_eq!(p.inner_html(), "<strong>Title</strong>");
    }

    #[test]
    fn test_text_content_spans_nested_markup() {
        let nodes = parse_fragment("<p>a<span class=\"x\">b<em>c</em></span>d</p>");
        let p = first_element(&nodes);
        assert_eq!(p.text_content(), "abcd");
    }

    #[test]
    fn test_attribute_escaping() {
        let mut el = Element::new("span");
        el.set_attr("data-note", "a \"b\" & c");
        let html = render(&[HtmlNode::Element(el)]);
        assert_eq!(html, "<span data-note=\"a &quot;b&quot; &amp; c\"></span>");
    }
}
