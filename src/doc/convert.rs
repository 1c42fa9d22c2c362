//! Conversion between the document model and editor HTML.
//!
//! The HTML exchanged with the edit surface is the source of truth; this
//! module reads it into [`Document`] blocks and writes blocks back out.
//! Classes on paragraphs and ordered lists, and span classes the model
//! doesn't interpret, pass through both directions untouched.

use crate::html::{self, Element, HtmlNode};

use super::{
    Block, Blockquote, BulletList, CodeBlock, Document, Heading, ListItem, Marks, OrderedList,
    Paragraph, RedlineKind, Run,
};

const ADDITION_STYLE: &str = "color: red; text-decoration: underline;";
const DELETION_STYLE: &str = "color: red; text-decoration: line-through;";

impl Document {
    /// Parse editor HTML into a document.
    pub fn from_html(content: &str) -> Document {
        let nodes = html::parse_fragment(content);
        let mut doc = Document {
            blocks: build_blocks(&nodes),
        };
        doc.normalize();
        doc
    }

    /// Render the document back to editor HTML.
    pub fn to_html(&self) -> String {
        let nodes: Vec<HtmlNode> = self.blocks.iter().map(block_node).collect();
        html::render(&nodes)
    }
}

fn build_blocks(nodes: &[HtmlNode]) -> Vec<Block> {
    let mut blocks = Vec::new();
    for node in nodes {
        match node {
            HtmlNode::Text(text) => {
                // Stray block-level text gets its own paragraph.
                if !text.trim().is_empty() {
                    blocks.push(Block::Paragraph(Paragraph {
                        classes: Vec::new(),
                        runs: vec![Run::plain(text.clone())],
                    }));
                }
            }
            HtmlNode::Element(el) => build_block_element(el, &mut blocks),
        }
    }
    blocks
}

fn build_block_element(element: &Element, blocks: &mut Vec<Block>) {
    match element.tag.as_str() {
        "p" => blocks.push(Block::Paragraph(Paragraph {
            classes: owned_classes(element),
            runs: collect_runs(&element.children),
        })),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level: u8 = element.tag.trim_start_matches('h').parse().unwrap_or(1);
            blocks.push(Block::Heading(Heading {
                level,
                runs: collect_runs(&element.children),
            }));
        }
        "ol" => blocks.push(Block::OrderedList(ordered_list(element))),
        "ul" => blocks.push(Block::BulletList(BulletList {
            items: list_items(element),
        })),
        "blockquote" => blocks.push(Block::Blockquote(Blockquote {
            runs: collect_runs(&element.children),
        })),
        "pre" => blocks.push(Block::CodeBlock(CodeBlock {
            text: element.text_content(),
        })),
        // Unsupported wrappers are transparent.
        _ => blocks.extend(build_blocks(&element.children)),
    }
}

fn ordered_list(element: &Element) -> OrderedList {
    OrderedList {
        list_type: element.attr("type").unwrap_or("1").to_string(),
        start: element
            .attr("start")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1),
        classes: owned_classes(element),
        items: list_items(element),
    }
}

fn list_items(element: &Element) -> Vec<ListItem> {
    let mut items = Vec::new();
    for child in &element.children {
        match child {
            HtmlNode::Element(el) if el.tag == "li" => items.push(list_item(el)),
            // A stray paragraph inside a list still reads as an item.
            HtmlNode::Element(el) if el.tag == "p" => items.push(ListItem {
                runs: collect_runs(&el.children),
                nested: Vec::new(),
            }),
            _ => {}
        }
    }
    items
}

fn list_item(element: &Element) -> ListItem {
    let mut runs = Vec::new();
    let mut nested = Vec::new();
    for child in &element.children {
        match child {
            HtmlNode::Element(el) if el.tag == "ol" => {
                nested.push(Block::OrderedList(ordered_list(el)));
            }
            HtmlNode::Element(el) if el.tag == "ul" => {
                nested.push(Block::BulletList(BulletList {
                    items: list_items(el),
                }));
            }
            // Item text wrapped in a paragraph flattens into the item.
            HtmlNode::Element(el) if el.tag == "p" => {
                collect_runs_into(&el.children, Marks::default(), &mut runs);
            }
            other => collect_runs_into(std::slice::from_ref(other), Marks::default(), &mut runs),
        }
    }
    ListItem { runs, nested }
}

fn owned_classes(element: &Element) -> Vec<String> {
    element.classes().iter().map(|c| c.to_string()).collect()
}

fn collect_runs(nodes: &[HtmlNode]) -> Vec<Run> {
    let mut runs = Vec::new();
    collect_runs_into(nodes, Marks::default(), &mut runs);
    runs
}

fn collect_runs_into(nodes: &[HtmlNode], marks: Marks, out: &mut Vec<Run>) {
    for node in nodes {
        match node {
            HtmlNode::Text(text) => {
                if !text.is_empty() {
                    out.push(Run {
                        text: text.clone(),
                        marks: marks.clone(),
                    });
                }
            }
            HtmlNode::Element(el) => {
                if el.tag == "br" {
                    out.push(Run {
                        text: "\n".to_string(),
                        marks: marks.clone(),
                    });
                    continue;
                }

                let mut next = marks.clone();
                if el.has_class("redline-addition") {
                    next.redline = Some(RedlineKind::Addition);
                } else if el.has_class("redline-deletion") {
                    next.redline = Some(RedlineKind::Deletion);
                } else if el.has_class("small-caps") {
                    next.small_caps = true;
                } else if el.tag == "span" {
                    // Any other span class passes through opaquely.
                    if let Some(class) = el.attr("class") {
                        if !class.is_empty() {
                            next.span_class = Some(class.to_string());
                        }
                    }
                }
                match el.tag.as_str() {
                    "strong" | "b" => next.bold = true,
                    "em" | "i" => next.italic = true,
                    "u" => next.underline = true,
                    "s" | "strike" | "del" => next.strike = true,
                    _ => {}
                }

                collect_runs_into(&el.children, next, out);
            }
        }
    }
}

fn block_node(block: &Block) -> HtmlNode {
    match block {
        Block::Paragraph(p) => {
            let mut el = Element::new("p");
            set_classes(&mut el, &p.classes);
            el.children = inline_nodes(&p.runs);
            HtmlNode::Element(el)
        }
        Block::Heading(h) => {
            let level = h.level.clamp(1, 6);
            let mut el = Element::new(&format!("h{}", level));
            el.children = inline_nodes(&h.runs);
            HtmlNode::Element(el)
        }
        Block::OrderedList(list) => {
            let mut el = Element::new("ol");
            if list.list_type != "1" {
                el.set_attr("type", &list.list_type);
            }
            if list.start != 1 {
                el.set_attr("start", &list.start.to_string());
            }
            set_classes(&mut el, &list.classes);
            el.children = item_nodes(&list.items);
            HtmlNode::Element(el)
        }
        Block::BulletList(list) => {
            let mut el = Element::new("ul");
            el.children = item_nodes(&list.items);
            HtmlNode::Element(el)
        }
        Block::Blockquote(q) => {
            let mut el = Element::new("blockquote");
            el.children = inline_nodes(&q.runs);
            HtmlNode::Element(el)
        }
        Block::CodeBlock(code) => {
            let mut el = Element::new("pre");
            if !code.text.is_empty() {
                el.children = vec![HtmlNode::Text(code.text.clone())];
            }
            HtmlNode::Element(el)
        }
    }
}

fn set_classes(element: &mut Element, classes: &[String]) {
    if !classes.is_empty() {
        element.set_attr("class", &classes.join(" "));
    }
}

fn item_nodes(items: &[ListItem]) -> Vec<HtmlNode> {
    items
        .iter()
        .map(|item| {
            let mut li = Element::new("li");
            li.children = inline_nodes(&item.runs);
            li.children.extend(item.nested.iter().map(block_node));
            HtmlNode::Element(li)
        })
        .collect()
}

fn inline_nodes(runs: &[Run]) -> Vec<HtmlNode> {
    runs.iter().flat_map(run_nodes).collect()
}

/// Render one run: text with hard breaks, wrapped innermost-to-outermost in
/// its formatting tags, redline span on the outside.
fn run_nodes(run: &Run) -> Vec<HtmlNode> {
    let mut nodes = text_with_breaks(&run.text);

    if run.marks.small_caps {
        nodes = vec![wrap_span(nodes, "small-caps", None)];
    }
    if let Some(class) = &run.marks.span_class {
        nodes = vec![wrap_span(nodes, class, None)];
    }
    if run.marks.strike {
        nodes = vec![wrap(nodes, "s")];
    }
    if run.marks.underline {
        nodes = vec![wrap(nodes, "u")];
    }
    if run.marks.italic {
        nodes = vec![wrap(nodes, "em")];
    }
    if run.marks.bold {
        nodes = vec![wrap(nodes, "strong")];
    }
    if let Some(kind) = run.marks.redline {
        let (class, style) = match kind {
            RedlineKind::Addition => ("redline-addition", ADDITION_STYLE),
            RedlineKind::Deletion => ("redline-deletion", DELETION_STYLE),
        };
        nodes = vec![wrap_span(nodes, class, Some(style))];
    }

    nodes
}

fn text_with_breaks(text: &str) -> Vec<HtmlNode> {
    let mut nodes = Vec::new();
    for (i, part) in text.split('\n').enumerate() {
        if i > 0 {
            nodes.push(HtmlNode::Element(Element::new("br")));
        }
        if !part.is_empty() {
            nodes.push(HtmlNode::Text(part.to_string()));
        }
    }
    nodes
}

fn wrap(children: Vec<HtmlNode>, tag: &str) -> HtmlNode {
    let mut el = Element::new(tag);
    el.children = children;
    HtmlNode::Element(el)
}

fn wrap_span(children: Vec<HtmlNode>, class: &str, style: Option<&str>) -> HtmlNode {
    let mut el = Element::new("span");
    el.set_attr("class", class);
    if let Some(style) = style {
        el.set_attr("style", style);
    }
    el.children = children;
    HtmlNode::Element(el)
}
