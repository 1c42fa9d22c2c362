//! The editable document model.
//!
//! A document is a tree of block nodes, each holding a sequence of inline
//! runs. A run is a maximal span of text under one formatting set; adjacent
//! runs with identical formatting merge during normalization. Paragraphs and
//! ordered lists carry an opaque class bag that round-trips untouched, so
//! repair-inferred classes survive any pass through this model.
//!
//! Redline positions address the document's flattened text: block texts
//! joined by single newline separators, list items and nested lists each
//! contributing their own line.

mod convert;
mod redline;

use serde::{Deserialize, Serialize};

pub use redline::{Change, ChangeKind};

/// One block-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Paragraph(Paragraph),
    Heading(Heading),
    OrderedList(OrderedList),
    BulletList(BulletList),
    Blockquote(Blockquote),
    CodeBlock(CodeBlock),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Opaque class tags (`text-center`, `indent`, ...), passed through.
    pub classes: Vec<String>,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedList {
    /// Numbering token: `1` (default), `A`/`a`, `I`/`i`.
    pub list_type: String,
    /// First item number, default 1.
    pub start: u32,
    /// Opaque class tags, passed through.
    pub classes: Vec<String>,
    pub items: Vec<ListItem>,
}

impl Default for OrderedList {
    fn default() -> Self {
        OrderedList {
            list_type: "1".to_string(),
            start: 1,
            classes: Vec::new(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulletList {
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub runs: Vec<Run>,
    /// Nested lists following the item's own text.
    pub nested: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blockquote {
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub text: String,
}

/// A span of text under one formatting set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    pub marks: Marks,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Run {
        Run {
            text: text.into(),
            marks: Marks::default(),
        }
    }
}

/// The formatting set a run carries. The redline mark is exclusive between
/// addition and deletion but composes with everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub small_caps: bool,
    pub redline: Option<RedlineKind>,
    /// Class of a span this model doesn't interpret, passed through.
    pub span_class: Option<String>,
}

impl Marks {
    pub fn set_redline(&mut self, kind: RedlineKind) {
        self.redline = Some(kind);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedlineKind {
    Addition,
    Deletion,
}

/// The document: an ordered sequence of blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    /// The flattened text redline positions address: one line per block,
    /// list items and nested lists each on their own line, joined by `\n`.
    pub fn flattened_text(&self) -> String {
        let mut lines = Vec::new();
        collect_lines(&self.blocks, &mut lines);
        lines.join("\n")
    }

    /// True if any run still carries a redline mark.
    pub fn has_redline_marks(&self) -> bool {
        any_run(&self.blocks, &|run| run.marks.redline.is_some())
    }

    /// Merge adjacent runs with identical marks and drop empty runs.
    pub fn normalize(&mut self) {
        visit_run_lines(&mut self.blocks, &mut normalize_runs);
    }

    pub(crate) fn visit_lines<F: FnMut(&mut Vec<Run>)>(&mut self, mut f: F) {
        visit_run_lines(&mut self.blocks, &mut f);
    }
}

fn collect_lines(blocks: &[Block], lines: &mut Vec<String>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => lines.push(runs_text(&p.runs)),
            Block::Heading(h) => lines.push(runs_text(&h.runs)),
            Block::Blockquote(q) => lines.push(runs_text(&q.runs)),
            Block::CodeBlock(code) => lines.push(code.text.clone()),
            Block::OrderedList(list) => {
                for item in &list.items {
                    lines.push(runs_text(&item.runs));
                    collect_lines(&item.nested, lines);
                }
            }
            Block::BulletList(list) => {
                for item in &list.items {
                    lines.push(runs_text(&item.runs));
                    collect_lines(&item.nested, lines);
                }
            }
        }
    }
}

fn runs_text(runs: &[Run]) -> String {
    runs.iter().map(|run| run.text.as_str()).collect()
}

fn any_run(blocks: &[Block], pred: &dyn Fn(&Run) -> bool) -> bool {
    blocks.iter().any(|block| match block {
        Block::Paragraph(p) => p.runs.iter().any(pred),
        Block::Heading(h) => h.runs.iter().any(pred),
        Block::Blockquote(q) => q.runs.iter().any(pred),
        Block::CodeBlock(_) => false,
        Block::OrderedList(list) => list
            .items
            .iter()
            .any(|item| item.runs.iter().any(pred) || any_run(&item.nested, pred)),
        Block::BulletList(list) => list
            .items
            .iter()
            .any(|item| item.runs.iter().any(pred) || any_run(&item.nested, pred)),
    })
}

fn visit_run_lines<F: FnMut(&mut Vec<Run>)>(blocks: &mut [Block], f: &mut F) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(&mut p.runs),
            Block::Heading(h) => f(&mut h.runs),
            Block::Blockquote(q) => f(&mut q.runs),
            Block::CodeBlock(_) => {}
            Block::OrderedList(list) => {
                for item in &mut list.items {
                    f(&mut item.runs);
                    visit_run_lines(&mut item.nested, f);
                }
            }
            Block::BulletList(list) => {
                for item in &mut list.items {
                    f(&mut item.runs);
                    visit_run_lines(&mut item.nested, f);
                }
            }
        }
    }
}

fn normalize_runs(runs: &mut Vec<Run>) {
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs.drain(..) {
        if run.text.is_empty() {
            continue;
        }
        if let Some(last) = merged.last_mut() {
            if last.marks == run.marks {
                last.text.push_str(&run.text);
                continue;
            }
        }
        merged.push(run);
    }
    *runs = merged;
}
