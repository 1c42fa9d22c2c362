//! Redlined change application.
//!
//! Changes address the document's flattened text: character offsets into
//! the block lines joined by a single separator, as produced by
//! [`Document::flattened_text`]. Applying a change never removes content;
//! deletions and replacements mark the old text for review and additions
//! are inserted already marked. [`Document::accept_all`] and
//! [`Document::reject_all`] resolve the marks afterwards.

use serde::{Deserialize, Serialize};

use super::{Block, Document, ListItem, Paragraph, RedlineKind, Run};

/// One requested edit against the flattened text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Text to insert for additions and replacements.
    #[serde(default)]
    pub text: String,
    /// Character offset into the flattened text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Text expected at `position` for deletions and replacements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Addition,
    Deletion,
    Replacement,
}

impl Document {
    /// Apply a batch of changes as redline marks, returning the marked
    /// document. The input document is left untouched, so a failed batch
    /// never leaves a half-applied state.
    ///
    /// Changes are applied back to front so earlier positions stay valid
    /// while later ones are rewritten. A change without a position is
    /// skipped, as is a deletion or replacement without its old text.
    pub fn apply_changes(&self, changes: &[Change]) -> Document {
        let mut doc = self.clone();
        let mut ordered: Vec<&Change> = changes.iter().collect();
        ordered.sort_by(|a, b| b.position.unwrap_or(0).cmp(&a.position.unwrap_or(0)));
        for change in ordered {
            apply_change(&mut doc, change);
        }
        doc.normalize();
        doc
    }

    /// Resolve every mark in favor of the change: additions become plain
    /// text, deleted text is removed.
    pub fn accept_all(&self) -> Document {
        let mut doc = self.clone();
        doc.visit_lines(|runs| {
            runs.retain(|run| run.marks.redline != Some(RedlineKind::Deletion));
            for run in runs.iter_mut() {
                run.marks.redline = None;
            }
        });
        doc.normalize();
        doc
    }

    /// Resolve every mark in favor of the original: additions are removed,
    /// deleted text becomes plain again.
    pub fn reject_all(&self) -> Document {
        let mut doc = self.clone();
        doc.visit_lines(|runs| {
            runs.retain(|run| run.marks.redline != Some(RedlineKind::Addition));
            for run in runs.iter_mut() {
                run.marks.redline = None;
            }
        });
        doc.normalize();
        doc
    }
}

fn apply_change(doc: &mut Document, change: &Change) {
    let position = match change.position {
        Some(position) => position,
        None => return,
    };
    match change.kind {
        ChangeKind::Deletion => {
            if let Some(old) = nonempty(&change.old_text) {
                mark_span(doc, position, old.chars().count(), RedlineKind::Deletion);
            }
        }
        ChangeKind::Addition => insert_marked(doc, position, &change.text),
        ChangeKind::Replacement => {
            if let Some(old) = nonempty(&change.old_text) {
                let old_len = old.chars().count();
                mark_span(doc, position, old_len, RedlineKind::Deletion);
                insert_marked(doc, position + old_len, &change.text);
            }
        }
    }
}

fn nonempty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.is_empty())
}

/// Mark `start..end` of the flattened text with a redline kind, splitting
/// runs at the boundaries. Code block text is skipped; it only advances
/// the cursor.
fn mark_span(doc: &mut Document, start: usize, len: usize, kind: RedlineKind) {
    let mut cursor = 0usize;
    mark_blocks(&mut doc.blocks, &mut cursor, start, start + len, kind);
}

fn mark_blocks(
    blocks: &mut [Block],
    cursor: &mut usize,
    start: usize,
    end: usize,
    kind: RedlineKind,
) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => mark_line(&mut p.runs, cursor, start, end, kind),
            Block::Heading(h) => mark_line(&mut h.runs, cursor, start, end, kind),
            Block::Blockquote(q) => mark_line(&mut q.runs, cursor, start, end, kind),
            Block::CodeBlock(code) => *cursor += code.text.chars().count() + 1,
            Block::OrderedList(list) => {
                mark_items(&mut list.items, cursor, start, end, kind);
            }
            Block::BulletList(list) => {
                mark_items(&mut list.items, cursor, start, end, kind);
            }
        }
    }
}

fn mark_items(
    items: &mut [ListItem],
    cursor: &mut usize,
    start: usize,
    end: usize,
    kind: RedlineKind,
) {
    for item in items {
        mark_line(&mut item.runs, cursor, start, end, kind);
        mark_blocks(&mut item.nested, cursor, start, end, kind);
    }
}

fn mark_line(runs: &mut Vec<Run>, cursor: &mut usize, start: usize, end: usize, kind: RedlineKind) {
    let line_len: usize = runs.iter().map(|run| run.text.chars().count()).sum();
    let line_start = *cursor;
    let line_end = line_start + line_len;
    *cursor = line_end + 1;
    if end <= line_start || start >= line_end {
        return;
    }
    let local_start = start.saturating_sub(line_start);
    let local_end = (end - line_start).min(line_len);
    mark_runs_range(runs, local_start, local_end, kind);
}

fn mark_runs_range(runs: &mut Vec<Run>, start: usize, end: usize, kind: RedlineKind) {
    if start >= end {
        return;
    }
    let mut rebuilt: Vec<Run> = Vec::with_capacity(runs.len() + 2);
    let mut offset = 0usize;
    for run in runs.drain(..) {
        let len = run.text.chars().count();
        let run_start = offset;
        offset += len;
        if end <= run_start || start >= run_start + len {
            rebuilt.push(run);
            continue;
        }
        let chars: Vec<char> = run.text.chars().collect();
        let from = start.saturating_sub(run_start);
        let to = (end - run_start).min(len);
        if from > 0 {
            rebuilt.push(Run {
                text: chars[..from].iter().collect(),
                marks: run.marks.clone(),
            });
        }
        let mut marked = run.marks.clone();
        marked.set_redline(kind);
        rebuilt.push(Run {
            text: chars[from..to].iter().collect(),
            marks: marked,
        });
        if to < len {
            rebuilt.push(Run {
                text: chars[to..].iter().collect(),
                marks: run.marks,
            });
        }
    }
    *runs = rebuilt;
}

/// Insert `text` at a flattened-text position as an addition-marked run.
/// A position past the end of the document appends to the last line.
fn insert_marked(doc: &mut Document, position: usize, text: &str) {
    if text.is_empty() {
        return;
    }
    let mut run = Run::plain(text);
    run.marks.set_redline(RedlineKind::Addition);
    let mut pending = Some(run);
    let mut cursor = 0usize;
    insert_blocks(&mut doc.blocks, &mut cursor, position, &mut pending);
    if let Some(run) = pending {
        append_run(doc, run);
    }
}

fn insert_blocks(
    blocks: &mut [Block],
    cursor: &mut usize,
    position: usize,
    pending: &mut Option<Run>,
) {
    for block in blocks {
        if pending.is_none() {
            return;
        }
        match block {
            Block::Paragraph(p) => insert_line(&mut p.runs, cursor, position, pending),
            Block::Heading(h) => insert_line(&mut h.runs, cursor, position, pending),
            Block::Blockquote(q) => insert_line(&mut q.runs, cursor, position, pending),
            Block::CodeBlock(code) => {
                let len = code.text.chars().count();
                // Text cannot be inserted into a code line.
                if position >= *cursor && position <= *cursor + len {
                    pending.take();
                }
                *cursor += len + 1;
            }
            Block::OrderedList(list) => {
                insert_items(&mut list.items, cursor, position, pending);
            }
            Block::BulletList(list) => {
                insert_items(&mut list.items, cursor, position, pending);
            }
        }
    }
}

fn insert_items(
    items: &mut [ListItem],
    cursor: &mut usize,
    position: usize,
    pending: &mut Option<Run>,
) {
    for item in items {
        insert_line(&mut item.runs, cursor, position, pending);
        insert_blocks(&mut item.nested, cursor, position, pending);
    }
}

fn insert_line(
    runs: &mut Vec<Run>,
    cursor: &mut usize,
    position: usize,
    pending: &mut Option<Run>,
) {
    let line_len: usize = runs.iter().map(|run| run.text.chars().count()).sum();
    let line_start = *cursor;
    *cursor = line_start + line_len + 1;
    // The line end is inclusive so an insert at a boundary lands at the
    // end of the earlier line rather than the start of the next.
    if position < line_start || position > line_start + line_len {
        return;
    }
    if let Some(run) = pending.take() {
        insert_run_at(runs, position - line_start, run);
    }
}

fn insert_run_at(runs: &mut Vec<Run>, position: usize, run: Run) {
    let mut rebuilt: Vec<Run> = Vec::with_capacity(runs.len() + 2);
    let mut offset = 0usize;
    let mut pending = Some(run);
    for existing in runs.drain(..) {
        let len = existing.text.chars().count();
        match pending.take() {
            Some(insert) if position <= offset + len => {
                let local = position - offset;
                if local == 0 {
                    rebuilt.push(insert);
                    rebuilt.push(existing);
                } else if local == len {
                    rebuilt.push(existing);
                    rebuilt.push(insert);
                } else {
                    let chars: Vec<char> = existing.text.chars().collect();
                    rebuilt.push(Run {
                        text: chars[..local].iter().collect(),
                        marks: existing.marks.clone(),
                    });
                    rebuilt.push(insert);
                    rebuilt.push(Run {
                        text: chars[local..].iter().collect(),
                        marks: existing.marks,
                    });
                }
            }
            held => {
                pending = held;
                rebuilt.push(existing);
            }
        }
        offset += len;
    }
    if let Some(insert) = pending {
        rebuilt.push(insert);
    }
    *runs = rebuilt;
}

fn append_run(doc: &mut Document, run: Run) {
    match last_line_mut(&mut doc.blocks) {
        Some(runs) => runs.push(run),
        None => doc.blocks.push(Block::Paragraph(Paragraph {
            classes: Vec::new(),
            runs: vec![run],
        })),
    }
}

fn last_line_mut(blocks: &mut [Block]) -> Option<&mut Vec<Run>> {
    match blocks.last_mut()? {
        Block::Paragraph(p) => Some(&mut p.runs),
        Block::Heading(h) => Some(&mut h.runs),
        Block::Blockquote(q) => Some(&mut q.runs),
        Block::CodeBlock(_) => None,
        Block::OrderedList(list) => last_item_line(&mut list.items),
        Block::BulletList(list) => last_item_line(&mut list.items),
    }
}

fn last_item_line(items: &mut [ListItem]) -> Option<&mut Vec<Run>> {
    let item = items.last_mut()?;
    if item.nested.is_empty() {
        Some(&mut item.runs)
    } else {
        last_line_mut(&mut item.nested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDITION_SPAN: &str =
        r#"<span class="redline-addition" style="color: red; text-decoration: underline;">"#;
    const DELETION_SPAN: &str =
        r#"<span class="redline-deletion" style="color: red; text-decoration: line-through;">"#;

    fn deletion(position: usize, old_text: &str) -> Change {
        Change {
            kind: ChangeKind::Deletion,
            text: String::new(),
            position: Some(position),
            old_text: Some(old_text.to_string()),
        }
    }

    fn addition(position: usize, text: &str) -> Change {
        Change {
            kind: ChangeKind::Addition,
            text: text.to_string(),
            position: Some(position),
            old_text: None,
        }
    }

    fn replacement(position: usize, old_text: &str, text: &str) -> Change {
        Change {
            kind: ChangeKind::Replacement,
            text: text.to_string(),
            position: Some(position),
            old_text: Some(old_text.to_string()),
        }
    }

    #[test]
    fn test_deletion_marks_text_without_removing_it() {
        let doc = Document::from_html("<p>alpha beta gamma</p>");
        let marked = doc.apply_changes(&[deletion(6, "beta")]);

        let html = marked.to_html();
        assert!(html.contains(&format!("{}beta</span>", DELETION_SPAN)), "{}", html);
        assert_eq!(marked.flattened_text(), "alpha beta gamma");
        assert!(marked.has_redline_marks());
    }

    #[test]
    fn test_addition_inserts_marked_text() {
        let doc = Document::from_html("<p>alpha gamma</p>");
        let marked = doc.apply_changes(&[addition(6, "beta ")]);

        assert_eq!(marked.flattened_text(), "alpha beta gamma");
        let html = marked.to_html();
        assert!(html.contains(&format!("{}beta </span>", ADDITION_SPAN)), "{}", html);
    }

    #[test]
    fn test_replacement_marks_old_and_inserts_new() {
        let doc = Document::from_html("<p>alpha beta gamma</p>");
        let marked = doc.apply_changes(&[replacement(6, "beta", "BETA")]);

        assert_eq!(marked.flattened_text(), "alpha betaBETA gamma");
        let html = marked.to_html();
        assert!(
            html.contains(&format!("beta</span>{}BETA</span>", ADDITION_SPAN)),
            "{}",
            html
        );
    }

    #[test]
    fn test_disjoint_changes_apply_in_any_order() {
        let doc = Document::from_html("<p>alpha beta gamma</p><p>delta epsilon</p>");
        let changes = [
            deletion(0, "alpha"),
            replacement(6, "beta", "BETA"),
            addition(17, "fresh "),
        ];

        let baseline = doc.apply_changes(&changes);
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let shuffled: Vec<Change> = order.iter().map(|&i| changes[i].clone()).collect();
            assert_eq!(doc.apply_changes(&shuffled), baseline, "order {:?}", order);
        }
    }

    #[test]
    fn test_accept_all_keeps_additions_and_drops_deletions() {
        let doc = Document::from_html("<p>alpha beta gamma</p>");
        let marked = doc.apply_changes(&[replacement(6, "beta", "BETA")]);

        let accepted = marked.accept_all();
        assert!(!accepted.has_redline_marks());
        assert_eq!(accepted.to_html(), "<p>alpha BETA gamma</p>");
    }

    #[test]
    fn test_reject_all_restores_the_original_text() {
        let doc = Document::from_html("<p>alpha beta gamma</p>");
        let marked = doc.apply_changes(&[replacement(6, "beta", "BETA")]);

        let rejected = marked.reject_all();
        assert!(!rejected.has_redline_marks());
        assert_eq!(rejected.to_html(), doc.to_html());
    }

    #[test]
    fn test_change_without_position_is_skipped() {
        let doc = Document::from_html("<p>alpha</p>");
        let mut change = addition(0, "x");
        change.position = None;

        assert_eq!(doc.apply_changes(&[change]), doc);
    }

    #[test]
    fn test_deletion_without_old_text_is_skipped() {
        let doc = Document::from_html("<p>alpha</p>");
        let mut missing = deletion(0, "alpha");
        missing.old_text = None;
        let mut empty = deletion(0, "");
        empty.old_text = Some(String::new());

        assert_eq!(doc.apply_changes(&[missing]), doc);
        assert_eq!(doc.apply_changes(&[empty]), doc);
    }

    #[test]
    fn test_addition_past_the_end_appends_to_the_last_line() {
        let doc = Document::from_html("<p>short</p>");
        let marked = doc.apply_changes(&[addition(10_000, " tail")]);

        assert_eq!(marked.flattened_text(), "short tail");
        let html = marked.to_html();
        assert!(html.ends_with(" tail</span></p>"), "{}", html);
    }

    #[test]
    fn test_deletion_spanning_blocks_marks_both() {
        let doc = Document::from_html("<p>one two</p><p>three</p>");
        let marked = doc.apply_changes(&[deletion(4, "two\nthree")]);

        let html = marked.to_html();
        assert!(html.contains(&format!("{}two</span>", DELETION_SPAN)), "{}", html);
        assert!(html.contains(&format!("{}three</span>", DELETION_SPAN)), "{}", html);
        assert_eq!(marked.flattened_text(), "one two\nthree");
    }

    #[test]
    fn test_addition_at_a_block_boundary_lands_in_the_earlier_block() {
        let doc = Document::from_html("<p>one</p><p>two</p>");
        let marked = doc.apply_changes(&[addition(3, "!")]);

        let html = marked.to_html();
        assert!(
            html.starts_with(&format!("<p>one{}!</span></p>", ADDITION_SPAN)),
            "{}",
            html
        );
    }

    #[test]
    fn test_marking_overwrites_an_existing_mark() {
        let doc = Document::from_html("<p>alpha</p>");
        let once = doc.apply_changes(&[addition(5, " extra")]);
        let twice = once.apply_changes(&[deletion(5, " extra")]);

        let html = twice.to_html();
        assert!(html.contains(&format!("{} extra</span>", DELETION_SPAN)), "{}", html);
        assert!(!html.contains("redline-addition"), "{}", html);
    }

    #[test]
    fn test_changes_deserialize_from_model_json() {
        let change: Change =
            serde_json::from_str(r#"{"type":"replacement","text":"new","position":5,"oldText":"old"}"#)
                .unwrap();
        assert_eq!(change.kind, ChangeKind::Replacement);
        assert_eq!(change.text, "new");
        assert_eq!(change.position, Some(5));
        assert_eq!(change.old_text.as_deref(), Some("old"));

        let sparse: Change = serde_json::from_str(r#"{"type":"addition","text":"x"}"#).unwrap();
        assert_eq!(sparse.kind, ChangeKind::Addition);
        assert_eq!(sparse.position, None);
        assert_eq!(sparse.old_text, None);

        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["oldText"], "old");
        assert_eq!(value["type"], "replacement");
    }

    #[test]
    fn test_marks_survive_inside_formatted_text() {
        let doc = Document::from_html("<p><strong>alpha beta</strong></p>");
        let marked = doc.apply_changes(&[deletion(6, "beta")]);

        let html = marked.to_html();
        assert!(
            html.contains(&format!("{}<strong>beta</strong></span>", DELETION_SPAN)),
            "{}",
            html
        );
        assert!(html.contains("<strong>alpha </strong>"), "{}", html);
    }

    #[test]
    fn test_list_items_are_addressable_lines() {
        let doc = Document::from_html("<ol><li>first</li><li>second</li></ol>");
        // "first" is 0..5, the separator sits at 5, "second" starts at 6.
        let marked = doc.apply_changes(&[deletion(6, "second")]);

        let html = marked.to_html();
        assert!(html.contains(&format!("<li>{}second</span></li>", DELETION_SPAN)), "{}", html);
        assert!(html.contains("<li>first</li>"), "{}", html);
    }
}
