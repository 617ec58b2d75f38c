//! Structural edit operations over a [`Document`].
//!
//! Ops arrive as loose JSON (`{"op": "limit", "section": ..., "max_words": ...}`)
//! and are parsed leniently: missing string fields read as empty, and an
//! unknown or missing `op` tag becomes [`EditOp::Unrecognized`], which
//! [`apply_edits`] skips. Applying ops never mutates its input.

use serde_json::Value;

use crate::domain::document::{headings_match, Block, Document};

/// Word budget of `limit` when `max_words` is absent or unusable.
pub const DEFAULT_MAX_WORDS: usize = 200;

/// The only rewrite target with an effect.
pub const TONE_TARGET: &str = "tone";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Drop every section whose heading matches `target`.
    Remove { target: String },
    /// Append a `Focus on: {topic}` list to the first section.
    Focus { topic: String },
    /// Only `target == "tone"` has an effect: ` [{to}]` is appended to the title.
    Rewrite { target: String, to: String },
    /// Truncate paragraph text in matching sections to `max_words` words.
    Limit { section: String, max_words: usize },
    Unrecognized { tag: Option<String> },
}

impl EditOp {
    pub fn from_value(value: &Value) -> EditOp {
        let tag = value.get("op").and_then(Value::as_str);
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        match tag {
            Some("remove") => EditOp::Remove { target: text("target") },
            Some("focus") => EditOp::Focus { topic: text("topic") },
            Some("rewrite") => EditOp::Rewrite {
                target: text("target"),
                to: text("to"),
            },
            Some("limit") => EditOp::Limit {
                section: text("section"),
                max_words: value
                    .get("max_words")
                    .and_then(word_budget)
                    .unwrap_or(DEFAULT_MAX_WORDS),
            },
            other => EditOp::Unrecognized {
                tag: other.map(str::to_string),
            },
        }
    }

    /// The `op` tag this op was parsed from.
    pub fn tag(&self) -> Option<&str> {
        match self {
            EditOp::Remove { .. } => Some("remove"),
            EditOp::Focus { .. } => Some("focus"),
            EditOp::Rewrite { .. } => Some("rewrite"),
            EditOp::Limit { .. } => Some("limit"),
            EditOp::Unrecognized { tag } => tag.as_deref(),
        }
    }
}

/// Integer or numeric string.
fn word_budget(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_ops(raw: &[Value]) -> Vec<EditOp> {
    raw.iter().map(EditOp::from_value).collect()
}

/// Tags of all attempted ops, recognized or not, in order.
pub fn touched_tags(ops: &[EditOp]) -> Vec<Option<String>> {
    ops.iter().map(|op| op.tag().map(str::to_string)).collect()
}

/// Apply `ops` in order to a copy of `doc`.
pub fn apply_edits(doc: &Document, ops: &[EditOp]) -> Document {
    ops.iter().fold(doc.clone(), apply_one)
}

fn apply_one(mut doc: Document, op: &EditOp) -> Document {
    match op {
        EditOp::Remove { target } => {
            doc.sections.retain(|s| !headings_match(&s.heading, target));
        }
        EditOp::Focus { topic } => {
            if let Some(first) = doc.sections.first_mut() {
                first.blocks.push(Block::list([format!("Focus on: {topic}")]));
            }
        }
        EditOp::Rewrite { target, to } => {
            if target == TONE_TARGET {
                doc.title = format!("{} [{}]", doc.title, to);
            }
        }
        EditOp::Limit { section, max_words } => {
            for s in doc.sections.iter_mut().filter(|s| headings_match(&s.heading, section)) {
                for block in &mut s.blocks {
                    if let Block::Paragraph { text, .. } = block {
                        if let Some(shorter) = truncate_words(text, *max_words) {
                            *text = shorter;
                        }
                    }
                }
            }
        }
        EditOp::Unrecognized { .. } => {}
    }
    doc
}

/// First `max_words` whitespace-separated words joined by single spaces, or
/// `None` when the text is already within budget.
fn truncate_words(text: &str, max_words: usize) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    (words.len() > max_words).then(|| words[..max_words].join(" "))
}
