//! Output normalizer.
//!
//! Oracles return loosely shaped JSON. Blocks may use the canonical
//! `kind`-tagged shape or an alternate `type`/`content` shape, and fields go
//! missing. [`normalize`] maps everything it can onto [`Document`] and only
//! fails when a container has the wrong shape entirely (e.g. `sections` is a
//! string).

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::domain::document::{Block, Claim, Document, Section};
use crate::domain::error::{Result, UpeError};

pub const DEFAULT_TITLE: &str = "Generated Document";
pub const DEFAULT_HEADING: &str = "Section";

/// Map arbitrary oracle output onto the canonical document model.
pub fn normalize(output: &Value) -> Result<Document> {
    let root = output
        .as_object()
        .ok_or_else(|| UpeError::Schema(format!("expected an object, got {}", type_name(output))))?;

    let title = match root.get("title").map(coerce_text) {
        Some(t) if !t.trim().is_empty() => t,
        _ => DEFAULT_TITLE.to_string(),
    };

    let raw_sections = match root.get("sections") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(UpeError::Schema(format!(
                "sections must be a list, got {}",
                type_name(other)
            )))
        }
    };

    let mut used_ids = HashSet::new();
    let mut sections = Vec::with_capacity(raw_sections.len());
    for (index, raw) in raw_sections.iter().enumerate() {
        let obj = raw.as_object().ok_or_else(|| {
            UpeError::Schema(format!(
                "sections[{index}] must be an object, got {}",
                type_name(raw)
            ))
        })?;
        sections.push(repair_section(obj, index, &mut used_ids)?);
    }

    Ok(Document { title, sections })
}

fn repair_section(obj: &Map<String, Value>, index: usize, used: &mut HashSet<String>) -> Result<Section> {
    let base_id = match obj.get("id").map(coerce_text) {
        Some(id) if !id.trim().is_empty() => id,
        _ => format!("section_{}", index + 1),
    };
    let id = unique_id(base_id, used);

    let heading = match obj.get("heading").map(coerce_text) {
        Some(h) if !h.trim().is_empty() => h,
        _ => DEFAULT_HEADING.to_string(),
    };

    let blocks = match obj.get("blocks") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(b, raw)| {
                raw.as_object().map(map_block).ok_or_else(|| {
                    UpeError::Schema(format!(
                        "sections[{index}].blocks[{b}] must be an object, got {}",
                        type_name(raw)
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(UpeError::Schema(format!(
                "sections[{index}].blocks must be a list, got {}",
                type_name(other)
            )))
        }
    };

    Ok(Section { id, heading, blocks })
}

fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// First match wins: canonical `kind` shape, then the `type` mapping, then a
/// paragraph fallback.
fn map_block(obj: &Map<String, Value>) -> Block {
    if !obj.contains_key("type") {
        if let Some(block) = obj.get("kind").and_then(Value::as_str).and_then(|k| canonical_block(k, obj)) {
            return block;
        }
    }

    match obj.get("type").and_then(Value::as_str) {
        Some("text") => Block::paragraph(text_field(obj, "content", "text")),
        Some("list") => Block::List {
            items: string_list(first_present(obj, "items", "content")),
        },
        Some("table") => Block::Table {
            rows: string_rows(first_present(obj, "rows", "content")),
        },
        Some("chart") => Block::Chart {
            spec: first_present(obj, "spec", "content")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        },
        _ => Block::paragraph(text_field(obj, "content", "text")),
    }
}

fn canonical_block(kind: &str, obj: &Map<String, Value>) -> Option<Block> {
    let block = match kind {
        "para" => Block::Paragraph {
            text: text_field(obj, "text", "content"),
            claims: obj.get("claims").and_then(Value::as_array).map(|c| claims(c)),
        },
        "list" => Block::List {
            items: string_list(obj.get("items")),
        },
        "table" => Block::Table {
            rows: string_rows(obj.get("rows")),
        },
        "chart" => Block::Chart {
            spec: obj.get("spec").cloned().unwrap_or_else(|| Value::Object(Map::new())),
        },
        _ => return None,
    };
    Some(block)
}

fn claims(raw: &[Value]) -> Vec<Claim> {
    raw.iter()
        .filter_map(Value::as_object)
        .enumerate()
        .map(|(i, c)| Claim {
            id: c
                .get("id")
                .map(coerce_text)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("claim_{}", i + 1)),
            text: c.get("text").map(coerce_text).unwrap_or_default(),
            source_id: c
                .get("sourceId")
                .or_else(|| c.get("source_id"))
                .filter(|v| !v.is_null())
                .map(coerce_text),
            confidence: c
                .get("confidence")
                .and_then(Value::as_f64)
                .map(|x| x.clamp(0.0, 1.0)),
        })
        .collect()
}

/// `primary` if present and non-null, else `fallback`.
fn first_present<'a>(obj: &'a Map<String, Value>, primary: &str, fallback: &str) -> Option<&'a Value> {
    obj.get(primary)
        .filter(|v| !v.is_null())
        .or_else(|| obj.get(fallback))
}

fn text_field(obj: &Map<String, Value>, primary: &str, fallback: &str) -> String {
    first_present(obj, primary, fallback)
        .map(coerce_text)
        .unwrap_or_default()
}

/// Strings stay as-is, null becomes empty, anything else its compact JSON.
fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(coerce_text).collect(),
        Some(scalar) => vec![coerce_text(scalar)],
    }
}

fn string_rows(value: Option<&Value>) -> Vec<Vec<String>> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(rows)) => rows
            .iter()
            .map(|row| match row {
                Value::Array(cells) => cells.iter().map(coerce_text).collect(),
                scalar => vec![coerce_text(scalar)],
            })
            .collect(),
        Some(scalar) => vec![vec![coerce_text(scalar)]],
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
