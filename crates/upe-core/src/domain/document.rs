//! Canonical document model shared by the normalizer, renderers and the edit engine.

use serde::{Deserialize, Serialize};

/// An evidentiary statement attached to a paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub text: String,
    #[serde(rename = "sourceId", default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Confidence in 0.0–1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Typed content block. Serialized with a `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    #[serde(rename = "para")]
    Paragraph {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        claims: Option<Vec<Claim>>,
    },
    List {
        items: Vec<String>,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
    /// Opaque chart specification; renderers that cannot draw it degrade.
    Chart {
        spec: serde_json::Value,
    },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph {
            text: text.into(),
            claims: None,
        }
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Block::List {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Wire tag of this block variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "para",
            Block::List { .. } => "list",
            Block::Table { .. } => "table",
            Block::Chart { .. } => "chart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique within the owning document.
    pub id: String,
    pub heading: String,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(id: impl Into<String>, heading: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            id: id.into(),
            heading: heading.into(),
            blocks,
        }
    }
}

/// Root of the document model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Document {
    pub fn new(title: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            title: title.into(),
            sections,
        }
    }

    /// First section whose heading matches `heading` case-insensitively.
    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections.iter().find(|s| headings_match(&s.heading, heading))
    }

    /// First duplicated section id, if the uniqueness invariant is broken.
    pub fn duplicate_section_id(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.sections
            .iter()
            .map(|s| s.id.as_str())
            .find(|id| !seen.insert(*id))
    }

    pub fn block_count(&self) -> usize {
        self.sections.iter().map(|s| s.blocks.len()).sum()
    }
}

/// Case-insensitive heading comparison used by edit targeting.
pub fn headings_match(heading: &str, target: &str) -> bool {
    heading.to_lowercase() == target.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_serializes_with_kind_tag() {
        let para = Block::paragraph("hello");
        assert_eq!(
            serde_json::to_value(&para).unwrap(),
            serde_json::json!({ "kind": "para", "text": "hello" })
        );

        let table = Block::Table {
            rows: vec![vec!["a".into(), "b".into()]],
        };
        assert_eq!(
            serde_json::to_value(&table).unwrap(),
            serde_json::json!({ "kind": "table", "rows": [["a", "b"]] })
        );
    }

    #[test]
    fn claims_round_trip_with_camel_case_source() {
        let json = serde_json::json!({
            "kind": "para",
            "text": "Revenue grew.",
            "claims": [{ "id": "c1", "text": "grew 4%", "sourceId": "s9", "confidence": 0.7 }]
        });
        let block: Block = serde_json::from_value(json.clone()).unwrap();
        match &block {
            Block::Paragraph { claims: Some(claims), .. } => {
                assert_eq!(claims[0].source_id.as_deref(), Some("s9"));
            }
            other => panic!("expected paragraph with claims, got {other:?}"),
        }
        assert_eq!(serde_json::to_value(&block).unwrap(), json);
    }

    #[test]
    fn document_rejects_unknown_fields() {
        let json = serde_json::json!({ "title": "t", "sections": [], "extra": 1 });
        assert!(serde_json::from_value::<Document>(json).is_err());
    }

    #[test]
    fn duplicate_section_ids_are_detected() {
        let doc = Document::new(
            "t",
            vec![
                Section::new("a", "One", vec![]),
                Section::new("b", "Two", vec![]),
                Section::new("a", "Three", vec![]),
            ],
        );
        assert_eq!(doc.duplicate_section_id(), Some("a"));
    }

    #[test]
    fn section_lookup_ignores_case() {
        let doc = Document::new("t", vec![Section::new("s1", "Executive Summary", vec![])]);
        assert!(doc.section("executive summary").is_some());
        assert!(doc.section("Summary").is_none());
    }
}
