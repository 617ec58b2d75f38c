//! Deterministic retrieval snapshots.
//!
//! The corpus hands back an unordered set of sources. [`snapshot`] imposes a
//! total order by `(title, id)`, keeps the first `top_k`, and records only a
//! SHA-256 of each body. Manifests stay compact, and corpus drift between two
//! runs shows up as a hash difference ([`detect_drift`]).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use upe_state::ContentDigest;

use crate::domain::digest::text_digest;
use crate::domain::error::Result;

/// One retrievable source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDoc {
    pub id: String,
    pub title: String,
    pub body: String,
}

impl SourceDoc {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A retained source: identity plus body digest, never the body itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub id: String,
    pub title: String,
    pub content_hash: ContentDigest,
}

/// Order sources by `(title, id)`, truncate to `top_k`, hash bodies.
pub fn snapshot(sources: &[SourceDoc], top_k: usize) -> Vec<SnapshotEntry> {
    let mut ordered: Vec<&SourceDoc> = sources.iter().collect();
    ordered.sort_by(|a, b| (&a.title, &a.id).cmp(&(&b.title, &b.id)));
    ordered
        .into_iter()
        .take(top_k)
        .map(|doc| SnapshotEntry {
            id: doc.id.clone(),
            title: doc.title.clone(),
            content_hash: text_digest(&doc.body),
        })
        .collect()
}

/// Context block embedded in the prompt: one `id hash` line per entry.
pub fn context_lines(entries: &[SnapshotEntry]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .map(|e| format!("{} {}", e.id, e.content_hash))
        .collect();
    format!("Sources:\n{}", lines.join("\n"))
}

/// How a source differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SnapshotDrift {
    Added {
        id: String,
    },
    Removed {
        id: String,
    },
    Changed {
        id: String,
        previous: ContentDigest,
        current: ContentDigest,
    },
}

/// Compare two snapshots by id and content hash. Result is ordered by id.
pub fn detect_drift(previous: &[SnapshotEntry], current: &[SnapshotEntry]) -> Vec<SnapshotDrift> {
    let before: BTreeMap<&str, &ContentDigest> = previous
        .iter()
        .map(|e| (e.id.as_str(), &e.content_hash))
        .collect();
    let after: BTreeMap<&str, &ContentDigest> = current
        .iter()
        .map(|e| (e.id.as_str(), &e.content_hash))
        .collect();

    let mut ids: Vec<&str> = before.keys().chain(after.keys()).copied().collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .filter_map(|id| match (before.get(id), after.get(id)) {
            (None, Some(_)) => Some(SnapshotDrift::Added { id: id.to_string() }),
            (Some(_), None) => Some(SnapshotDrift::Removed { id: id.to_string() }),
            (Some(a), Some(b)) if a != b => Some(SnapshotDrift::Changed {
                id: id.to_string(),
                previous: (*a).clone(),
                current: (*b).clone(),
            }),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Corpus seam
// ---------------------------------------------------------------------------

/// Supplier of the unordered source set.
#[async_trait]
pub trait SourceCorpus: Send + Sync {
    async fn load(&self) -> Result<Vec<SourceDoc>>;
}

/// Fixed in-memory corpus.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    sources: Vec<SourceDoc>,
}

impl StaticCorpus {
    pub fn new(sources: Vec<SourceDoc>) -> Self {
        Self { sources }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SourceCorpus for StaticCorpus {
    async fn load(&self) -> Result<Vec<SourceDoc>> {
        Ok(self.sources.clone())
    }
}

/// One source per `.md` / `.txt` file in a directory (non-recursive).
///
/// id = file stem; title = first `# ` heading, else the stem; body = contents.
#[derive(Debug, Clone)]
pub struct DirCorpus {
    dir: PathBuf,
}

impl DirCorpus {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

fn title_of(stem: &str, body: &str) -> String {
    body.lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| stem.to_string())
}

#[async_trait]
impl SourceCorpus for DirCorpus {
    async fn load(&self) -> Result<Vec<SourceDoc>> {
        let mut sources = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_text = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("md") | Some("txt")
            );
            if !is_text || !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let body = tokio::fs::read_to_string(&path).await?;
            sources.push(SourceDoc::new(stem, title_of(stem, &body), body));
        }
        debug!(dir = %self.dir.display(), count = sources.len(), "corpus loaded");
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<SourceDoc> {
        vec![
            SourceDoc::new("s3", "Beta", "third body"),
            SourceDoc::new("s2", "Alpha", "second body"),
            SourceDoc::new("s1", "Alpha", "first body"),
            SourceDoc::new("s4", "Gamma", "fourth body"),
        ]
    }

    #[test]
    fn orders_by_title_then_id_and_truncates() {
        let snap = snapshot(&corpus(), 3);
        let ids: Vec<&str> = snap.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut reversed = corpus();
        reversed.reverse();
        assert_eq!(snapshot(&corpus(), 10), snapshot(&reversed, 10));
    }

    #[test]
    fn stores_body_digest_not_body() {
        let snap = snapshot(&[SourceDoc::new("a", "A", "hello world")], 1);
        assert_eq!(
            snap[0].content_hash.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("hello world"));
    }

    #[test]
    fn empty_sources_give_empty_snapshot() {
        assert!(snapshot(&[], 6).is_empty());
        assert_eq!(context_lines(&[]), "Sources:\n");
    }

    #[test]
    fn context_lists_id_and_hash() {
        let snap = snapshot(&[SourceDoc::new("a", "A", "")], 1);
        assert_eq!(
            context_lines(&snap),
            "Sources:\na e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn drift_reports_added_removed_changed() {
        let before = snapshot(
            &[
                SourceDoc::new("a", "A", "same"),
                SourceDoc::new("b", "B", "old"),
                SourceDoc::new("c", "C", "gone"),
            ],
            10,
        );
        let after = snapshot(
            &[
                SourceDoc::new("a", "A", "same"),
                SourceDoc::new("b", "B", "new"),
                SourceDoc::new("d", "D", "fresh"),
            ],
            10,
        );
        let drift = detect_drift(&before, &after);
        assert_eq!(drift.len(), 3);
        assert!(matches!(&drift[0], SnapshotDrift::Changed { id, .. } if id == "b"));
        assert_eq!(drift[1], SnapshotDrift::Removed { id: "c".to_string() });
        assert_eq!(drift[2], SnapshotDrift::Added { id: "d".to_string() });
        assert!(detect_drift(&before, &before).is_empty());
    }

    #[tokio::test]
    async fn dir_corpus_reads_text_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pricing.md"), "# Pricing Notes\nTiers are flat.").unwrap();
        std::fs::write(dir.path().join("raw.txt"), "no heading here").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let mut docs = DirCorpus::new(dir.path()).load().await.unwrap();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "pricing");
        assert_eq!(docs[0].title, "Pricing Notes");
        assert_eq!(docs[1].title, "raw");
    }
}
