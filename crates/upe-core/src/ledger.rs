//! Judge ledger: a read-only summary derived from a judgement.

use serde::{Deserialize, Serialize};

use crate::committee::{Judgement, RankedCandidate};
use crate::retrieval::SnapshotEntry;

/// Criteria the judge is documented to weigh. Fixed for every run.
pub const RATIONALE: [&str; 3] = ["Evidence density", "Section completeness", "Style adherence"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDiffs {
    pub inputs: Vec<String>,
    /// Ids of the snapshot sources the run saw.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    /// Ranked order, highest score first.
    pub candidates: Vec<RankedCandidate>,
    pub winner_id: String,
    pub rationale: Vec<String>,
    pub diffs: LedgerDiffs,
}

impl Ledger {
    pub fn from_judgement(judgement: &Judgement, snapshot: &[SnapshotEntry]) -> Self {
        Self {
            candidates: judgement.ranking.clone(),
            winner_id: judgement.winner_id.clone(),
            rationale: RATIONALE.iter().map(|r| r.to_string()).collect(),
            diffs: LedgerDiffs {
                inputs: Vec::new(),
                sources: snapshot.iter().map(|s| s.id.clone()).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{snapshot, SourceDoc};

    #[test]
    fn ledger_mirrors_judgement() {
        let judgement = Judgement {
            winner_index: 1,
            winner_id: "C2".to_string(),
            score: 0.5,
            triangulated: true,
            ranking: vec![
                RankedCandidate { id: "C2".to_string(), score: 0.5 },
                RankedCandidate { id: "C1".to_string(), score: 0.0 },
            ],
        };
        let snap = snapshot(&[SourceDoc::new("s1", "A", "x")], 5);
        let ledger = Ledger::from_judgement(&judgement, &snap);

        assert_eq!(ledger.winner_id, "C2");
        assert_eq!(ledger.candidates[0].id, "C2");
        assert_eq!(ledger.rationale, RATIONALE.to_vec());
        assert_eq!(ledger.diffs.sources, vec!["s1".to_string()]);

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["winnerId"], "C2");
        assert_eq!(json["diffs"]["inputs"], serde_json::json!([]));
    }
}
