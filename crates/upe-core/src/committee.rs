//! Committee generation and judging.
//!
//! A committee is `k` independent oracle calls over the same prompt, one per
//! candidate, each with its own seed and temperature. Calls run concurrently
//! on the tokio runtime and are collected back in generation order, so the
//! outcome never depends on which call finishes first.
//!
//! A failing call (transport error, malformed output, panicking task) does not
//! abort the committee. The candidate is kept with score 0 and the failure
//! recorded.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::domain::manifest::{CandidateRecord, RunStatus};
use crate::gear::{GearProfile, CITATION_CAP, CITATION_WEIGHT, MIN_SECTIONS_FOR_BONUS, SECTION_BONUS};
use crate::oracle::Oracle;

/// One generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// `C1` .. `Ck`, in generation order.
    pub id: String,
    pub seed: u64,
    pub temperature: f64,
    pub raw_output: Value,
    pub score: f64,
    pub section_count: usize,
    pub citation_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Candidate {
    fn scored(index: usize, seed: u64, temperature: f64, raw_output: Value, evidence_required: bool) -> Self {
        let (section_count, citation_count) = counts(&raw_output);
        Self {
            id: candidate_id(index),
            seed,
            temperature,
            score: score(section_count, citation_count, evidence_required),
            raw_output,
            section_count,
            citation_count,
            failure: None,
        }
    }

    fn failed(index: usize, seed: u64, temperature: f64, message: String) -> Self {
        Self {
            id: candidate_id(index),
            seed,
            temperature,
            raw_output: json!({ "status": "TOOL_ERROR", "message": message }),
            score: 0.0,
            section_count: 0,
            citation_count: 0,
            failure: Some(message),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Refusal status carried by the output itself (the failure-JSON contract),
    /// if any. Only `INSUFFICIENT_CONTEXT` and `POLICY_BLOCK` count.
    pub fn reported_status(&self) -> Option<RunStatus> {
        if self.is_failed() {
            return None;
        }
        let status = self.raw_output.get("status").and_then(Value::as_str)?;
        match RunStatus::from_wire(status)? {
            s @ (RunStatus::InsufficientContext | RunStatus::PolicyBlock) => Some(s),
            _ => None,
        }
    }

    pub fn record(&self) -> CandidateRecord {
        CandidateRecord {
            id: self.id.clone(),
            seed: self.seed,
            temperature: self.temperature,
            score: self.score,
            section_count: self.section_count,
            citation_count: self.citation_count,
            failure: self.failure.clone(),
        }
    }
}

fn candidate_id(index: usize) -> String {
    format!("C{}", index + 1)
}

/// `(sections, citations)` array lengths of a raw output; absent or non-list is 0.
fn counts(raw: &Value) -> (usize, usize) {
    let len = |key: &str| raw.get(key).and_then(Value::as_array).map_or(0, Vec::len);
    (len("sections"), len("citations"))
}

/// Heuristic candidate score.
///
/// `SECTION_BONUS` for at least `MIN_SECTIONS_FOR_BONUS` sections, plus
/// `min(CITATION_CAP, CITATION_WEIGHT * citations)` when evidence counts.
pub fn score(section_count: usize, citation_count: usize, evidence_required: bool) -> f64 {
    let mut score = 0.0;
    if section_count >= MIN_SECTIONS_FOR_BONUS {
        score += SECTION_BONUS;
    }
    if evidence_required {
        score += (CITATION_WEIGHT * citation_count as f64).min(CITATION_CAP);
    }
    score
}

/// All candidates of one run, in generation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Committee {
    pub candidates: Vec<Candidate>,
}

impl Committee {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn all_failed(&self) -> bool {
        self.candidates.iter().all(Candidate::is_failed)
    }

    pub fn records(&self) -> Vec<CandidateRecord> {
        self.candidates.iter().map(Candidate::record).collect()
    }
}

/// Issue `profile.candidate_count` concurrent oracle calls.
///
/// Candidate `i` (0-based) uses `base_seed + i` and `profile.temperature_for(i)`.
#[instrument(skip(oracle, prompt, profile), fields(gear = %profile.name, k = profile.candidate_count))]
pub async fn run_committee(
    oracle: Arc<dyn Oracle>,
    prompt: Arc<str>,
    profile: &GearProfile,
    base_seed: u64,
    evidence_required: bool,
) -> Committee {
    let plan: Vec<(u64, f64)> = (0..profile.candidate_count)
        .map(|i| (base_seed.wrapping_add(i as u64), profile.temperature_for(i)))
        .collect();

    let handles = plan.iter().map(|&(seed, temperature)| {
        let oracle = Arc::clone(&oracle);
        let prompt = Arc::clone(&prompt);
        tokio::spawn(async move { oracle.generate(&prompt, seed, temperature).await })
    });
    let outcomes = join_all(handles).await;

    let candidates = outcomes
        .into_iter()
        .zip(plan)
        .enumerate()
        .map(|(index, (outcome, (seed, temperature)))| match outcome {
            Ok(Ok(raw)) => Candidate::scored(index, seed, temperature, raw, evidence_required),
            Ok(Err(e)) => {
                warn!(candidate = index + 1, seed, error = %e, "oracle call failed");
                Candidate::failed(index, seed, temperature, e.to_string())
            }
            Err(join_err) => {
                warn!(candidate = index + 1, seed, error = %join_err, "oracle task aborted");
                Candidate::failed(index, seed, temperature, format!("oracle task failed: {join_err}"))
            }
        })
        .collect();

    Committee { candidates }
}

// ---------------------------------------------------------------------------
// Judge
// ---------------------------------------------------------------------------

/// `(id, score)` pair in ranked order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: String,
    pub score: f64,
}

/// The judge's decision over a committee.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    /// Index into `Committee::candidates`.
    pub winner_index: usize,
    pub winner_id: String,
    pub score: f64,
    pub triangulated: bool,
    /// Highest score first.
    pub ranking: Vec<RankedCandidate>,
}

/// Rank by score, highest first. Ties keep generation order, so the earliest
/// of several top-scoring candidates wins. One extra rule sits above that: a
/// failed candidate never outranks a successful one with the same score,
/// which only matters for ties at 0.0.
///
/// Triangulation holds when not required; otherwise it needs a second-ranked
/// candidate with at least two sections. `None` for an empty committee.
pub fn judge(committee: &Committee, triangulation_required: bool) -> Option<Judgement> {
    let candidates = &committee.candidates;
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        let (ca, cb) = (&candidates[a], &candidates[b]);
        cb.score
            .total_cmp(&ca.score)
            .then_with(|| ca.is_failed().cmp(&cb.is_failed()))
    });

    let winner_index = *order.first()?;
    let winner = &candidates[winner_index];
    let triangulated = !triangulation_required
        || order
            .get(1)
            .is_some_and(|&second| candidates[second].section_count >= MIN_SECTIONS_FOR_BONUS);

    Some(Judgement {
        winner_index,
        winner_id: winner.id.clone(),
        score: winner.score,
        triangulated,
        ranking: order
            .iter()
            .map(|&i| RankedCandidate {
                id: candidates[i].id.clone(),
                score: candidates[i].score,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gear;
    use crate::oracle::scripted::{ScriptedOracle, ScriptedReply};

    fn output(sections: usize, citations: usize) -> Value {
        let sections: Vec<Value> = (0..sections)
            .map(|i| json!({ "id": format!("s{i}"), "heading": "H", "blocks": [] }))
            .collect();
        let citations: Vec<Value> = (0..citations)
            .map(|i| json!({ "id": format!("c{i}"), "source_id": "s", "quote": "q" }))
            .collect();
        json!({ "title": "T", "sections": sections, "citations": citations })
    }

    fn committee_of(outputs: &[(usize, usize)], evidence: bool) -> Committee {
        Committee {
            candidates: outputs
                .iter()
                .enumerate()
                .map(|(i, &(s, c))| Candidate::scored(i, i as u64, 0.1, output(s, c), evidence))
                .collect(),
        }
    }

    #[test]
    fn score_follows_section_and_citation_weights() {
        assert_eq!(score(1, 9, false), 0.0);
        assert_eq!(score(2, 9, false), 0.5);
        assert!((score(2, 3, true) - 0.8).abs() < 1e-9);
        assert_eq!(score(2, 7, true), 1.0);
        assert_eq!(score(0, 20, true), 0.5);
    }

    #[test]
    fn judge_prefers_highest_score() {
        let committee = committee_of(&[(1, 0), (2, 0), (3, 0)], false);
        let j = judge(&committee, false).unwrap();
        assert_eq!(j.winner_id, "C2");
        assert_eq!(j.score, 0.5);
        let ids: Vec<&str> = j.ranking.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["C2", "C3", "C1"]);
    }

    #[test]
    fn ties_keep_generation_order() {
        let committee = committee_of(&[(0, 0), (0, 0), (0, 0)], false);
        let j = judge(&committee, false).unwrap();
        assert_eq!(j.winner_id, "C1");
    }

    #[test]
    fn earliest_of_tied_maximum_wins() {
        // 0.5, 0.9, 0.9
        let committee = committee_of(&[(2, 0), (2, 4), (2, 4)], true);
        let j = judge(&committee, false).unwrap();
        assert_eq!(j.winner_id, "C2");
        assert_eq!(j.winner_index, 1);
        assert!((j.score - 0.9).abs() < 1e-9);
        let ids: Vec<&str> = j.ranking.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["C2", "C3", "C1"]);
    }

    #[test]
    fn tied_maximum_away_from_the_front() {
        // 0.5, 0.9, 1.0, 0.5, 1.0
        let committee = committee_of(&[(2, 0), (2, 4), (2, 5), (2, 0), (2, 9)], true);
        let j = judge(&committee, false).unwrap();
        assert_eq!(j.winner_id, "C3");
        let ids: Vec<&str> = j.ranking.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["C3", "C5", "C2", "C1", "C4"]);
    }

    #[test]
    fn failed_candidate_loses_ties() {
        let mut committee = committee_of(&[(0, 0), (0, 0)], false);
        committee.candidates[0] = Candidate::failed(0, 0, 0.1, "down".to_string());
        let j = judge(&committee, false).unwrap();
        assert_eq!(j.winner_id, "C2");
    }

    #[test]
    fn triangulation_needs_a_strong_runner_up() {
        let weak_second = committee_of(&[(2, 5), (1, 0)], true);
        assert!(!judge(&weak_second, true).unwrap().triangulated);
        assert!(judge(&weak_second, false).unwrap().triangulated);

        let strong_second = committee_of(&[(2, 5), (2, 1)], true);
        assert!(judge(&strong_second, true).unwrap().triangulated);

        let single = committee_of(&[(3, 5)], true);
        assert!(!judge(&single, true).unwrap().triangulated);
    }

    #[test]
    fn empty_committee_has_no_judgement() {
        assert!(judge(&Committee::default(), false).is_none());
    }

    #[test]
    fn refusal_status_is_reported() {
        let refusal = Candidate::scored(
            0,
            1,
            0.1,
            json!({ "status": "POLICY_BLOCK" }),
            false,
        );
        assert_eq!(refusal.reported_status(), Some(RunStatus::PolicyBlock));
        let failed = Candidate::failed(0, 1, 0.1, "x".to_string());
        assert_eq!(failed.reported_status(), None);
        let ok = Candidate::scored(0, 1, 0.1, json!({ "status": "OK" }), false);
        assert_eq!(ok.reported_status(), None);
    }

    #[tokio::test]
    async fn committee_uses_seed_offsets_and_temperatures() {
        let profile = gear::lookup("mentor").unwrap();
        let oracle = Arc::new(ScriptedOracle::outputs(100, [output(2, 0), output(1, 0), output(3, 0)]));
        let committee = run_committee(oracle.clone(), Arc::from("p"), profile, 100, false).await;

        assert_eq!(committee.len(), 3);
        let ids: Vec<&str> = committee.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2", "C3"]);
        assert_eq!(committee.candidates[1].section_count, 1);
        assert_eq!(oracle.calls(), vec![(100, 0.2), (101, 0.5), (102, 0.5)]);
    }

    #[tokio::test]
    async fn failures_degrade_to_zero_score() {
        let profile = gear::lookup("mentor").unwrap();
        let oracle = Arc::new(ScriptedOracle::new(
            0,
            vec![
                ScriptedReply::Fail("timeout".to_string()),
                ScriptedReply::Panic,
                ScriptedReply::Output(output(2, 0)),
            ],
        ));
        let committee = run_committee(oracle, Arc::from("p"), profile, 0, false).await;

        assert!(committee.candidates[0].is_failed());
        assert_eq!(committee.candidates[0].raw_output["status"], "TOOL_ERROR");
        assert!(committee.candidates[1]
            .failure
            .as_deref()
            .is_some_and(|m| m.starts_with("oracle task failed")));
        assert!(!committee.all_failed());
        assert_eq!(judge(&committee, false).unwrap().winner_id, "C3");
    }
}
