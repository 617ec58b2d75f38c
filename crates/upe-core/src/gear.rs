//! Gear profile registry.
//!
//! A gear is a named bundle of generation parameters selected by the request
//! `mode`. Profiles are registered statically and never mutated. The heuristic
//! scoring weights used by the committee live here too, so tuning a gate does
//! not require touching committee logic.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, UpeError};

/// Score awarded to a candidate exposing at least [`MIN_SECTIONS_FOR_BONUS`] sections.
pub const SECTION_BONUS: f64 = 0.5;
/// Section count that earns [`SECTION_BONUS`].
pub const MIN_SECTIONS_FOR_BONUS: usize = 2;
/// Score per citation when evidence is required.
pub const CITATION_WEIGHT: f64 = 0.1;
/// Upper bound of the citation component.
pub const CITATION_CAP: f64 = 0.5;

/// Citation floor for gated profiles that do not set one.
pub const DEFAULT_MIN_CITATIONS: u32 = 3;
/// Rubric floor for gated profiles that do not set one.
pub const DEFAULT_RUBRIC_MINIMUM: f64 = 0.80;

/// Generation parameters for one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GearProfile {
    pub name: String,
    /// Committee size `k`.
    pub candidate_count: usize,
    /// Temperature per candidate index; the last entry repeats.
    pub temperatures: Vec<f64>,
    pub reflection_passes: u32,
    pub retrieval_top_k: usize,
    pub web_enabled: bool,
    pub coach_enabled: bool,
    pub proof_gate_enabled: bool,
    /// Advisory only; nothing enforces it at this layer.
    pub latency_budget_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_citations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_minimum: Option<f64>,
    pub triangulation_required: bool,
}

impl GearProfile {
    /// Temperature for the candidate at `index` (0-based).
    pub fn temperature_for(&self, index: usize) -> f64 {
        match self.temperatures.len() {
            0 => 0.0,
            n => self.temperatures[index.min(n - 1)],
        }
    }

    /// Whether candidate scoring counts citations.
    pub fn evidence_required(&self) -> bool {
        self.proof_gate_enabled
    }

    pub fn effective_min_citations(&self) -> u32 {
        self.min_citations.unwrap_or(DEFAULT_MIN_CITATIONS)
    }

    pub fn effective_rubric_minimum(&self) -> f64 {
        self.rubric_minimum.unwrap_or(DEFAULT_RUBRIC_MINIMUM)
    }
}

/// Immutable table of gear profiles.
#[derive(Debug, Clone)]
pub struct GearRegistry {
    profiles: Vec<GearProfile>,
}

impl GearRegistry {
    /// The built-in turbo / mentor / proof table.
    pub fn builtin() -> &'static GearRegistry {
        static REGISTRY: OnceLock<GearRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| GearRegistry {
            profiles: vec![turbo(), mentor(), proof()],
        })
    }

    pub fn lookup(&self, mode: &str) -> Result<&GearProfile> {
        self.profiles
            .iter()
            .find(|p| p.name == mode)
            .ok_or_else(|| UpeError::UnknownMode(mode.to_string()))
    }

    pub fn profiles(&self) -> &[GearProfile] {
        &self.profiles
    }
}

/// Look up a built-in profile by mode name.
pub fn lookup(mode: &str) -> Result<&'static GearProfile> {
    GearRegistry::builtin().lookup(mode)
}

/// Single candidate, no evidence gate.
fn turbo() -> GearProfile {
    GearProfile {
        name: "turbo".to_string(),
        candidate_count: 1,
        temperatures: vec![0.3],
        reflection_passes: 0,
        retrieval_top_k: 6,
        web_enabled: false,
        coach_enabled: false,
        proof_gate_enabled: false,
        latency_budget_ms: 6_000,
        min_citations: None,
        rubric_minimum: None,
        triangulation_required: false,
    }
}

/// Small committee with coaching.
fn mentor() -> GearProfile {
    GearProfile {
        name: "mentor".to_string(),
        candidate_count: 3,
        temperatures: vec![0.2, 0.5],
        reflection_passes: 1,
        retrieval_top_k: 12,
        web_enabled: false,
        coach_enabled: true,
        proof_gate_enabled: false,
        latency_budget_ms: 8_000,
        min_citations: None,
        rubric_minimum: None,
        triangulation_required: false,
    }
}

/// Full committee, evidence gate and triangulation.
fn proof() -> GearProfile {
    GearProfile {
        name: "proof".to_string(),
        candidate_count: 9,
        temperatures: vec![0.1, 0.3, 0.7],
        reflection_passes: 3,
        retrieval_top_k: 32,
        web_enabled: true,
        coach_enabled: false,
        proof_gate_enabled: true,
        latency_budget_ms: 30_000,
        min_citations: Some(5),
        rubric_minimum: Some(0.80),
        triangulation_required: true,
    }
}
