//! The compile pipeline.
//!
//! ```text
//! gear lookup -> retrieval snapshot -> prompt BOM -> committee (concurrent)
//!   -> judge -> evidence gate (gated gears) -> normalize -> render + validate
//!   -> format gate -> ledger + manifest -> follow-ups -> response
//! ```
//!
//! Errors raised before a run id exists (bad request, unknown mode) return
//! without touching storage. Any failure afterwards still persists a
//! `TOOL_ERROR` manifest carrying whatever the run produced so far.

use std::sync::Arc;
use std::time::Instant;

use tracing::{field, info, instrument, warn, Span};
use upe_state::{RunId, RunStore, StorageError};

use crate::committee::{judge, run_committee, Judgement};
use crate::config::EngineConfig;
use crate::domain::digest::text_digest;
use crate::domain::document::Document;
use crate::domain::error::{Result, UpeError};
use crate::domain::manifest::{
    create_manifest, load_manifest, parse_run_id, replace_manifest, ArtifactKind, ArtifactMeta,
    EngineRecord, JudgeRecord, ManifestDraft, RetrievalRecord, RunError, RunManifest, RunStatus,
    LEDGER_FILE,
};
use crate::domain::request::{
    Bundle, CompileRequest, CompileResponse, FeedbackRequest, FeedbackResponse, ProofSummary,
    PROTOCOL_VERSION,
};
use crate::edit::{apply_edits, parse_ops, touched_tags};
use crate::followups::{followups_for, Followup};
use crate::gate::{evidence_gate, format_gate, EvidenceInput, EvidencePolicy, MISSING_PRIMARY_ARTIFACT};
use crate::gear::{GearProfile, GearRegistry};
use crate::ledger::Ledger;
use crate::normalize::normalize;
use crate::obs;
use crate::oracle::Oracle;
use crate::prompt::{compile_prompt, output_schema_text, PromptInputs, DEFAULT_RUBRIC, FAILURE_JSON};
use crate::render::RenderRegistry;
use crate::retrieval::{context_lines, snapshot, SnapshotEntry, SourceCorpus, SourceDoc, StaticCorpus};

/// Judge note of a run that passed every gate.
pub const WINNER_NOTE: &str = "winner by evidence";

/// Upper bound (inclusive) of generated seeds.
const SEED_SPACE: u128 = 1_000_000_000;

/// Seed used when the request does not pin one: in `1..=1_000_000_000`.
pub fn generate_seed() -> u64 {
    (uuid::Uuid::new_v4().as_u128() % SEED_SPACE) as u64 + 1
}

/// How a compile ended, before the manifest is sealed.
struct Outcome {
    status: RunStatus,
    response: CompileResponse,
    ledger: Option<Ledger>,
}

/// Compile engine. Holds only shared, immutable collaborators, so one engine
/// can serve concurrent compiles from many tasks.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    gears: &'static GearRegistry,
    oracle: Arc<dyn Oracle>,
    store: Arc<dyn RunStore>,
    corpus: Arc<dyn SourceCorpus>,
    renderers: RenderRegistry,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("renderers", &self.renderers)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine with the built-in gears and renderers and an empty corpus.
    pub fn new(config: EngineConfig, oracle: Arc<dyn Oracle>, store: Arc<dyn RunStore>) -> Self {
        Self {
            config,
            gears: GearRegistry::builtin(),
            oracle,
            store,
            corpus: Arc::new(StaticCorpus::empty()),
            renderers: RenderRegistry::builtin(),
        }
    }

    pub fn with_corpus(mut self, corpus: Arc<dyn SourceCorpus>) -> Self {
        self.corpus = corpus;
        self
    }

    pub fn with_renderers(mut self, renderers: RenderRegistry) -> Self {
        self.renderers = renderers;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Compile
    // -----------------------------------------------------------------------

    /// Run the full pipeline for one request.
    ///
    /// Evidence-gate misses and refusals reported by the winning candidate
    /// are `Ok` responses with a non-`OK` status; everything that yields
    /// `Err` after a run id was allocated leaves a `TOOL_ERROR` manifest.
    #[instrument(skip(self, request), fields(mode = %request.mode, run_id = field::Empty))]
    pub async fn compile(&self, request: CompileRequest) -> Result<CompileResponse> {
        request.validate()?;
        let profile = self.gears.lookup(&request.mode)?;

        let started = Instant::now();
        let run_id = RunId::new();
        Span::current().record("run_id", field::display(&run_id));
        let seed = request.seed.unwrap_or_else(generate_seed);
        obs::emit_compile_started(run_id.as_str(), &profile.name, request.artifact.primary, seed);

        let mut draft = ManifestDraft::new(run_id.clone(), request);
        let result = self.execute(&mut draft, profile, seed).await;
        draft.timings.total_ms = elapsed_ms(started);

        match result {
            Ok(outcome) => {
                let manifest = draft.seal(outcome.status, None);
                create_manifest(self.store.as_ref(), &manifest).await?;
                if let Some(ledger) = &outcome.ledger {
                    let value = serde_json::to_value(ledger)?;
                    self.store.create_json(&run_id, LEDGER_FILE, &value).await?;
                }
                obs::emit_run_finished(run_id.as_str(), outcome.status, started.elapsed().as_millis() as u64);
                Ok(outcome.response)
            }
            Err(err) => {
                let manifest = draft.seal(err.status(), Some(RunError::from(&err)));
                if let Err(persist_err) = create_manifest(self.store.as_ref(), &manifest).await {
                    obs::emit_run_persist_error(run_id.as_str(), &persist_err);
                }
                obs::emit_run_finished(run_id.as_str(), err.status(), started.elapsed().as_millis() as u64);
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        draft: &mut ManifestDraft,
        profile: &GearProfile,
        seed: u64,
    ) -> Result<Outcome> {
        let run_id = draft.id.clone();

        // Retrieval
        let sources = self.load_sources().await;
        let snap = snapshot(&sources, profile.retrieval_top_k);
        draft.retrieval = RetrievalRecord {
            top_k: profile.retrieval_top_k,
            snapshot: snap.clone(),
        };

        // Prompt
        let context = prompt_context(&snap, &draft.request);
        let bom = compile_prompt(&self.prompt_inputs(run_id.as_str(), &draft.request, profile, seed, context));
        draft.engine = Some(EngineRecord {
            gear: profile.name.clone(),
            model: self.config.model.clone(),
            cartridge: self.config.cartridge_version.clone(),
            seed,
            candidate_count: profile.candidate_count,
            temperatures: profile.temperatures.clone(),
            prompt_digest: text_digest(&bom),
        });

        // Committee
        let committee_started = Instant::now();
        let committee = run_committee(
            Arc::clone(&self.oracle),
            Arc::from(bom.as_str()),
            profile,
            seed,
            profile.evidence_required(),
        )
        .await;
        draft.timings.committee_ms = elapsed_ms(committee_started);
        draft.committee = committee.records();
        for c in &committee.candidates {
            obs::emit_candidate_scored(run_id.as_str(), &c.id, c.score, c.is_failed());
        }

        if committee.all_failed() {
            return Err(UpeError::CommitteeFailed {
                count: committee.len(),
            });
        }
        let judgement = judge(&committee, profile.triangulation_required)
            .ok_or(UpeError::CommitteeFailed { count: 0 })?;
        let winner = &committee.candidates[judgement.winner_index];
        let ledger = Ledger::from_judgement(&judgement, &snap);
        let run_instructions = format!(
            "Model {}; t={}; seed={}",
            self.config.model,
            profile.temperature_for(0),
            seed
        );

        // Refusal reported by the winner itself
        if let Some(status) = winner.reported_status() {
            let note = format!("winner reported {status}");
            info!(candidate = %winner.id, %status, "winning candidate refused");
            draft.judge = Some(judge_record(&judgement, note.clone()));
            return Ok(Outcome {
                status,
                response: self.response(&run_id, seed, bom, run_instructions, Vec::new(), proof(&judgement, &snap, note), status),
                ledger: Some(ledger),
            });
        }

        // Evidence gate
        if profile.proof_gate_enabled {
            let verdict = evidence_gate(
                &EvidencePolicy::for_profile(profile),
                &EvidenceInput {
                    score: judgement.score,
                    citation_count: winner.citation_count,
                    triangulated: judgement.triangulated,
                },
            );
            obs::emit_gate_evaluated(run_id.as_str(), "evidence", verdict.passed, verdict.reason.as_str());
            if !verdict.passed {
                let note = verdict.reason.as_str().to_string();
                draft.judge = Some(judge_record(&judgement, note.clone()));
                let status = RunStatus::InsufficientContext;
                return Ok(Outcome {
                    status,
                    response: self.response(&run_id, seed, bom, run_instructions, Vec::new(), proof(&judgement, &snap, note), status),
                    ledger: Some(ledger),
                });
            }
        }
        draft.judge = Some(judge_record(&judgement, WINNER_NOTE.to_string()));

        // Normalize
        let doc = normalize(&winner.raw_output)?;
        draft.document = Some(doc.clone());

        // Render
        let render_started = Instant::now();
        let primary = draft.request.artifact.primary;
        let mut produced = Vec::new();
        let kinds = std::iter::once(primary).chain(draft.request.artifact.secondary_kinds());
        for kind in kinds {
            if self.renderers.renderer(kind).is_none() {
                warn!(%kind, "no renderer registered, skipping artifact");
                continue;
            }
            let meta = self.render_artifact(&run_id, kind, &doc, kind == primary).await?;
            produced.push(kind);
            draft.artifacts.push(meta);
        }
        draft.timings.render_ms = elapsed_ms(render_started);

        // Format gate
        let verdict = format_gate(primary, &produced);
        obs::emit_gate_evaluated(run_id.as_str(), "format", verdict.passed, verdict.reason);
        if !verdict.passed {
            return Err(UpeError::FormatGate {
                reason: verdict.reason.to_string(),
            });
        }

        let followups = followups_for(&draft.request.goal, &draft.request.mode, run_id.as_str());
        Ok(Outcome {
            status: RunStatus::Ok,
            response: self.response(
                &run_id,
                seed,
                bom,
                run_instructions,
                followups,
                proof(&judgement, &snap, WINNER_NOTE.to_string()),
                RunStatus::Ok,
            ),
            ledger: Some(ledger),
        })
    }

    /// Corpus failures degrade to an empty source set.
    async fn load_sources(&self) -> Vec<SourceDoc> {
        match self.corpus.load().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "source corpus unavailable, continuing without sources");
                Vec::new()
            }
        }
    }

    fn prompt_inputs(
        &self,
        run_id: &str,
        request: &CompileRequest,
        profile: &GearProfile,
        seed: u64,
        context: String,
    ) -> PromptInputs {
        PromptInputs {
            run_id: run_id.to_string(),
            cartridge_version: self.config.cartridge_version.clone(),
            seed,
            model: self.config.model.clone(),
            temperature: profile.temperature_for(0),
            role: self.config.role.clone(),
            goal: request.goal.clone(),
            context,
            style: self.config.style.clone(),
            banlist: self.config.banlist.clone(),
            tools: self.config.tools.clone(),
            rubric: DEFAULT_RUBRIC.to_string(),
            output_schema: output_schema_text(),
            failure_schema: FAILURE_JSON.to_string(),
        }
    }

    /// Render, validate and store one artifact.
    async fn render_artifact(
        &self,
        run_id: &RunId,
        kind: ArtifactKind,
        doc: &Document,
        is_primary: bool,
    ) -> Result<ArtifactMeta> {
        let renderer = self.renderers.renderer(kind).ok_or_else(|| UpeError::Render {
            kind: kind.to_string(),
            message: "no renderer registered".to_string(),
        })?;
        let bytes = renderer.render(doc).map_err(|e| UpeError::Render {
            kind: kind.to_string(),
            message: e.to_string(),
        })?;

        if let Some(validator) = self.renderers.validator(kind) {
            let outcome = validator.validate(&bytes);
            if !outcome.passed {
                return Err(UpeError::ArtifactInvalid {
                    kind: kind.to_string(),
                    reason: outcome.reason,
                });
            }
        }

        let stored = self.store.write_bytes(run_id, &kind.file_name(), &bytes).await?;
        obs::emit_artifact_rendered(run_id.as_str(), kind, stored.byte_size, is_primary);
        Ok(ArtifactMeta::from_stored(kind, stored, is_primary))
    }

    #[allow(clippy::too_many_arguments)]
    fn response(
        &self,
        run_id: &RunId,
        seed: u64,
        engineered_prompt: String,
        run_instructions: String,
        followups: Vec<Followup>,
        proof: ProofSummary,
        status: RunStatus,
    ) -> CompileResponse {
        CompileResponse {
            v: PROTOCOL_VERSION.to_string(),
            bundle: Bundle {
                engineered_prompt,
                run_instructions,
                followups,
            },
            manifest_id: run_id.to_string(),
            seed,
            model: self.config.model.clone(),
            cartridge: self.config.cartridge_version.clone(),
            proof: Some(proof),
            status,
        }
    }

    /// Compile the prompt BOM a request would send, without calling the oracle.
    pub async fn preview_prompt(&self, request: &CompileRequest) -> Result<String> {
        request.validate()?;
        let profile = self.gears.lookup(&request.mode)?;
        let seed = request.seed.unwrap_or_else(generate_seed);
        let sources = self.load_sources().await;
        let snap = snapshot(&sources, profile.retrieval_top_k);
        let context = prompt_context(&snap, request);
        Ok(compile_prompt(&self.prompt_inputs("preview", request, profile, seed, context)))
    }

    // -----------------------------------------------------------------------
    // Stored runs
    // -----------------------------------------------------------------------

    /// Apply edit ops to a stored run, re-render its primary artifact and
    /// replace the manifest's document.
    ///
    /// Not serialized against concurrent feedback on the same run: the last
    /// writer wins.
    #[instrument(skip(self, request), fields(run_id = field::Empty, ops = request.ops.len()))]
    pub async fn feedback(&self, run_id: &str, request: FeedbackRequest) -> Result<FeedbackResponse> {
        let id = parse_run_id(run_id)?;
        Span::current().record("run_id", field::display(&id));

        let mut manifest = load_manifest(self.store.as_ref(), &id).await?;
        let doc = manifest
            .document
            .clone()
            .ok_or_else(|| UpeError::NoDocument(run_id.to_string()))?;

        let ops = parse_ops(&request.ops);
        let edited = apply_edits(&doc, &ops);

        let primary = manifest.request.artifact.primary;
        if self.renderers.renderer(primary).is_none() {
            return Err(UpeError::FormatGate {
                reason: MISSING_PRIMARY_ARTIFACT.to_string(),
            });
        }
        let artifact = self.render_artifact(&id, primary, &edited, true).await?;

        manifest.document = Some(edited);
        replace_manifest(self.store.as_ref(), &manifest).await?;
        obs::emit_feedback_applied(id.as_str(), ops.len());

        Ok(FeedbackResponse {
            status: RunStatus::Ok,
            touched: touched_tags(&ops),
            artifact,
        })
    }

    pub async fn get_run(&self, run_id: &str) -> Result<RunManifest> {
        let id = parse_run_id(run_id)?;
        load_manifest(self.store.as_ref(), &id).await
    }

    /// Stored judge ledger of a run that reached judging.
    pub async fn get_ledger(&self, run_id: &str) -> Result<Ledger> {
        let id = parse_run_id(run_id)?;
        match self.store.read_json(&id, LEDGER_FILE).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(StorageError::NotFound { .. }) => Err(UpeError::RunNotFound(run_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Follow-up suggestions for a stored run.
    pub async fn suggestions(&self, run_id: &str) -> Result<Vec<Followup>> {
        let manifest = self.get_run(run_id).await?;
        Ok(followups_for(
            &manifest.request.goal,
            &manifest.request.mode,
            manifest.id.as_str(),
        ))
    }

    pub async fn list_runs(&self) -> Result<Vec<RunId>> {
        Ok(self.store.list_runs().await?)
    }
}

/// Snapshot lines, then request slots as `key: value` lines.
fn prompt_context(snap: &[SnapshotEntry], request: &CompileRequest) -> String {
    let mut context = context_lines(snap);
    if !request.slots.is_empty() {
        context.push_str("\nSlots:");
        for (key, value) in &request.slots {
            context.push_str(&format!("\n{key}: {value}"));
        }
    }
    context
}

fn judge_record(judgement: &Judgement, note: String) -> JudgeRecord {
    JudgeRecord {
        winner_id: judgement.winner_id.clone(),
        score: judgement.score,
        triangulated: judgement.triangulated,
        note,
    }
}

fn proof(judgement: &Judgement, snap: &[SnapshotEntry], judge_note: String) -> ProofSummary {
    ProofSummary {
        rubric_score: judgement.score,
        sources: snap.to_vec(),
        judge_note,
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
