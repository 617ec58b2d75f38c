//! Markdown run summaries.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::manifest::RunManifest;

/// Render a human-readable summary of a stored run.
pub fn render_run_summary_md(manifest: &RunManifest) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Run {}\n\n", manifest.id));
    out.push_str(&format!(
        "- status: **{}**\n- created: {}\n- goal: {}\n- mode: {}\n- primary: {}\n",
        manifest.status,
        manifest.created_at.to_rfc3339(),
        manifest.request.goal,
        manifest.request.mode,
        manifest.request.artifact.primary,
    ));
    if let Some(parent) = &manifest.parent_id {
        out.push_str(&format!("- parent: {parent}\n"));
    }
    out.push('\n');

    if let Some(engine) = &manifest.engine {
        out.push_str("## Engine\n");
        out.push_str(&format!(
            "- gear: {}\n- model: {}\n- cartridge: {}\n- seed: {}\n- prompt digest: `{}`\n\n",
            engine.gear,
            engine.model,
            engine.cartridge,
            engine.seed,
            engine.prompt_digest.short(),
        ));
    }

    if !manifest.committee.is_empty() {
        out.push_str("## Committee\n");
        out.push_str("| candidate | seed | temp | score | sections | citations | note |\n");
        out.push_str("|---|---|---|---|---|---|---|\n");
        let winner = manifest.judge.as_ref().map(|j| j.winner_id.as_str());
        for c in &manifest.committee {
            let note = match (&c.failure, Some(c.id.as_str()) == winner) {
                (Some(failure), _) => format!("failed: {failure}"),
                (None, true) => "winner".to_string(),
                (None, false) => String::new(),
            };
            out.push_str(&format!(
                "| {} | {} | {} | {:.2} | {} | {} | {} |\n",
                c.id, c.seed, c.temperature, c.score, c.section_count, c.citation_count, note
            ));
        }
        out.push('\n');
    }

    if let Some(judge) = &manifest.judge {
        out.push_str("## Judge\n");
        out.push_str(&format!(
            "- winner: {}\n- score: {:.2}\n- triangulated: {}\n- note: {}\n\n",
            judge.winner_id, judge.score, judge.triangulated, judge.note
        ));
    }

    if !manifest.retrieval.snapshot.is_empty() {
        out.push_str(&format!(
            "## Sources ({} of top {})\n",
            manifest.retrieval.snapshot.len(),
            manifest.retrieval.top_k
        ));
        for s in &manifest.retrieval.snapshot {
            out.push_str(&format!("- `{}` {} ({})\n", s.id, s.title, s.content_hash.short()));
        }
        out.push('\n');
    }

    if !manifest.artifacts.is_empty() {
        out.push_str("## Artifacts\n");
        for a in &manifest.artifacts {
            let marker = if a.is_primary { " (primary)" } else { "" };
            out.push_str(&format!(
                "- {}{}: `{}` {} bytes, sha256 `{}`\n",
                a.kind,
                marker,
                a.path,
                a.byte_size,
                a.content_hash.short()
            ));
        }
        out.push('\n');
    }

    if let Some(error) = &manifest.error {
        out.push_str("## Error\n");
        out.push_str(&format!("- code: `{}`\n- message: {}\n", error.code, error.message));
    }

    out
}

/// Write the summary to `path`.
pub fn write_run_summary_md(path: &Path, manifest: &RunManifest) -> Result<()> {
    let content = render_run_summary_md(manifest);
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
