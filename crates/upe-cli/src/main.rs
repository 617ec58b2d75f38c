//! UPE - Universal Prompt Engine CLI
//!
//! The `upe` command compiles a goal into validated document artifacts and
//! manages the stored runs.
//!
//! ## Commands
//!
//! - `compile`: Run the full pipeline and print the compile response
//! - `prompt`: Print the engineered prompt without calling the oracle
//! - `show`: Print a stored run manifest (JSON or Markdown summary)
//! - `ledger`: Print the judge ledger of a run
//! - `feedback`: Apply edit ops to a stored run and re-render it
//! - `suggest`: List follow-up suggestions for a run
//! - `runs`: List stored run ids
//! - `snapshot`: Snapshot a source directory, optionally diffed against a run
//! - `gears`: List the built-in gear profiles

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, Level};

use upe_core::gear::GearRegistry;
use upe_core::retrieval::{detect_drift, snapshot, SnapshotDrift};
use upe_core::{
    render_run_summary_md, write_run_summary_md, ArtifactKind, CommandOracle, CompileRequest,
    DirCorpus, Engine, EngineConfig, FeedbackRequest, HttpOracle, LogFormat, Oracle, OracleError,
    Quality, SnapshotEntry, SourceCorpus,
};
use upe_state::FsRunStore;

#[derive(Parser)]
#[command(name = "upe")]
#[command(author = "UPE Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Universal Prompt Engine: compile goals into validated artifacts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Run storage directory (default: .upe/runs)
    #[arg(long, global = true, env = "UPE_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(flatten)]
    oracle: OracleArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Where candidate outputs come from. `--oracle-url` wins when both are set.
#[derive(Args, Debug, Clone, Default)]
struct OracleArgs {
    /// HTTP generation endpoint
    #[arg(long, global = true, env = "UPE_ORACLE_URL")]
    oracle_url: Option<String>,

    /// Command that reads the prompt on stdin and prints JSON on stdout
    #[arg(long, global = true, env = "UPE_ORACLE_CMD")]
    oracle_cmd: Option<String>,

    /// Bearer token for the HTTP endpoint
    #[arg(long, global = true, env = "UPE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model identifier recorded in prompts and manifests
    #[arg(long, global = true, env = "UPE_MODEL")]
    model: Option<String>,

    /// HTTP oracle timeout in seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout_secs: u64,
}

/// Fields of a compile request.
#[derive(Args, Debug, Clone)]
struct RequestArgs {
    /// Natural-language goal
    #[arg(short, long)]
    goal: String,

    /// Gear profile: turbo, mentor or proof
    #[arg(short, long, default_value = "turbo")]
    mode: String,

    /// Primary artifact kind
    #[arg(short, long, default_value = "html")]
    primary: ArtifactKind,

    /// Additional artifact kinds (repeatable)
    #[arg(long = "secondary")]
    secondaries: Vec<ArtifactKind>,

    /// Fixed base seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Quality hint: fast, balanced or t_inf
    #[arg(long)]
    quality: Option<Quality>,

    /// Turn YAFA off for this request
    #[arg(long)]
    no_yafa: bool,

    /// Template slot as key=value (repeatable)
    #[arg(long = "slot", value_parser = parse_slot)]
    slots: Vec<(String, String)>,

    /// Directory of .md/.txt sources for the retrieval snapshot
    #[arg(long)]
    sources: Option<PathBuf>,
}

impl RequestArgs {
    fn to_request(&self) -> CompileRequest {
        let mut request = CompileRequest::new(&self.goal, &self.mode, self.primary)
            .with_secondaries(self.secondaries.iter().copied());
        if let Some(seed) = self.seed {
            request = request.with_seed(seed);
        }
        if let Some(quality) = self.quality {
            request = request.with_quality(quality);
        }
        request.yafa_on = !self.no_yafa;
        for (key, value) in &self.slots {
            request = request.with_slot(key, value);
        }
        request
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a goal into artifacts
    Compile {
        #[command(flatten)]
        request: RequestArgs,

        /// Run this compile refines
        #[arg(long)]
        parent: Option<String>,
    },

    /// Print the engineered prompt a compile would send
    Prompt {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Show a stored run
    Show {
        /// Run ID
        run: String,

        /// Render a Markdown summary instead of the raw manifest
        #[arg(long)]
        markdown: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the judge ledger of a run
    Ledger {
        /// Run ID
        run: String,
    },

    /// Apply edit ops to a stored run
    Feedback {
        /// Run ID
        run: String,

        /// JSON op or array of ops, or @path to a file containing them
        #[arg(long)]
        ops: String,
    },

    /// List follow-up suggestions for a run
    Suggest {
        /// Run ID
        run: String,
    },

    /// List stored runs
    Runs,

    /// Snapshot a source directory
    Snapshot {
        /// Directory of .md/.txt sources
        #[arg(long)]
        sources: PathBuf,

        /// Maximum number of entries
        #[arg(long, default_value_t = 32)]
        top_k: usize,

        /// Report drift against the snapshot stored with this run
        #[arg(long)]
        against: Option<String>,
    },

    /// List gear profiles
    Gears,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::from_env()
    };
    upe_core::init_tracing(format, level);

    let storage_dir = cli.storage_dir.as_deref();

    match cli.command {
        Commands::Compile { request, parent } => {
            let oracle = build_oracle(&cli.oracle)?
                .context("No oracle configured: pass --oracle-url or --oracle-cmd")?;
            let engine = build_engine(storage_dir, &cli.oracle, oracle, request.sources.as_deref())?;
            let mut req = request.to_request();
            if let Some(parent) = parent {
                req = req.with_parent(parent);
            }
            cmd_compile(&engine, req).await
        }
        Commands::Prompt { request } => {
            let engine = offline_engine(storage_dir, &cli.oracle, request.sources.as_deref())?;
            cmd_prompt(&engine, &request.to_request()).await
        }
        Commands::Show {
            run,
            markdown,
            output,
        } => {
            let engine = offline_engine(storage_dir, &cli.oracle, None)?;
            cmd_show(&engine, &run, markdown, output.as_deref()).await
        }
        Commands::Ledger { run } => {
            let engine = offline_engine(storage_dir, &cli.oracle, None)?;
            cmd_ledger(&engine, &run).await
        }
        Commands::Feedback { run, ops } => {
            let engine = offline_engine(storage_dir, &cli.oracle, None)?;
            cmd_feedback(&engine, &run, &ops).await
        }
        Commands::Suggest { run } => {
            let engine = offline_engine(storage_dir, &cli.oracle, None)?;
            cmd_suggest(&engine, &run).await
        }
        Commands::Runs => {
            let engine = offline_engine(storage_dir, &cli.oracle, None)?;
            cmd_runs(&engine).await
        }
        Commands::Snapshot {
            sources,
            top_k,
            against,
        } => {
            let engine = match against {
                Some(_) => Some(offline_engine(storage_dir, &cli.oracle, None)?),
                None => None,
            };
            cmd_snapshot(&sources, top_k, engine.as_ref().zip(against.as_deref())).await
        }
        Commands::Gears => cmd_gears(),
    }
}

// ---------------------------------------------------------------------------
// Engine wiring
// ---------------------------------------------------------------------------

/// Stand-in for commands that never call the oracle.
struct NoOracle;

#[async_trait]
impl Oracle for NoOracle {
    async fn generate(
        &self,
        _prompt: &str,
        _seed: u64,
        _temperature: f64,
    ) -> std::result::Result<Value, OracleError> {
        Err(OracleError::Transport("no oracle configured".to_string()))
    }
}

fn engine_config(storage_dir: Option<&Path>, oracle: &OracleArgs) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(model) = &oracle.model {
        config = config.with_model(model);
    }
    if let Some(dir) = storage_dir {
        config = config.with_storage_dir(dir);
    }
    config
}

fn build_oracle(args: &OracleArgs) -> Result<Option<Arc<dyn Oracle>>> {
    let model = engine_config(None, args).model;
    if let Some(url) = &args.oracle_url {
        let mut oracle = HttpOracle::new(url, &model)
            .with_timeout(Duration::from_secs(args.timeout_secs))
            .context("Failed to build HTTP oracle")?;
        if let Some(key) = &args.api_key {
            oracle = oracle.with_api_key(key);
        }
        return Ok(Some(Arc::new(oracle)));
    }
    if let Some(line) = &args.oracle_cmd {
        let oracle = CommandOracle::from_command_line(line, &model)
            .with_context(|| format!("Invalid oracle command: {:?}", line))?;
        return Ok(Some(Arc::new(oracle)));
    }
    Ok(None)
}

fn build_engine(
    storage_dir: Option<&Path>,
    args: &OracleArgs,
    oracle: Arc<dyn Oracle>,
    sources: Option<&Path>,
) -> Result<Engine> {
    let config = engine_config(storage_dir, args);
    let store = FsRunStore::new(&config.storage_dir)
        .with_context(|| format!("Failed to open run storage at {:?}", config.storage_dir))?;
    let mut engine = Engine::new(config, oracle, Arc::new(store));
    if let Some(dir) = sources {
        engine = engine.with_corpus(Arc::new(DirCorpus::new(dir)));
    }
    Ok(engine)
}

fn offline_engine(storage_dir: Option<&Path>, args: &OracleArgs, sources: Option<&Path>) -> Result<Engine> {
    build_engine(storage_dir, args, Arc::new(NoOracle), sources)
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

/// `key=value`; the value may itself contain `=`.
fn parse_slot(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid slot {raw:?}: expected key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid slot {raw:?}: empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Inline JSON or `@path`; a single op object is accepted as a one-op list.
fn parse_ops_arg(raw: &str) -> Result<Vec<Value>> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ops file: {:?}", path))?,
        None => raw.to_string(),
    };
    let value: Value = serde_json::from_str(&text).context("Ops are not valid JSON")?;
    match value {
        Value::Array(ops) => Ok(ops),
        op @ Value::Object(_) => Ok(vec![op]),
        other => anyhow::bail!("Ops must be a JSON object or array, got {}", other),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Compile and print the response
async fn cmd_compile(engine: &Engine, request: CompileRequest) -> Result<()> {
    let response = engine.compile(request).await.context("Compile failed")?;
    info!(run_id = %response.manifest_id, status = %response.status, "compile finished");
    print_json(&response)
}

/// Print the engineered prompt
async fn cmd_prompt(engine: &Engine, request: &CompileRequest) -> Result<()> {
    let bom = engine.preview_prompt(request).await?;
    println!("{}", bom);
    Ok(())
}

/// Print a stored run
async fn cmd_show(engine: &Engine, run_id: &str, markdown: bool, output: Option<&Path>) -> Result<()> {
    let manifest = engine.get_run(run_id).await?;
    match (markdown, output) {
        (true, Some(path)) => {
            write_run_summary_md(path, &manifest)?;
            println!("Wrote summary of run {} to {:?}", run_id, path);
        }
        (true, None) => print!("{}", render_run_summary_md(&manifest)),
        (false, Some(path)) => {
            let content = serde_json::to_string_pretty(&manifest)?;
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write manifest to {:?}", path))?;
            println!("Wrote manifest of run {} to {:?}", run_id, path);
        }
        (false, None) => print_json(&manifest)?,
    }
    Ok(())
}

/// Print the judge ledger
async fn cmd_ledger(engine: &Engine, run_id: &str) -> Result<()> {
    let ledger = engine.get_ledger(run_id).await?;
    print_json(&ledger)
}

/// Apply edit ops and print the feedback response
async fn cmd_feedback(engine: &Engine, run_id: &str, ops: &str) -> Result<()> {
    let ops = parse_ops_arg(ops)?;
    let response = engine
        .feedback(run_id, FeedbackRequest::new(ops))
        .await
        .with_context(|| format!("Feedback on run {} failed", run_id))?;
    print_json(&response)
}

/// Print follow-up suggestions
async fn cmd_suggest(engine: &Engine, run_id: &str) -> Result<()> {
    let followups = engine.suggestions(run_id).await?;
    print_json(&followups)
}

/// List run ids, one per line
async fn cmd_runs(engine: &Engine) -> Result<()> {
    let runs = engine.list_runs().await?;
    if runs.is_empty() {
        println!("No runs found.");
        return Ok(());
    }
    for run in runs {
        println!("{}", run);
    }
    Ok(())
}

#[derive(Serialize)]
struct SnapshotReport {
    snapshot: Vec<SnapshotEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    drift: Option<Vec<SnapshotDrift>>,
}

async fn snapshot_report(
    sources: &Path,
    top_k: usize,
    against: Option<(&Engine, &str)>,
) -> Result<SnapshotReport> {
    let docs = DirCorpus::new(sources)
        .load()
        .await
        .with_context(|| format!("Failed to load sources from {:?}", sources))?;
    let current = snapshot(&docs, top_k);
    let drift = match against {
        Some((engine, run_id)) => {
            let manifest = engine.get_run(run_id).await?;
            Some(detect_drift(&manifest.retrieval.snapshot, &current))
        }
        None => None,
    };
    Ok(SnapshotReport {
        snapshot: current,
        drift,
    })
}

/// Print a source snapshot, with drift against a stored run when requested
async fn cmd_snapshot(sources: &Path, top_k: usize, against: Option<(&Engine, &str)>) -> Result<()> {
    let report = snapshot_report(sources, top_k, against).await?;
    print_json(&report)
}

/// Print the gear table
fn cmd_gears() -> Result<()> {
    print_json(&GearRegistry::builtin().profiles())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;
    use upe_core::{RunStatus, ScriptedOracle};

    fn output() -> Value {
        json!({
            "title": "CLI Run",
            "sections": [
                { "heading": "Executive Summary", "blocks": [{ "kind": "para", "text": "one two three four" }] },
                { "heading": "Next Steps", "blocks": [{ "kind": "list", "items": ["hire", "ship"] }] }
            ]
        })
    }

    fn test_engine(dir: &Path, sources: Option<&Path>) -> Engine {
        build_engine(
            Some(dir),
            &OracleArgs::default(),
            Arc::new(ScriptedOracle::constant(output())),
            sources,
        )
        .unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compile_args_parse_into_request() {
        let cli = Cli::try_parse_from([
            "upe", "compile", "--goal", "Board deck", "--mode", "mentor", "--primary", "pdf",
            "--secondary", "html", "--seed", "7", "--slot", "audience=board", "--parent", "run-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Compile { request, parent } => {
                let req = request.to_request();
                assert_eq!(req.mode, "mentor");
                assert_eq!(req.artifact.primary, ArtifactKind::Pdf);
                assert_eq!(req.artifact.secondaries, vec![ArtifactKind::Html]);
                assert_eq!(req.seed, Some(7));
                assert_eq!(req.slots.get("audience").map(String::as_str), Some("board"));
                assert_eq!(parent.as_deref(), Some("run-1"));
                assert!(req.yafa_on);
                assert_eq!(req.quality, None);
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn quality_and_yafa_flags_reach_the_request() {
        let cli = Cli::try_parse_from([
            "upe", "prompt", "--goal", "g", "--quality", "t_inf", "--no-yafa",
        ])
        .unwrap();
        match cli.command {
            Commands::Prompt { request } => {
                let req = request.to_request();
                assert_eq!(req.quality, Some(Quality::TInf));
                assert!(!req.yafa_on);
            }
            _ => panic!("expected prompt"),
        }
        assert!(Cli::try_parse_from(["upe", "prompt", "--goal", "g", "--quality", "max"]).is_err());
    }

    #[test]
    fn unknown_artifact_kind_is_rejected() {
        let err = Cli::try_parse_from(["upe", "compile", "--goal", "g", "--primary", "odt"]);
        assert!(err.is_err());
    }

    #[test]
    fn slot_parsing() {
        assert_eq!(
            parse_slot("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_slot("novalue").is_err());
        assert!(parse_slot("=x").is_err());
    }

    #[test]
    fn ops_accept_object_array_and_file() {
        assert_eq!(parse_ops_arg(r#"{"op":"focus","topic":"x"}"#).unwrap().len(), 1);
        assert_eq!(
            parse_ops_arg(r#"[{"op":"remove","target":"a"},{"op":"bogus"}]"#)
                .unwrap()
                .len(),
            2
        );
        assert!(parse_ops_arg("42").is_err());
        assert!(parse_ops_arg("not json").is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.json");
        std::fs::write(&path, r#"[{"op":"limit","section":"Intro","max_words":"5"}]"#).unwrap();
        let ops = parse_ops_arg(&format!("@{}", path.display())).unwrap();
        assert_eq!(ops[0]["max_words"], "5");
    }

    #[test]
    fn no_oracle_flags_means_no_oracle() {
        assert!(build_oracle(&OracleArgs::default()).unwrap().is_none());
        let args = OracleArgs {
            oracle_cmd: Some("cat".to_string()),
            ..OracleArgs::default()
        };
        assert!(build_oracle(&args).unwrap().is_some());
    }

    #[tokio::test]
    async fn compile_then_show_feedback_and_suggest() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), None);

        let request = CompileRequest::new("CLI goal", "turbo", ArtifactKind::Html).with_seed(4);
        cmd_compile(&engine, request).await.unwrap();

        let runs = engine.list_runs().await.unwrap();
        assert_eq!(runs.len(), 1);
        let run_id = runs[0].to_string();

        let summary = dir.path().join("summary.md");
        cmd_show(&engine, &run_id, true, Some(&summary)).await.unwrap();
        assert!(std::fs::read_to_string(&summary).unwrap().contains("# Run "));

        cmd_feedback(&engine, &run_id, r#"{"op":"remove","target":"next steps"}"#)
            .await
            .unwrap();
        let manifest = engine.get_run(&run_id).await.unwrap();
        assert_eq!(manifest.status, RunStatus::Ok);
        assert_eq!(manifest.document.unwrap().sections.len(), 1);

        cmd_suggest(&engine, &run_id).await.unwrap();
        cmd_ledger(&engine, &run_id).await.unwrap();
        cmd_runs(&engine).await.unwrap();
    }

    #[tokio::test]
    async fn show_unknown_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), None);
        assert!(cmd_show(&engine, "run-missing", false, None).await.is_err());
    }

    #[tokio::test]
    async fn snapshot_reports_drift_against_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources");
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(sources.join("alpha.md"), "# Alpha\nfirst").unwrap();
        std::fs::write(sources.join("beta.txt"), "beta body").unwrap();

        let engine = test_engine(&dir.path().join("runs"), Some(&sources));
        engine
            .compile(CompileRequest::new("g", "turbo", ArtifactKind::Html))
            .await
            .unwrap();
        let run_id = engine.list_runs().await.unwrap()[0].to_string();

        std::fs::write(sources.join("alpha.md"), "# Alpha\nrevised").unwrap();
        std::fs::remove_file(sources.join("beta.txt")).unwrap();
        std::fs::write(sources.join("gamma.md"), "new").unwrap();

        let report = snapshot_report(&sources, 32, Some((&engine, run_id.as_str())))
            .await
            .unwrap();
        let changes: Vec<Value> = report
            .drift
            .unwrap()
            .iter()
            .map(|d| serde_json::to_value(d).unwrap())
            .collect();
        let kinds: Vec<(&str, &str)> = changes
            .iter()
            .map(|c| (c["id"].as_str().unwrap(), c["change"].as_str().unwrap()))
            .collect();
        assert_eq!(
            kinds,
            vec![("alpha", "changed"), ("beta", "removed"), ("gamma", "added")]
        );
    }

    #[test]
    fn gears_print() {
        cmd_gears().unwrap();
    }
}
