//! Subprocess oracle: runs a local command per candidate.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

use super::{parse_output, Oracle, OracleError};

/// Pipes the prompt on stdin and parses stdout as the candidate JSON.
///
/// The child sees `UPE_SEED`, `UPE_TEMPERATURE` and `UPE_MODEL` in its
/// environment. A non-zero exit status fails the call with stderr attached.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    model: String,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            model: model.into(),
        }
    }

    /// Split a command line on whitespace. No shell quoting is interpreted.
    pub fn from_command_line(line: &str, model: impl Into<String>) -> Result<Self, OracleError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| OracleError::Command("oracle command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            model: model.into(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[async_trait]
impl Oracle for CommandOracle {
    async fn generate(
        &self,
        prompt: &str,
        seed: u64,
        temperature: f64,
    ) -> Result<Value, OracleError> {
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("UPE_SEED", seed.to_string())
            .env("UPE_TEMPERATURE", temperature.to_string())
            .env("UPE_MODEL", &self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Command(format!("spawn {}: {e}", self.program)))?;

        // stdin is fed while stdout drains.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = prompt.as_bytes().to_vec();
            tokio::spawn(async move {
                stdin.write_all(&input).await?;
                stdin.shutdown().await
            })
        });

        let output = child.wait_with_output().await?;
        if let Some(writer) = writer {
            match writer
                .await
                .map_err(|e| OracleError::Command(format!("stdin writer failed: {e}")))?
            {
                Ok(()) => {}
                // The child exited without reading all of its input.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            program = %self.program,
            seed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_bytes = output.stdout.len(),
            "oracle command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| OracleError::Malformed(format!("stdout is not UTF-8: {e}")))?;
        parse_output(&stdout)
    }
}
