//! Bridge to the external retrieval process.
//!
//! One process is spawned per question with the question as its last
//! argument. The process must exit and print a single JSON document on
//! stdout: `{"context": ..., "chunks": [...]}` on success or
//! `{"error": ...}` on a logical failure. Both output streams are buffered
//! until exit; a non-zero exit status is a failure regardless of output.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use minilangflow_shared::{FlowError, Result, RetrievalConfig, RetrievalQuery, RetrievalResult};

// ---------------------------------------------------------------------------
// Executor seam
// ---------------------------------------------------------------------------

/// Everything the bridge needs from a finished retrieval process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Whether the process exited successfully.
    pub success: bool,
    /// Full standard output.
    pub stdout: Vec<u8>,
    /// Full standard error.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Output of a process that exited 0 with the given stdout.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Output of a process that exited with `code` and the given stderr.
    pub fn failure(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: Some(code),
            success: false,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs the retrieval capability for one question.
///
/// Implementations own spawning, draining and the bounded wait; protocol
/// interpretation stays in [`RetrievalBridge`].
#[async_trait]
pub trait RetrievalExecutor: Send + Sync {
    async fn execute(&self, question: &str) -> Result<ProcessOutput>;
}

// ---------------------------------------------------------------------------
// ProcessExecutor
// ---------------------------------------------------------------------------

/// [`RetrievalExecutor`] that spawns `command args... <question>`.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ProcessExecutor {
    /// Create an executor for `command` with leading `args`.
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            working_dir: None,
            timeout,
        }
    }

    /// Build an executor from the `[retrieval]` config section.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        let executor = Self::new(&config.command, config.args.clone(), config.timeout());
        match &config.working_dir {
            Some(dir) => executor.working_dir(dir),
            None => executor,
        }
    }

    /// Run the process from `dir` instead of the current directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl RetrievalExecutor for ProcessExecutor {
    #[instrument(skip_all, fields(command = %self.command))]
    async fn execute(&self, question: &str) -> Result<ProcessOutput> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(question)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            FlowError::Retrieval(format!(
                "failed to spawn retrieval process `{}`: {e}",
                self.command
            ))
        })?;

        // Dropping the pending future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                FlowError::Retrieval(format!("failed to collect retrieval output: {e}"))
            })?,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "retrieval process killed");
                return Err(FlowError::Retrieval(format!(
                    "retrieval process timed out after {:?}",
                    self.timeout
                )));
            }
        };

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            exit_code = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "retrieval process exited"
        );

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

// ---------------------------------------------------------------------------
// RetrievalBridge
// ---------------------------------------------------------------------------

/// Retrieval capability with the stdout JSON protocol applied.
#[derive(Clone)]
pub struct RetrievalBridge {
    executor: Arc<dyn RetrievalExecutor>,
}

impl std::fmt::Debug for RetrievalBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalBridge").finish_non_exhaustive()
    }
}

impl RetrievalBridge {
    /// Wrap any executor.
    pub fn new(executor: Arc<dyn RetrievalExecutor>) -> Self {
        Self { executor }
    }

    /// Bridge that spawns the configured retrieval process.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(Arc::new(ProcessExecutor::from_config(config)))
    }

    /// Run one retrieval round trip.
    #[instrument(skip_all)]
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalResult> {
        let output = self.executor.execute(&query.question).await?;
        let result = parse_output(&output)?;
        debug!(chunks = result.chunks.len(), context_chars = result.context.chars().count(), "retrieval succeeded");
        Ok(result)
    }
}

/// Fields the protocol reads from the stdout document; others are ignored.
#[derive(Debug, Deserialize)]
struct RawRetrievalDocument {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    chunks: Option<Vec<serde_json::Value>>,
}

/// Interpret a finished process according to the retrieval protocol.
///
/// 1. non-zero exit → failure carrying stderr
/// 2. stdout that is not a JSON object → malformed output
/// 3. an `error` field → failure carrying its value
/// 4. otherwise → `context` and `chunks`
pub fn parse_output(output: &ProcessOutput) -> Result<RetrievalResult> {
    if !output.success {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".into());
        warn!(exit_code = %code, stderr = %stderr.trim(), "retrieval process failed");
        return Err(FlowError::Retrieval(format!(
            "retrieval process exited with {code}: {}",
            stderr.trim()
        )));
    }

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
        let stdout = String::from_utf8_lossy(&output.stdout);
        warn!(error = %e, stdout = %stdout.chars().take(200).collect::<String>(), "retrieval output is not valid JSON");
        FlowError::Retrieval(format!("malformed retrieval output: {e}"))
    })?;

    if !value.is_object() {
        warn!(kind = json_kind(&value), "retrieval output is not a JSON object");
        return Err(FlowError::Retrieval(format!(
            "malformed retrieval output: expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    let doc: RawRetrievalDocument = serde_json::from_value(value)
        .map_err(|e| FlowError::Retrieval(format!("malformed retrieval output: {e}")))?;

    match doc.error {
        None | Some(serde_json::Value::Null) => {}
        Some(serde_json::Value::String(message)) => return Err(FlowError::Retrieval(message)),
        Some(other) => return Err(FlowError::Retrieval(other.to_string())),
    }

    let context = doc.context.ok_or_else(|| {
        FlowError::Retrieval("malformed retrieval output: missing 'context'".into())
    })?;

    Ok(RetrievalResult {
        context,
        chunks: doc.chunks.unwrap_or_default(),
    })
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
