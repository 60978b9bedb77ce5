//! Append-only request log (JSON lines).
//!
//! The [`RequestLog`] handle is cheap to clone and hands entries to a single
//! background writer task over a bounded channel. Recording never awaits and
//! never fails the caller.
//!
//! **Write rules:**
//! - one JSON object per line, each line written whole and newline-terminated
//! - the file is opened in append mode and never read back
//! - a full or closed channel drops the entry with a warning

use std::path::{Path, PathBuf};

use chrono::Utc;
use minilangflow_shared::{Endpoint, FlowError, LogEntry, RequestId, Result};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Maximum number of characters of output kept in a log line.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Snippet recorded when an output cannot be rendered as JSON.
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "<unserializable response>";

/// Entries buffered between request handlers and the writer task.
const CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable handle used by request handlers to append log entries.
#[derive(Debug, Clone)]
pub struct RequestLog {
    tx: Option<mpsc::Sender<LogEntry>>,
}

/// Owner of the background writer task.
///
/// Call [`RequestLogWriter::finish`] after every [`RequestLog`] clone has been
/// dropped to make sure buffered entries reach the file.
#[derive(Debug)]
pub struct RequestLogWriter {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl RequestLog {
    /// Open `path` for appending and start the writer task.
    ///
    /// Parent directories are created as needed.
    pub async fn spawn(path: impl Into<PathBuf>) -> Result<(Self, RequestLogWriter)> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FlowError::io(parent, e))?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| FlowError::io(&path, e))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(write_loop(file, path.clone(), rx));

        tracing::info!(?path, "request log opened");

        Ok((Self { tx: Some(tx) }, RequestLogWriter { path, task }))
    }

    /// A handle that silently discards every entry.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether entries recorded through this handle reach a file.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Build an entry for a completed request and queue it.
    pub fn record<T>(
        &self,
        request_id: RequestId,
        endpoint: Endpoint,
        payload: serde_json::Value,
        output: &T,
    ) where
        T: Serialize + ?Sized,
    {
        if !self.is_enabled() {
            return;
        }

        self.submit(LogEntry {
            timestamp: Utc::now(),
            request_id,
            endpoint,
            payload,
            response_snippet: snippet(output),
        });
    }

    /// Queue a prepared entry without waiting.
    pub fn submit(&self, entry: LogEntry) {
        let Some(tx) = &self.tx else {
            return;
        };

        if let Err(e) = tx.try_send(entry) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "channel full",
                mpsc::error::TrySendError::Closed(_) => "writer stopped",
            };
            tracing::warn!(reason, "dropping request log entry");
        }
    }
}

impl RequestLogWriter {
    /// Path of the file being appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the writer to drain its queue and exit.
    ///
    /// Returns once every sending handle has been dropped.
    pub async fn finish(self) {
        if let Err(e) = self.task.await {
            tracing::error!(path = ?self.path, error = %e, "request log writer panicked");
        }
    }
}

async fn write_loop(mut file: tokio::fs::File, path: PathBuf, mut rx: mpsc::Receiver<LogEntry>) {
    while let Some(entry) = rx.recv().await {
        let mut line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "request log entry could not be encoded");
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = file.write_all(line.as_bytes()).await {
            tracing::error!(?path, error = %e, "request log write failed");
            continue;
        }
        if let Err(e) = file.flush().await {
            tracing::error!(?path, error = %e, "request log flush failed");
        }
    }

    tracing::debug!(?path, "request log writer stopped");
}

// ---------------------------------------------------------------------------
// Snippets
// ---------------------------------------------------------------------------

/// Render an output value for the log and keep its first 200 characters.
///
/// Strings are taken verbatim, anything else as compact JSON in the same
/// field order as the response body. Values that fail to serialize become
/// [`UNSERIALIZABLE_PLACEHOLDER`].
pub fn snippet<T>(output: &T) -> String
where
    T: Serialize + ?Sized,
{
    let rendered = match serde_json::to_value(output) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(_) => serde_json::to_string(output)
            .unwrap_or_else(|_| UNSERIALIZABLE_PLACEHOLDER.to_string()),
        Err(_) => UNSERIALIZABLE_PLACEHOLDER.to_string(),
    };
    truncate_chars(&rendered, SNIPPET_MAX_CHARS)
}

/// Prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use minilangflow_shared::WorkflowResult;

    use super::*;

    fn temp_log_path(label: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("mlf-{label}-{}", uuid::Uuid::now_v7()));
        let path = dir.join("logs").join("requests.log");
        (dir, path)
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn snippet_truncates_to_200_chars() {
        let output = "x".repeat(500);
        let s = snippet(&output);
        assert_eq!(s.chars().count(), 200);
        assert!(output.starts_with(&s));
    }

    #[test]
    fn snippet_keeps_short_strings_verbatim() {
        assert_eq!(snippet("Un chat dort."), "Un chat dort.");
    }

    #[test]
    fn snippet_never_splits_characters() {
        let output = "é".repeat(300);
        let s = snippet(&output);
        assert_eq!(s.chars().count(), 200);
        assert_eq!(s.len(), 400);
    }

    #[test]
    fn snippet_renders_structures_in_field_order() {
        let output = WorkflowResult {
            summary: "S".into(),
            bullets: "B".into(),
            questions: "Q".into(),
        };
        assert_eq!(
            snippet(&output),
            r#"{"summary":"S","bullets":"B","questions":"Q"}"#
        );
    }

    #[test]
    fn long_structured_snippet_is_prefix_of_response_body() {
        let output = WorkflowResult {
            summary: "s".repeat(150),
            bullets: "b".repeat(150),
            questions: "q".repeat(150),
        };
        let body = serde_json::to_string(&output).unwrap();
        let s = snippet(&output);
        assert_eq!(s.chars().count(), SNIPPET_MAX_CHARS);
        assert!(body.starts_with(&s));
    }

    #[test]
    fn snippet_falls_back_for_unserializable_values() {
        let mut output: HashMap<(u8, u8), u8> = HashMap::new();
        output.insert((1, 2), 3);
        assert_eq!(snippet(&output), UNSERIALIZABLE_PLACEHOLDER);
    }

    #[test]
    fn truncate_chars_handles_exact_length() {
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abcd", 3), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn disabled_log_accepts_records() {
        let log = RequestLog::disabled();
        assert!(!log.is_enabled());
        log.record(
            RequestId::new(),
            Endpoint::Qa,
            serde_json::json!({"question": "q"}),
            "answer",
        );
    }

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let (dir, path) = temp_log_path("log-append");
        let (log, writer) = RequestLog::spawn(&path).await.unwrap();
        assert_eq!(writer.path(), path.as_path());

        log.record(
            RequestId::new(),
            Endpoint::Summarize,
            serde_json::json!({"text": "Le chat dort."}),
            &"y".repeat(500),
        );
        log.record(
            RequestId::new(),
            Endpoint::Workflow,
            serde_json::json!({"text": "t"}),
            &serde_json::json!({"summary": "s", "bullets": "b", "questions": "q"}),
        );
        drop(log);
        writer.finish().await;

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["endpoint"], "/summarize");
        assert_eq!(lines[0]["payload"]["text"], "Le chat dort.");
        assert_eq!(lines[0]["responseSnippet"].as_str().unwrap().len(), 200);
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["endpoint"], "/workflow");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn reopening_appends_instead_of_truncating() {
        let (dir, path) = temp_log_path("log-reopen");

        for _ in 0..2 {
            let (log, writer) = RequestLog::spawn(&path).await.unwrap();
            log.record(RequestId::new(), Endpoint::Qa, serde_json::json!({}), "a");
            drop(log);
            writer.finish().await;
        }

        assert_eq!(read_lines(&path).len(), 2);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn concurrent_records_stay_line_atomic() {
        let (dir, path) = temp_log_path("log-concurrent");
        let (log, writer) = RequestLog::spawn(&path).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.record(
                    RequestId::new(),
                    Endpoint::Qa,
                    serde_json::json!({"question": format!("q{i}")}),
                    &format!("answer {i} {}", "z".repeat(300)),
                );
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        drop(log);
        writer.finish().await;

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 50);
        assert!(lines.iter().all(|l| l["endpoint"] == "/qa"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
