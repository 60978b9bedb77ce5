//! Core domain types shared by the gateway, retrieval bridge, pipeline and log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// A UUID v7 identifying one inbound request across logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a new time-sortable request identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// The exposed operations, identified by their HTTP path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    #[serde(rename = "/summarize")]
    Summarize,
    #[serde(rename = "/qa")]
    Qa,
    #[serde(rename = "/qa-rag")]
    QaRag,
    #[serde(rename = "/workflow")]
    Workflow,
}

impl Endpoint {
    /// Path under which the operation is served.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "/summarize",
            Self::Qa => "/qa",
            Self::QaRag => "/qa-rag",
            Self::Workflow => "/workflow",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Model gateway wire types
// ---------------------------------------------------------------------------

/// Body of one non-streaming generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Target model identifier.
    pub model: String,
    /// Fully composed prompt.
    pub prompt: String,
    /// Always `false`; the gateway never streams.
    pub stream: bool,
}

impl GenerationRequest {
    /// Build a non-streaming request for `model`.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

/// Question handed to the external retrieval process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub question: String,
}

/// Context assembled by the retrieval process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Joined text of the selected chunks.
    pub context: String,
    /// Chunk descriptors in retrieval order; their shape is owned by the retriever.
    pub chunks: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Final output of the summary → bullets → questions pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub summary: String,
    pub bullets: String,
    pub questions: String,
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// One line of the request log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Completion time of the request.
    pub timestamp: DateTime<Utc>,
    /// Request correlation id.
    pub request_id: RequestId,
    /// Operation that produced the entry.
    pub endpoint: Endpoint,
    /// Input fields as received.
    pub payload: serde_json::Value,
    /// Prefix of the rendered output.
    #[serde(rename = "responseSnippet")]
    pub response_snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_request_never_streams() {
        let req = GenerationRequest::new("llama3", "Bonjour");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "llama3", "prompt": "Bonjour", "stream": false})
        );
    }

    #[test]
    fn endpoint_serializes_as_path() {
        assert_eq!(
            serde_json::to_string(&Endpoint::QaRag).unwrap(),
            r#""/qa-rag""#
        );
        assert_eq!(Endpoint::Workflow.to_string(), "/workflow");
    }

    #[test]
    fn log_entry_uses_snippet_field_name() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            request_id: RequestId::new(),
            endpoint: Endpoint::Summarize,
            payload: serde_json::json!({"text": "Le chat dort."}),
            response_snippet: "Un chat dort.".into(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""responseSnippet":"Un chat dort.""#));
        assert!(json.contains(r#""endpoint":"/summarize""#));
        assert!(!json.contains('\n'));
    }
}
