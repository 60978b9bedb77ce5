//! Request dispatch: validation, orchestration and request logging.
//!
//! [`FlowService`] is the single entry point shared by the HTTP server and the
//! one-shot CLI commands. Every operation validates its primary field before
//! touching the gateway or the retrieval bridge, and records exactly one log
//! entry once it has succeeded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use minilangflow_shared::{
    AppConfig, Endpoint, FlowError, RequestId, Result, RetrievalQuery, WorkflowResult,
};
use minilangflow_storage::RequestLog;

use crate::gateway::{ModelGateway, OllamaGateway};
use crate::pipeline::{SilentWorkflowProgress, WorkflowProgress, run_workflow};
use crate::retrieval::RetrievalBridge;
use crate::templates;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /summarize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Body of `POST /qa`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Body of `POST /qa-rag`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRagRequest {
    #[serde(default)]
    pub question: Option<String>,
}

/// Body of `POST /workflow`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaResponse {
    pub answer: String,
}

/// Answer grounded in retrieved context, returned with that context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRagResponse {
    pub answer: String,
    pub context: String,
    pub chunks: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// FlowService
// ---------------------------------------------------------------------------

/// Validates requests and runs them against the model and retrieval seams.
#[derive(Clone)]
pub struct FlowService {
    gateway: Arc<dyn ModelGateway>,
    retrieval: RetrievalBridge,
    log: RequestLog,
}

impl std::fmt::Debug for FlowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowService")
            .field("retrieval", &self.retrieval)
            .field("log_enabled", &self.log.is_enabled())
            .finish_non_exhaustive()
    }
}

impl FlowService {
    pub fn new(gateway: Arc<dyn ModelGateway>, retrieval: RetrievalBridge, log: RequestLog) -> Self {
        Self {
            gateway,
            retrieval,
            log,
        }
    }

    /// Wire the Ollama gateway and the process-backed retrieval bridge from config.
    pub fn from_config(config: &AppConfig, log: RequestLog) -> Result<Self> {
        let gateway = OllamaGateway::new(&config.model)?;
        info!(
            model = gateway.model(),
            endpoint = %gateway.endpoint(),
            retrieval = %config.retrieval.command,
            "flow service wired"
        );
        let retrieval = RetrievalBridge::from_config(&config.retrieval);
        Ok(Self::new(Arc::new(gateway), retrieval, log))
    }

    /// Summarize `text` in one model call.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn summarize(&self, request: SummarizeRequest) -> Result<SummarizeResponse> {
        let text = required("text", request.text)?;
        let request_id = begin(Endpoint::Summarize);

        let summary = self.gateway.generate(&templates::summarize_prompt(&text)).await?;

        self.log
            .record(request_id, Endpoint::Summarize, json!({ "text": text }), &summary);
        Ok(SummarizeResponse { summary })
    }

    /// Answer `question`, using the caller's context when it is not blank.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn qa(&self, request: QaRequest) -> Result<QaResponse> {
        let question = required("question", request.question)?;
        let request_id = begin(Endpoint::Qa);

        let prompt = templates::qa_prompt(&question, request.context.as_deref());
        let answer = self.gateway.generate(&prompt).await?;

        self.log.record(
            request_id,
            Endpoint::Qa,
            json!({ "question": question, "context": request.context }),
            &answer,
        );
        Ok(QaResponse { answer })
    }

    /// Retrieve context for `question`, then answer from that context only.
    ///
    /// A retrieval failure ends the request before any model call.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn qa_rag(&self, request: QaRagRequest) -> Result<QaRagResponse> {
        let question = required("question", request.question)?;
        let request_id = begin(Endpoint::QaRag);

        let retrieved = self
            .retrieval
            .retrieve(&RetrievalQuery {
                question: question.clone(),
            })
            .await?;

        let prompt = templates::rag_qa_prompt(&question, &retrieved.context);
        let answer = self.gateway.generate(&prompt).await?;

        self.log.record(
            request_id,
            Endpoint::QaRag,
            json!({ "question": question, "usedChunks": retrieved.chunks }),
            &answer,
        );
        Ok(QaRagResponse {
            answer,
            context: retrieved.context,
            chunks: retrieved.chunks,
        })
    }

    /// Run the summary → bullets → questions workflow.
    pub async fn workflow(&self, request: WorkflowRequest) -> Result<WorkflowResult> {
        self.workflow_with_progress(request, &SilentWorkflowProgress).await
    }

    /// [`FlowService::workflow`] reporting each step to `progress`.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn workflow_with_progress(
        &self,
        request: WorkflowRequest,
        progress: &dyn WorkflowProgress,
    ) -> Result<WorkflowResult> {
        let text = required("text", request.text)?;
        let request_id = begin(Endpoint::Workflow);

        let result = run_workflow(self.gateway.as_ref(), &text, progress).await?;

        self.log
            .record(request_id, Endpoint::Workflow, json!({ "text": text }), &result);
        Ok(result)
    }
}

/// Allocate a request id and attach it to the current span.
fn begin(endpoint: Endpoint) -> RequestId {
    let request_id = RequestId::new();
    tracing::Span::current().record("request_id", tracing::field::display(request_id));
    info!(%endpoint, "request accepted");
    request_id
}

/// The field's value, or a validation error when it is missing or blank.
///
/// The value is returned untrimmed; trimming only decides blankness.
fn required(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(FlowError::validation(format!(
            "field '{field}' is required and must not be blank"
        ))),
    }
}
