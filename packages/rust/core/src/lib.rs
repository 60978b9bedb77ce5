//! Orchestration core for MiniLangFlow.
//!
//! This crate turns validated requests into prompts, sends them through the
//! model gateway, bridges to the external retrieval process, and chains
//! generation calls into the summary → bullets → questions workflow.

pub mod gateway;
pub mod pipeline;
pub mod retrieval;
pub mod service;
pub mod templates;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use gateway::{ModelGateway, OllamaGateway};
pub use pipeline::{SilentWorkflowProgress, WorkflowProgress, WorkflowStep, run_workflow};
pub use retrieval::{ProcessExecutor, ProcessOutput, RetrievalBridge, RetrievalExecutor};
pub use service::{
    FlowService, QaRagRequest, QaRagResponse, QaRequest, QaResponse, SummarizeRequest,
    SummarizeResponse, WorkflowRequest,
};
