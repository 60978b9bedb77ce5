//! HTTP routes for the MiniLangFlow API.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::instrument;

use minilangflow_core::{
    FlowService, QaRagRequest, QaRagResponse, QaRequest, QaResponse, SummarizeRequest,
    SummarizeResponse, WorkflowRequest,
};
use minilangflow_shared::WorkflowResult;

use crate::error::ApiError;

/// Status reported by the health check.
pub const HEALTH_STATUS: &str = "MiniLangFlow API up";

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Creates the API router.
pub fn create_router(service: Arc<FlowService>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/summarize", post(summarize))
        .route("/qa", post(qa))
        .route("/qa-rag", post(qa_rag))
        .route("/workflow", post(workflow))
        .with_state(service)
}

#[instrument(skip_all)]
async fn health_check() -> Json<Value> {
    Json(json!({ "status": HEALTH_STATUS }))
}

#[instrument(skip_all)]
async fn summarize(
    State(service): State<Arc<FlowService>>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<SummarizeResponse> {
    let Json(request) = body?;
    Ok(Json(service.summarize(request).await?))
}

#[instrument(skip_all)]
async fn qa(
    State(service): State<Arc<FlowService>>,
    body: Result<Json<QaRequest>, JsonRejection>,
) -> ApiResult<QaResponse> {
    let Json(request) = body?;
    Ok(Json(service.qa(request).await?))
}

#[instrument(skip_all)]
async fn qa_rag(
    State(service): State<Arc<FlowService>>,
    body: Result<Json<QaRagRequest>, JsonRejection>,
) -> ApiResult<QaRagResponse> {
    let Json(request) = body?;
    Ok(Json(service.qa_rag(request).await?))
}

#[instrument(skip_all)]
async fn workflow(
    State(service): State<Arc<FlowService>>,
    body: Result<Json<WorkflowRequest>, JsonRejection>,
) -> ApiResult<WorkflowResult> {
    let Json(request) = body?;
    Ok(Json(service.workflow(request).await?))
}
