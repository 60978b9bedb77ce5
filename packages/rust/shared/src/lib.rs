//! Shared types, error model, and configuration for MiniLangFlow.
//!
//! This crate is the foundation depended on by all other MiniLangFlow crates.
//! It provides:
//! - [`FlowError`], the unified error type
//! - Domain types ([`GenerationRequest`], [`RetrievalResult`], [`WorkflowResult`], [`LogEntry`])
//! - Configuration ([`AppConfig`], config loading and environment overrides)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ModelConfig, RequestLogConfig, RetrievalConfig, ServerConfig, config_dir,
    config_file_path, init_config, init_config_at, load_config, load_config_from,
};
pub use error::{FlowError, Result};
pub use types::{
    Endpoint, GenerationRequest, LogEntry, RequestId, RetrievalQuery,
    RetrievalResult, WorkflowResult,
};
