//! Application configuration for MiniLangFlow.
//!
//! User config lives at `~/.minilangflow/minilangflow.toml`.
//! Environment variables override config file values, which override defaults.
//! CLI flags override everything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FlowError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "minilangflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".minilangflow";

/// Environment variable overriding `model.base_url`.
pub const ENV_OLLAMA_URL: &str = "OLLAMA_URL";
/// Environment variable overriding `model.model`.
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
/// Environment variable overriding `server.port`.
pub const ENV_PORT: &str = "PORT";

// ---------------------------------------------------------------------------
// Config structs (matching minilangflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// External retrieval process settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Request log settings.
    #[serde(default)]
    pub request_log: RequestLogConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` form suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the Ollama-compatible generation service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Target model identifier sent with every generation request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Upper bound on a single generation call, in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_model_timeout(),
        }
    }
}

impl ModelConfig {
    /// The configured timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3".into()
}
fn default_model_timeout() -> u64 {
    120
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Program to spawn for each retrieval.
    #[serde(default = "default_retrieval_command")]
    pub command: String,

    /// Arguments placed before the question.
    #[serde(default = "default_retrieval_args")]
    pub args: Vec<String>,

    /// Working directory for the process (defaults to the server's cwd).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Upper bound on a single retrieval process, in seconds.
    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            command: default_retrieval_command(),
            args: default_retrieval_args(),
            working_dir: None,
            timeout_secs: default_retrieval_timeout(),
        }
    }
}

impl RetrievalConfig {
    /// The configured timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_retrieval_command() -> String {
    "python".into()
}
fn default_retrieval_args() -> Vec<String> {
    vec!["rag/query_index.py".into()]
}
fn default_retrieval_timeout() -> u64 {
    60
}

/// `[request_log]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogConfig {
    /// Whether completed requests are appended to the log file.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSON-lines file receiving one record per completed request.
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_log_path(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_log_path() -> String {
    "logs/requests.log".into()
}

// ---------------------------------------------------------------------------
// Overrides and validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply `OLLAMA_URL`, `OLLAMA_MODEL` and `PORT` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_OLLAMA_URL).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(%url, "model base_url overridden from environment");
            self.model.base_url = url;
        }
        if let Some(model) = lookup(ENV_OLLAMA_MODEL).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(%model, "model overridden from environment");
            self.model.model = model;
        }
        if let Some(port) = lookup(ENV_PORT).filter(|v| !v.trim().is_empty()) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| FlowError::config(format!("invalid {ENV_PORT} '{port}': {e}")))?;
        }
        Ok(())
    }

    /// Check the resolved configuration before any component is built from it.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.model.base_url).map_err(|e| {
            FlowError::config(format!(
                "model.base_url '{}' is not a valid URL: {e}",
                self.model.base_url
            ))
        })?;

        if self.model.model.trim().is_empty() {
            return Err(FlowError::config("model.model must not be empty"));
        }
        if self.model.timeout_secs == 0 {
            return Err(FlowError::config("model.timeout_secs must be greater than 0"));
        }
        if self.retrieval.command.trim().is_empty() {
            return Err(FlowError::config("retrieval.command must not be empty"));
        }
        if self.retrieval.timeout_secs == 0 {
            return Err(FlowError::config(
                "retrieval.timeout_secs must be greater than 0",
            ));
        }
        if self.request_log.enabled && self.request_log.path.trim().is_empty() {
            return Err(FlowError::config(
                "request_log.path must not be empty when the log is enabled",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.minilangflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FlowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.minilangflow/minilangflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FlowError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FlowError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| FlowError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FlowError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| FlowError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}
