//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use minilangflow_core::{
    FlowService, QaRagRequest, QaRequest, SummarizeRequest, WorkflowProgress, WorkflowRequest,
    WorkflowStep,
};
use minilangflow_shared::{AppConfig, init_config, init_config_at, load_config, load_config_from};
use minilangflow_storage::{RequestLog, RequestLogWriter};
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MiniLangFlow: prompts, retrieval and multi-step workflows over a local LLM.
#[derive(Parser)]
#[command(
    name = "minilangflow",
    version,
    about = "HTTP front end for a locally hosted language model, with retrieval and a multi-step workflow.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.minilangflow/minilangflow.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP API.
    Serve {
        /// Interface to bind (overrides server.host).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides server.port and PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Summarize a text once and print the result.
    Summarize {
        /// Text to summarize.
        text: String,
    },

    /// Answer a question once and print the result.
    Ask {
        /// Question to answer.
        question: String,

        /// Context the answer should rely on.
        #[arg(short, long, conflicts_with = "rag")]
        context: Option<String>,

        /// Fetch context from the retrieval process instead.
        #[arg(long)]
        rag: bool,
    },

    /// Run the summary → bullets → questions workflow once.
    Workflow {
        /// Source text.
        text: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "minilangflow=info",
        1 => "minilangflow=debug",
        _ => "minilangflow=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Diagnostics go to stderr so one-shot JSON output stays pipeable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Serve { host, port } => cmd_serve(config_path, host, port).await,
        Command::Summarize { text } => {
            one_shot(config_path, |service| async move {
                service.summarize(SummarizeRequest { text: Some(text) }).await
            })
            .await
        }
        Command::Ask {
            question,
            context,
            rag,
        } => {
            if rag {
                one_shot(config_path, |service| async move {
                    service
                        .qa_rag(QaRagRequest {
                            question: Some(question),
                        })
                        .await
                })
                .await
            } else {
                one_shot(config_path, |service| async move {
                    service
                        .qa(QaRequest {
                            question: Some(question),
                            context,
                        })
                        .await
                })
                .await
            }
        }
        Command::Workflow { text } => cmd_workflow(config_path, text).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// Load config from `path` or the default location, then apply the environment.
fn resolve_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Start the request log writer, or a discarding handle when logging is off.
async fn open_request_log(config: &AppConfig) -> Result<(RequestLog, Option<RequestLogWriter>)> {
    if !config.request_log.enabled {
        info!("request log disabled");
        return Ok((RequestLog::disabled(), None));
    }
    let (log, writer) = RequestLog::spawn(&config.request_log.path).await?;
    Ok((log, Some(writer)))
}

/// Wait for queued log lines once every handle is gone.
async fn close_request_log(writer: Option<RequestLogWriter>) {
    if let Some(writer) = writer {
        writer.finish().await;
    }
}

/// Run one operation against a freshly wired service and print its result.
async fn one_shot<F, Fut, T>(config_path: Option<PathBuf>, op: F) -> Result<()>
where
    F: FnOnce(FlowService) -> Fut,
    Fut: Future<Output = minilangflow_shared::Result<T>>,
    T: Serialize,
{
    let config = resolve_config(config_path)?;
    let (log, writer) = open_request_log(&config).await?;
    let service = FlowService::from_config(&config, log)?;

    let outcome = op(service).await;
    close_request_log(writer).await;

    print_json(&outcome?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let (log, writer) = open_request_log(&config).await?;
    let service = Arc::new(FlowService::from_config(&config, log)?);
    let addr = config.server.bind_addr();

    info!(
        %addr,
        model = %config.model.model,
        model_url = %config.model.base_url,
        retrieval = %config.retrieval.command,
        "starting MiniLangFlow API"
    );

    let served = minilangflow_server::serve(&addr, service).await;
    close_request_log(writer).await;
    served?;
    Ok(())
}

async fn cmd_workflow(config_path: Option<PathBuf>, text: String) -> Result<()> {
    let config = resolve_config(config_path)?;
    let (log, writer) = open_request_log(&config).await?;
    let service = FlowService::from_config(&config, log)?;

    let progress = CliProgress::new();
    let outcome = service
        .workflow_with_progress(WorkflowRequest { text: Some(text) }, &progress)
        .await;
    progress.finish();

    drop(service);
    close_request_log(writer).await;

    print_json(&outcome?)
}

fn cmd_config_init(config_path: Option<PathBuf>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            init_config_at(&path)?;
            path
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Workflow progress shown as an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl WorkflowProgress for CliProgress {
    fn step_started(&self, step: WorkflowStep) {
        self.spinner.set_message(format!(
            "[{}/{}] {}",
            step.number(),
            WorkflowStep::ALL.len(),
            step.as_str()
        ));
    }

    fn step_finished(&self, step: WorkflowStep) {
        self.spinner.println(format!("  done: {}", step.as_str()));
    }
}
