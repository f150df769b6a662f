//! Application entry point — proofreader CLI.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse arguments and load [`AppConfig`] (default on first run).
//! 3. Assemble the [`TaskRequest`]; the text comes from the argument or stdin.
//! 4. Create the [`tokio`] runtime.
//! 5. Build the provider factory, renderer and [`Orchestrator`] from config.
//! 6. Cancel the run on Ctrl-C.
//! 7. Run the request, writing every event to stdout as one JSON line.
//!
//! The process exits with status 0 only when the run reached `Complete`.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use proofreader::{
    config::AppConfig,
    llm::ApiProviderFactory,
    pipeline::{JsonLinesSink, Orchestrator, TaskKind, TaskRequest, WorkflowOutcome},
    render::CommonMarkRenderer,
};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "proofreader", version, about = "Proofread text with a chat model")]
struct Args {
    /// Workflow to run: proofread or suggest
    #[arg(short, long, default_value = "proofread")]
    task: TaskKind,

    /// Model name (defaults to the configured model)
    #[arg(short, long)]
    model: Option<String>,

    /// OpenAI-compatible base URL (defaults to the configured endpoint)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// API key (defaults to the configured key)
    #[arg(short, long, env = "PROOFREADER_API_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Settings file to use instead of the platform default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text to check; read from stdin when omitted
    prompt: Option<String>,
}

impl Args {
    fn into_request(self, config: &AppConfig) -> anyhow::Result<TaskRequest> {
        let prompt = match self.prompt {
            Some(prompt) => prompt,
            None => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("failed to read text from stdin")?;
                text
            }
        };

        Ok(TaskRequest {
            model: self.model.unwrap_or_else(|| config.llm.model.clone()),
            endpoint: self.endpoint.unwrap_or_else(|| config.llm.endpoint.clone()),
            api_key: self
                .key
                .or_else(|| config.llm.api_key.clone())
                .unwrap_or_default(),
            prompt,
            task: self.task,
        })
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging (stderr; stdout carries the events)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Arguments + configuration
    let args = Args::parse();
    let loaded = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Request
    let request = args.into_request(&config)?;
    log::info!("proofreader starting: {request:?}");

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 5. Orchestrator
    let orchestrator = Orchestrator::from_config(
        &config,
        Arc::new(ApiProviderFactory::from_config(&config.llm)),
        Arc::new(CommonMarkRenderer),
    )?;

    let outcome = rt.block_on(async {
        // 6. Ctrl-C cancels the run
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupt received, cancelling");
                on_signal.cancel();
            }
        });

        // 7. Run
        let sink = JsonLinesSink::new(std::io::stdout());
        orchestrator.run(request, &sink, &cancel).await
    });

    if outcome != WorkflowOutcome::Completed {
        log::warn!("run {}", outcome.label());
        std::process::exit(match outcome {
            WorkflowOutcome::Rejected => 2,
            WorkflowOutcome::Cancelled => 130,
            _ => 1,
        });
    }
    Ok(())
}
