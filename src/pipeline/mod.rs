//! Request pipeline for the proofreader.
//!
//! This module turns one [`TaskRequest`] into an ordered stream of
//! [`PresentationEvent`]s.
//!
//! # Architecture
//!
//! ```text
//! TaskRequest
//!        │
//!        ▼
//! Orchestrator::run()  ← async, one per request
//!        │
//!        ├─ validate                       → error event, no provider call
//!        ├─ ProviderFactory::connect       → per-request provider
//!        │
//!        ├─ proofread
//!        │     Segmenter::segment          → InputUnit[]
//!        │     StructuredExtractor × N     → partial_result, i / N
//!        │     analyzer call               → final_text, analysis_notes
//!        │
//!        └─ suggest
//!              suggester call (streamed)   → draft*, analysis_notes
//!
//! EventSink ←─── JSON lines on stdout, an mpsc channel, or a test recorder
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use proofreader::config::AppConfig;
//! use proofreader::llm::ApiProviderFactory;
//! use proofreader::pipeline::{JsonLinesSink, Orchestrator, TaskKind, TaskRequest};
//! use proofreader::render::CommonMarkRenderer;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::default();
//!     let orchestrator = Orchestrator::from_config(
//!         &config,
//!         Arc::new(ApiProviderFactory::from_config(&config.llm)),
//!         Arc::new(CommonMarkRenderer),
//!     )?;
//!
//!     let request = TaskRequest {
//!         model: "gpt-4o-mini".into(),
//!         endpoint: "https://api.openai.com/v1".into(),
//!         api_key: "sk-...".into(),
//!         prompt: "私は学校を行きます。".into(),
//!         task: TaskKind::Proofread,
//!     };
//!     let sink = JsonLinesSink::new(std::io::stdout());
//!     orchestrator.run(request, &sink, &CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```

pub mod events;
pub mod request;
pub mod runner;
pub mod segmenter;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use events::{EventSink, JsonLinesSink, PresentationEvent, SinkClosed};
pub use request::{MissingField, TaskKind, TaskRequest, ValidationError};
pub use runner::Orchestrator;
pub use segmenter::{InputUnit, Segmenter};
pub use state::{ProgressTracker, WorkflowOutcome, WorkflowProgress};

#[cfg(test)]
pub use events::RecordingSink;
