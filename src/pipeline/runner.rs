//! Workflow orchestrator — drives one request from validation to `Complete`.
//!
//! # Pipeline flow
//!
//! ```text
//! validate ──invalid──▶ error event                               [Rejected]
//!    │
//! connect provider ──fail──▶ error event                          [Failed]
//!    │
//! Starting
//!    ├─ proofread
//!    │    segment → 0 / N
//!    │    for each unit: extract ─Ok──▶ partial_result, i / N
//!    │                           └Err─▶ warn + skip,     i / N
//!    │    final_text(aggregate) → Generating Analysis → analyze ─Err─▶ error [Failed]
//!    │    analysis_notes(html)
//!    └─ suggest
//!         one call (streamed as draft events when possible) ─Err─▶ error [Failed]
//!         analysis_notes(html)
//!    │
//! history_entry (optional) → Complete                             [Completed]
//! ```
//!
//! Every provider call and every emission is a cancellation point: once the
//! token fires or the sink closes, no further calls are made and nothing
//! else is emitted.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, PipelineConfig};
use crate::llm::{ChatMessage, Extraction, InferenceProvider, PromptSet, ProviderFactory, StructuredExtractor};
use crate::render::MarkdownRenderer;

use super::events::{EventSink, PresentationEvent};
use super::request::{TaskKind, TaskRequest};
use super::segmenter::Segmenter;
use super::state::{ProgressTracker, WorkflowOutcome, WorkflowProgress};

/// Buffer size of the channel returned by [`Orchestrator::spawn`].
const EVENT_CHANNEL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Run bookkeeping
// ---------------------------------------------------------------------------

/// Why a run stopped before `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Cancelled,
    Failed,
}

/// Per-run state: where events go, the cancellation signal, and the last
/// progress value.
struct Run<'a> {
    sink: &'a dyn EventSink,
    cancel: &'a CancellationToken,
    progress: ProgressTracker,
}

impl<'a> Run<'a> {
    fn new(sink: &'a dyn EventSink, cancel: &'a CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            progress: ProgressTracker::new(),
        }
    }

    /// Deliver `event` unless the run is cancelled first, including while
    /// the sink is applying backpressure.
    async fn emit(&mut self, event: PresentationEvent) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            sent = self.sink.emit(event) => sent.map_err(|_| {
                log::info!("pipeline: event sink closed, stopping");
                Halt::Cancelled
            }),
        }
    }

    async fn advance(&mut self, next: WorkflowProgress) -> Result<(), Halt> {
        match self.progress.advance(next) {
            Some(status) => self.emit(PresentationEvent::progress(status)).await,
            None => Ok(()),
        }
    }

    /// Await `fut` unless the run is cancelled first. Cancelling drops
    /// `fut`, which aborts the in-flight provider call.
    async fn call<F: Future>(&self, fut: F) -> Result<F::Output, Halt> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Report a fatal error to the client.
    async fn fail(&mut self, message: String) -> Halt {
        log::error!("pipeline: {message}");
        match self.emit(PresentationEvent::error(message)).await {
            Ok(()) => Halt::Failed,
            Err(halt) => halt,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs proofreading and suggestion workflows.
///
/// One `Orchestrator` serves any number of concurrent requests; each call to
/// [`run`](Self::run) owns its own units, results and progress.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use proofreader::config::AppConfig;
/// use proofreader::llm::ApiProviderFactory;
/// use proofreader::pipeline::{Orchestrator, TaskKind, TaskRequest};
/// use proofreader::render::CommonMarkRenderer;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = AppConfig::default();
/// let orchestrator = Arc::new(Orchestrator::from_config(
///     &config,
///     Arc::new(ApiProviderFactory::from_config(&config.llm)),
///     Arc::new(CommonMarkRenderer),
/// )?);
///
/// let request = TaskRequest {
///     model: "gpt-4o-mini".into(),
///     endpoint: "https://api.openai.com/v1".into(),
///     api_key: "sk-...".into(),
///     prompt: "今日は晴れです。明日は雨でしょう。".into(),
///     task: TaskKind::Proofread,
/// };
/// let (mut events, handle) = orchestrator.spawn(request, CancellationToken::new());
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// let outcome = handle.await?;
/// # let _ = outcome;
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    providers: Arc<dyn ProviderFactory>,
    renderer: Arc<dyn MarkdownRenderer>,
    segmenter: Segmenter,
    prompts: PromptSet,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        providers: Arc<dyn ProviderFactory>,
        renderer: Arc<dyn MarkdownRenderer>,
        segmenter: Segmenter,
        prompts: PromptSet,
        config: PipelineConfig,
    ) -> Self {
        Self {
            providers,
            renderer,
            segmenter,
            prompts,
            config,
        }
    }

    /// Build from application config, reading any prompt override files.
    pub fn from_config(
        config: &AppConfig,
        providers: Arc<dyn ProviderFactory>,
        renderer: Arc<dyn MarkdownRenderer>,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(
            providers,
            renderer,
            Segmenter::from_config(&config.segmenter),
            PromptSet::from_config(&config.prompts)?,
            config.pipeline.clone(),
        ))
    }

    /// Run `request` to completion, emitting every event through `sink`.
    pub async fn run(
        &self,
        request: TaskRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> WorkflowOutcome {
        let mut run = Run::new(sink, cancel);

        if let Err(e) = request.validate() {
            log::warn!("pipeline: rejected request: {e}");
            // Nothing else follows, so a closed sink changes nothing here.
            let _ = run.emit(PresentationEvent::error(e.to_string())).await;
            return WorkflowOutcome::Rejected;
        }

        log::info!(
            "pipeline: {} request ({} chars, model {})",
            request.task,
            request.prompt.chars().count(),
            request.model
        );

        let outcome = match self.execute(&request, &mut run).await {
            Ok(()) => WorkflowOutcome::Completed,
            Err(Halt::Cancelled) => WorkflowOutcome::Cancelled,
            Err(Halt::Failed) => WorkflowOutcome::Failed,
        };
        log::info!("pipeline: {} request {}", request.task, outcome.label());
        outcome
    }

    /// Run `request` on a tokio task and stream its events over a channel.
    ///
    /// Dropping the receiver cancels the run at its next emission.
    pub fn spawn(
        self: Arc<Self>,
        request: TaskRequest,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<PresentationEvent>, JoinHandle<WorkflowOutcome>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(async move { self.run(request, &tx, &cancel).await });
        (rx, handle)
    }

    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    async fn execute(&self, request: &TaskRequest, run: &mut Run<'_>) -> Result<(), Halt> {
        let provider = match self
            .providers
            .connect(&request.model, &request.endpoint, &request.api_key)
        {
            Ok(provider) => provider,
            Err(e) => return Err(run.fail(format!("Could not set up the model provider: {e}")).await),
        };

        run.advance(WorkflowProgress::Starting).await?;

        match request.task {
            TaskKind::Proofread => self.proofread(request, provider.as_ref(), run).await,
            TaskKind::Suggest => self.suggest(request, provider.as_ref(), run).await,
        }
    }

    async fn proofread(
        &self,
        request: &TaskRequest,
        provider: &dyn InferenceProvider,
        run: &mut Run<'_>,
    ) -> Result<(), Halt> {
        let units = self.segmenter.segment(&request.prompt);
        let total = units.len();
        if total == 0 {
            log::info!("pipeline: no sentences found, nothing to proofread");
            return self.finish(request, Vec::new(), run).await;
        }

        run.advance(WorkflowProgress::Units { completed: 0, total }).await?;

        let extractor = StructuredExtractor::new(provider, &self.prompts);
        let mut corrected = Vec::with_capacity(total);

        for unit in &units {
            log::debug!("pipeline: extracting sentence {}/{}", unit.index + 1, total);
            match run
                .call(extractor.extract(&self.prompts.proofreader, &unit.text))
                .await?
            {
                Ok(extraction) => {
                    if let Extraction::Degraded(_) = extraction {
                        log::warn!("pipeline: sentence {} passed through unparsed", unit.index + 1);
                    } else {
                        log::debug!("pipeline: sentence {} {}", unit.index + 1, extraction.label());
                    }
                    let result = extraction.into_result();
                    corrected.push(result.corrected_sentence.clone());
                    run.emit(PresentationEvent::PartialResult {
                        unit_index: unit.index,
                        result,
                    })
                    .await?;
                }
                Err(e) => {
                    log::warn!(
                        "pipeline: skipping sentence {}/{} after provider error: {e}",
                        unit.index + 1,
                        total
                    );
                }
            }
            run.advance(WorkflowProgress::Units {
                completed: unit.index + 1,
                total,
            })
            .await?;
        }

        let aggregate = corrected.join(" ");
        run.emit(PresentationEvent::FinalText {
            text: aggregate.clone(),
        })
        .await?;

        if corrected.is_empty() {
            log::warn!("pipeline: every sentence was skipped, no analysis to run");
            return self.finish(request, vec![aggregate], run).await;
        }

        run.advance(WorkflowProgress::GeneratingAnalysis).await?;

        let messages = ChatMessage::exchange(&self.prompts.analyzer, &aggregate);
        let notes = match run.call(provider.generate(&messages)).await? {
            Ok(notes) => notes,
            Err(e) => return Err(run.fail(format!("Analysis failed: {e}")).await),
        };

        let html = self.render(&notes);
        run.emit(PresentationEvent::AnalysisNotes { html: html.clone() })
            .await?;

        self.finish(request, vec![aggregate, html], run).await
    }

    async fn suggest(
        &self,
        request: &TaskRequest,
        provider: &dyn InferenceProvider,
        run: &mut Run<'_>,
    ) -> Result<(), Halt> {
        let messages = ChatMessage::exchange(&self.prompts.suggester, &request.prompt);

        let text = if self.config.stream_suggestions && provider.supports_streaming() {
            self.stream_drafts(provider, &messages, run).await?
        } else {
            match run.call(provider.generate(&messages)).await? {
                Ok(text) => text,
                Err(e) => return Err(run.fail(format!("Suggestion failed: {e}")).await),
            }
        };

        let html = self.render(&text);
        run.emit(PresentationEvent::AnalysisNotes { html: html.clone() })
            .await?;

        self.finish(request, vec![html], run).await
    }

    /// Forward the streamed reply as growing `draft` events and return the
    /// full text.
    async fn stream_drafts(
        &self,
        provider: &dyn InferenceProvider,
        messages: &[ChatMessage],
        run: &mut Run<'_>,
    ) -> Result<String, Halt> {
        let mut stream = match run.call(provider.generate_stream(messages)).await? {
            Ok(stream) => stream,
            Err(e) => return Err(run.fail(format!("Suggestion failed: {e}")).await),
        };

        // Each draft carries the whole text so far, so total draft volume
        // grows quadratically with reply length.
        let mut text = String::new();
        while let Some(chunk) = run.call(stream.next()).await? {
            match chunk {
                Ok(chunk) => {
                    text.push_str(&chunk);
                    run.emit(PresentationEvent::Draft { text: text.clone() })
                        .await?;
                }
                Err(e) => return Err(run.fail(format!("Suggestion stream failed: {e}")).await),
            }
        }

        if text.trim().is_empty() {
            return Err(run.fail("Suggestion failed: the model returned no text".into()).await);
        }
        Ok(text)
    }

    async fn finish(
        &self,
        request: &TaskRequest,
        outputs: Vec<String>,
        run: &mut Run<'_>,
    ) -> Result<(), Halt> {
        if self.config.record_history {
            run.emit(PresentationEvent::HistoryEntry {
                task: request.task,
                prompt: request.prompt.clone(),
                outputs,
            })
            .await?;
        }
        run.advance(WorkflowProgress::Complete).await
    }

    /// Render model Markdown; a rendering failure yields an empty body.
    fn render(&self, markdown: &str) -> String {
        match self.renderer.render(markdown) {
            Ok(html) => html,
            Err(e) => {
                log::error!("pipeline: {e}");
                String::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
