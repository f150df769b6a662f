//! Presentation events and the sinks that deliver them.
//!
//! The orchestrator emits [`PresentationEvent`]s in order through an
//! [`EventSink`]. A sink that can no longer deliver (client gone, pipe
//! closed) returns [`SinkClosed`], which the orchestrator treats as
//! cancellation.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::llm::ExtractionResult;
use crate::pipeline::request::TaskKind;
use crate::pipeline::state::WorkflowProgress;

/// One ordered update for the client.
///
/// Serialised as a JSON object tagged by `"event"`, e.g.
/// `{"event":"progress","status":"1 / 3"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PresentationEvent {
    Progress {
        status: WorkflowProgress,
    },
    PartialResult {
        unit_index: usize,
        result: ExtractionResult,
    },
    FinalText {
        text: String,
    },
    /// Text streamed so far by the suggestion task.
    Draft {
        text: String,
    },
    AnalysisNotes {
        html: String,
    },
    HistoryEntry {
        task: TaskKind,
        prompt: String,
        outputs: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl PresentationEvent {
    pub fn progress(status: WorkflowProgress) -> Self {
        PresentationEvent::Progress { status }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PresentationEvent::Error {
            message: message.into(),
        }
    }
}

/// The receiver of a run's events is gone.
#[derive(Debug, Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Delivers events to the requesting client in emission order.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: PresentationEvent) -> Result<(), SinkClosed>;
}

#[async_trait]
impl EventSink for mpsc::Sender<PresentationEvent> {
    async fn emit(&self, event: PresentationEvent) -> Result<(), SinkClosed> {
        self.send(event).await.map_err(|_| SinkClosed)
    }
}

// ---------------------------------------------------------------------------
// JsonLinesSink
// ---------------------------------------------------------------------------

/// Writes each event as one JSON line and flushes after every event.
///
/// Writes are synchronous and block the emitting task until the line is
/// flushed. Suited to a CLI's stdout, where lines are small and the
/// process runs a single request.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, event: &PresentationEvent) -> std::io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

#[async_trait]
impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    async fn emit(&self, event: PresentationEvent) -> Result<(), SinkClosed> {
        self.write_line(&event).map_err(|e| {
            log::info!("events: writer closed ({e})");
            SinkClosed
        })
    }
}

// ---------------------------------------------------------------------------
// Test sink
// ---------------------------------------------------------------------------

/// Collects every event in memory.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PresentationEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events(&self) -> Vec<PresentationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: PresentationEvent) -> Result<(), SinkClosed> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
