//! One end-to-end submission and its validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// TaskKind
// ---------------------------------------------------------------------------

/// Which workflow a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Per-sentence structured correction followed by a whole-text analysis.
    #[default]
    Proofread,
    /// One free-form suggestion pass over the whole prompt.
    Suggest,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Proofread => "proofread",
            TaskKind::Suggest => "suggest",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proofread" => Ok(TaskKind::Proofread),
            "suggest" => Ok(TaskKind::Suggest),
            other => Err(format!("unknown task {other:?} (expected proofread or suggest)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A required [`TaskRequest`] field that was left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    ApiKey,
    Model,
    Endpoint,
    Prompt,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingField::ApiKey => "an API key is required",
            MissingField::Model => "a model must be selected",
            MissingField::Endpoint => "an endpoint URL is required",
            MissingField::Prompt => "the text to check is empty",
        })
    }
}

/// Every missing field of a request, reported as one message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot start: {}.", join_missing(.missing))]
pub struct ValidationError {
    pub missing: Vec<MissingField>,
}

fn join_missing(missing: &[MissingField]) -> String {
    missing
        .iter()
        .map(MissingField::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// TaskRequest
// ---------------------------------------------------------------------------

/// One submission: provider connection details, the learner's text and the
/// task to run on it.
#[derive(Clone, Default, Deserialize)]
pub struct TaskRequest {
    pub model: String,
    pub endpoint: String,
    #[serde(alias = "key")]
    pub api_key: String,
    pub prompt: String,
    #[serde(default)]
    pub task: TaskKind,
}

impl TaskRequest {
    /// Check that every required field is present.
    ///
    /// All missing fields are collected, not just the first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            (MissingField::ApiKey, &self.api_key),
            (MissingField::Model, &self.model),
            (MissingField::Endpoint, &self.endpoint),
            (MissingField::Prompt, &self.prompt),
        ];
        let missing: Vec<MissingField> = checks
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for TaskRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRequest")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("prompt_chars", &self.prompt.chars().count())
            .field("task", &self.task)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> TaskRequest {
        TaskRequest {
            model: "gpt-4o-mini".into(),
            endpoint: "https://api.openai.com/v1".into(),
            api_key: "sk-test".into(),
            prompt: "私は学生です。".into(),
            task: TaskKind::Proofread,
        }
    }

    #[test]
    fn complete_request_is_valid() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn each_missing_field_is_reported() {
        let mut req = complete();
        req.api_key.clear();
        req.prompt = "   ".into();

        let err = req.validate().unwrap_err();
        assert_eq!(err.missing, vec![MissingField::ApiKey, MissingField::Prompt]);

        let message = err.to_string();
        assert!(message.contains("API key"));
        assert!(message.contains("empty"));
        assert!(!message.contains("model"));
    }

    #[test]
    fn all_fields_missing_aggregate_into_one_message() {
        let err = TaskRequest::default().validate().unwrap_err();
        assert_eq!(err.missing.len(), 4);
        assert_eq!(
            err.to_string(),
            "Cannot start: an API key is required; a model must be selected; \
             an endpoint URL is required; the text to check is empty."
        );
    }

    #[test]
    fn debug_redacts_credential() {
        let debug = format!("{:?}", complete());
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn task_kind_parses_and_displays() {
        assert_eq!("Proofread".parse::<TaskKind>().unwrap(), TaskKind::Proofread);
        assert_eq!("suggest".parse::<TaskKind>().unwrap(), TaskKind::Suggest);
        assert!("translate".parse::<TaskKind>().is_err());
        assert_eq!(TaskKind::Suggest.to_string(), "suggest");
    }

    #[test]
    fn deserialises_signal_payload() {
        let json = r#"{"model":"m","endpoint":"http://x/v1","key":"k","prompt":"p","task":"suggest"}"#;
        let req: TaskRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.api_key, "k");
        assert_eq!(req.task, TaskKind::Suggest);

        let without_task = r#"{"model":"m","endpoint":"e","api_key":"k","prompt":"p"}"#;
        let req: TaskRequest = serde_json::from_str(without_task).unwrap();
        assert_eq!(req.task, TaskKind::Proofread);
    }
}
