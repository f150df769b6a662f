//! Structured per-sentence extraction with a one-shot repair call.
//!
//! [`StructuredExtractor::extract`] asks the model for an
//! [`ExtractionResult`] JSON record. A reply that does not decode gets
//! exactly one repair call; if that also fails the sentence is passed
//! through unchanged as a [`Extraction::Degraded`] record, so one malformed
//! reply never stops a batch.
//!
//! Failure classes are kept apart:
//!
//! | Failure                         | Outcome                         |
//! |---------------------------------|---------------------------------|
//! | first call fails to invoke      | `Err(LlmError)`, caller skips   |
//! | first reply does not decode     | repair call                     |
//! | repair call fails to invoke     | `Ok(Degraded)`                  |
//! | repair reply does not decode    | `Ok(Degraded)`                  |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::prompt::PromptSet;
use crate::llm::provider::{ChatMessage, InferenceProvider, LlmError};

/// `error_details` of a degraded record.
pub const UNPARSEABLE_OUTPUT: &str =
    "The model's output could not be parsed, so this sentence was left unchanged.";

// ---------------------------------------------------------------------------
// ExtractionResult
// ---------------------------------------------------------------------------

/// Structured analysis of one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub original_sentence: String,
    pub corrected_sentence: String,
    pub error_details: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub misused_words: Vec<String>,
}

impl ExtractionResult {
    /// The pass-through record used when the model's output is unusable.
    pub fn degraded(unit_text: &str) -> Self {
        Self {
            original_sentence: unit_text.to_string(),
            corrected_sentence: unit_text.to_string(),
            error_details: UNPARSEABLE_OUTPUT.to_string(),
            reason: String::new(),
            misused_words: Vec::new(),
        }
    }
}

/// Which path produced an [`ExtractionResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The first reply decoded.
    Parsed(ExtractionResult),
    /// The repair reply decoded.
    Repaired(ExtractionResult),
    /// Neither reply was usable; the sentence passes through unchanged.
    Degraded(ExtractionResult),
}

impl Extraction {
    pub fn result(&self) -> &ExtractionResult {
        match self {
            Extraction::Parsed(r) | Extraction::Repaired(r) | Extraction::Degraded(r) => r,
        }
    }

    pub fn into_result(self) -> ExtractionResult {
        match self {
            Extraction::Parsed(r) | Extraction::Repaired(r) | Extraction::Degraded(r) => r,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Extraction::Parsed(_) => "parsed",
            Extraction::Repaired(_) => "repaired",
            Extraction::Degraded(_) => "degraded",
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Why a model reply could not be decoded into an [`ExtractionResult`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("reply is empty")]
    Empty,

    #[error("code fence is not closed")]
    UnclosedFence,

    #[error("reply is not a valid record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a reply that is either a bare JSON object or a JSON object inside
/// a single fenced code block.
pub fn decode_record(raw: &str) -> Result<ExtractionResult, DecodeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }
    let body = match trimmed.strip_prefix("```") {
        Some(fenced) => {
            // Skip the info string (`json`, `JSON`, or nothing).
            let after_info = fenced.find('\n').map(|i| &fenced[i + 1..]).unwrap_or("");
            after_info
                .trim_end()
                .strip_suffix("```")
                .ok_or(DecodeError::UnclosedFence)?
        }
        None => trimmed,
    };
    Ok(serde_json::from_str(body.trim())?)
}

// ---------------------------------------------------------------------------
// StructuredExtractor
// ---------------------------------------------------------------------------

/// Runs the decode → repair → degrade sequence against one provider.
pub struct StructuredExtractor<'a> {
    provider: &'a dyn InferenceProvider,
    prompts: &'a PromptSet,
}

impl<'a> StructuredExtractor<'a> {
    pub fn new(provider: &'a dyn InferenceProvider, prompts: &'a PromptSet) -> Self {
        Self { provider, prompts }
    }

    /// Analyse `unit_text` under `instruction`.
    ///
    /// Only a failure to invoke the first call is returned as `Err`; every
    /// other failure is absorbed into `Repaired` or `Degraded`.
    pub async fn extract(&self, instruction: &str, unit_text: &str) -> Result<Extraction, LlmError> {
        let raw = match self
            .provider
            .generate(&ChatMessage::exchange(instruction, unit_text))
            .await
        {
            Ok(raw) => raw,
            // An empty completion is a reply that does not decode, not a
            // transport failure.
            Err(LlmError::EmptyResponse) => String::new(),
            Err(e) => return Err(e),
        };

        let decode_err = match decode_record(&raw) {
            Ok(record) => return Ok(Extraction::Parsed(record)),
            Err(e) => e,
        };
        log::debug!("extractor: first reply did not decode ({decode_err}); sending repair call");

        let repair = self.prompts.repair_instruction(&raw);
        match self
            .provider
            .generate(&ChatMessage::exchange(&repair, unit_text))
            .await
        {
            Ok(fixed) => match decode_record(&fixed) {
                Ok(record) => Ok(Extraction::Repaired(record)),
                Err(e) => {
                    log::warn!("extractor: repair reply did not decode ({e}); degrading");
                    Ok(Extraction::Degraded(ExtractionResult::degraded(unit_text)))
                }
            },
            Err(e) => {
                log::warn!("extractor: repair call failed ({e}); degrading");
                Ok(Extraction::Degraded(ExtractionResult::degraded(unit_text)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{MockProvider, Role};

    const SENTENCE: &str = "私は学校を行きます。";

    fn good_reply() -> String {
        serde_json::json!({
            "original_sentence": SENTENCE,
            "corrected_sentence": "私は学校に行きます。",
            "error_details": "Wrong particle: を should be に.",
            "reason": "行く marks its destination with に (or へ).",
            "misused_words": ["を"]
        })
        .to_string()
    }

    fn expected() -> ExtractionResult {
        ExtractionResult {
            original_sentence: SENTENCE.into(),
            corrected_sentence: "私は学校に行きます。".into(),
            error_details: "Wrong particle: を should be に.".into(),
            reason: "行く marks its destination with に (or へ).".into(),
            misused_words: vec!["を".into()],
        }
    }

    async fn run(provider: &MockProvider) -> Result<Extraction, LlmError> {
        let prompts = PromptSet::default();
        StructuredExtractor::new(provider, &prompts)
            .extract(&prompts.proofreader, SENTENCE)
            .await
    }

    // ---- decode_record ---

    #[test]
    fn decodes_bare_object() {
        assert_eq!(decode_record(&good_reply()).unwrap(), expected());
    }

    #[test]
    fn decodes_fenced_object() {
        let fenced = format!("```json\n{}\n```\n", good_reply());
        assert_eq!(decode_record(&fenced).unwrap(), expected());
    }

    #[test]
    fn optional_fields_default() {
        let reply = r#"{"original_sentence":"a。","corrected_sentence":"a。","error_details":""}"#;
        let record = decode_record(reply).unwrap();
        assert!(record.reason.is_empty());
        assert!(record.misused_words.is_empty());
    }

    #[test]
    fn rejects_prose_and_unclosed_fences() {
        assert!(matches!(
            decode_record("The corrected sentence is 私は学校に行きます。"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_record("```json\n{\"a\": 1}"),
            Err(DecodeError::UnclosedFence)
        ));
        assert!(matches!(decode_record("   "), Err(DecodeError::Empty)));
    }

    // ---- extract ---

    #[tokio::test]
    async fn well_formed_reply_needs_no_repair() {
        let provider = MockProvider::ok([good_reply()]);
        let extraction = run(&provider).await.unwrap();

        assert_eq!(extraction, Extraction::Parsed(expected()));
        assert_eq!(provider.call_count(), 1);

        let call = &provider.calls()[0];
        assert_eq!(call[0].role, Role::System);
        assert_eq!(call[1].role, Role::User);
        assert_eq!(call[1].content, SENTENCE);
    }

    #[tokio::test]
    async fn malformed_then_valid_issues_one_repair() {
        let provider = MockProvider::ok(["Here you go: not json".to_string(), good_reply()]);
        let extraction = run(&provider).await.unwrap();

        assert_eq!(extraction, Extraction::Repaired(expected()));
        assert_eq!(provider.call_count(), 2);

        let repair = &provider.calls()[1];
        assert!(repair[0].content.contains("Here you go: not json"));
        assert_eq!(repair[1].content, SENTENCE);
    }

    #[tokio::test]
    async fn always_malformed_degrades() {
        let provider = MockProvider::ok(["nope", "still nope"]);
        let extraction = run(&provider).await.unwrap();

        assert_eq!(extraction.label(), "degraded");
        let record = extraction.into_result();
        assert_eq!(record.corrected_sentence, record.original_sentence);
        assert_eq!(record.original_sentence, SENTENCE);
        assert_eq!(record.error_details, UNPARSEABLE_OUTPUT);
        assert!(record.reason.is_empty());
        assert!(record.misused_words.is_empty());
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn failed_repair_call_degrades() {
        let provider = MockProvider::new(vec![
            Ok("garbage".into()),
            Err(LlmError::Request("connection reset".into())),
        ]);
        let extraction = run(&provider).await.unwrap();
        assert_eq!(extraction, Extraction::Degraded(ExtractionResult::degraded(SENTENCE)));
    }

    #[tokio::test]
    async fn first_call_failure_is_returned() {
        let provider = MockProvider::new(vec![Err(LlmError::Timeout)]);
        assert!(matches!(run(&provider).await, Err(LlmError::Timeout)));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_completion_goes_to_repair() {
        let provider = MockProvider::new(vec![Err(LlmError::EmptyResponse), Ok(good_reply())]);
        let extraction = run(&provider).await.unwrap();
        assert_eq!(extraction, Extraction::Repaired(expected()));
    }
}
