//! LLM access for the proofreading pipeline.
//!
//! This module provides:
//! * [`InferenceProvider`] — async trait implemented by every chat backend.
//! * [`ApiProvider`] / [`ApiProviderFactory`] — OpenAI-compatible REST backend,
//!   built per request from the request's model, endpoint and key.
//! * [`StructuredExtractor`] — per-sentence JSON extraction with one repair
//!   call and a degraded fallback.
//! * [`PromptSet`] — task instructions, overridable from files.
//! * [`TextStream`] — ordered chunk stream for streamed completions.
//! * [`LlmError`] — error variants for provider calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use proofreader::config::AppConfig;
//! use proofreader::llm::{ApiProviderFactory, PromptSet, ProviderFactory, StructuredExtractor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let factory = ApiProviderFactory::from_config(&config.llm);
//!     let provider = factory
//!         .connect("gpt-4o-mini", "https://api.openai.com/v1", "sk-...")
//!         .unwrap();
//!
//!     let prompts = PromptSet::default();
//!     let extraction = StructuredExtractor::new(provider.as_ref(), &prompts)
//!         .extract(&prompts.proofreader, "私は学校を行きます。")
//!         .await
//!         .unwrap();
//!     println!("{}", extraction.result().corrected_sentence);
//! }
//! ```

pub mod extractor;
pub mod prompt;
pub mod provider;
pub mod stream;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use extractor::{decode_record, DecodeError, Extraction, ExtractionResult, StructuredExtractor};
pub use prompt::PromptSet;
pub use provider::{
    ApiProvider, ApiProviderFactory, ChatMessage, InferenceProvider, LlmError, ProviderFactory,
    Role,
};
pub use stream::TextStream;

// test-only re-export so the pipeline tests can script provider replies.
#[cfg(test)]
pub use provider::MockProvider;
