//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files. Every section is
//! `#[serde(default)]`, so a partial `settings.toml` only overrides the keys
//! it names.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the inference provider.
///
/// Model, endpoint and key are per request; the values here are only the
/// fallbacks the CLI uses when a flag is not given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API, including any `/v1` prefix.
    ///
    /// - OpenAI: `https://api.openai.com/v1`
    /// - Ollama: `http://localhost:11434/v1`
    pub endpoint: String,
    /// API key — `None` when it must come from the command line or env.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"gpt-4o-mini"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0). Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for one provider call before timing out.
    pub timeout_secs: u64,
    /// Upper bound on generated tokens per call; `None` leaves it to the
    /// provider.
    pub max_tokens: Option<u32>,
    /// Request streamed (SSE) completions where the pipeline can use them.
    pub stream: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.3,
            timeout_secs: 60,
            max_tokens: None,
            stream: true,
        }
    }
}

// ---------------------------------------------------------------------------
// SegmenterConfig
// ---------------------------------------------------------------------------

/// Sentence splitting rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Characters that end a sentence. Whitespace entries (line breaks)
    /// split but are replaced by `default_marker`.
    pub terminators: Vec<char>,
    /// Marker appended to sentences that end at a line break or at the end
    /// of the input.
    pub default_marker: char,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            terminators: vec!['。', '！', '？', '!', '?', '\n'],
            default_marker: '。',
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Orchestrator behaviour switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Emit a `history_entry` event before `Complete`.
    pub record_history: bool,
    /// Forward streamed `draft` events while the suggestion task runs.
    pub stream_suggestions: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            record_history: true,
            stream_suggestions: true,
        }
    }
}

// ---------------------------------------------------------------------------
// PromptConfig
// ---------------------------------------------------------------------------

/// Optional Markdown files replacing the built-in task instructions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub proofreader: Option<PathBuf>,
    pub analyzer: Option<PathBuf>,
    pub suggester: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use proofreader::config::AppConfig;
///
/// // Returns Default when the file is missing.
/// let config = AppConfig::load().unwrap();
/// println!("model: {}", config.llm.model);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Inference provider settings.
    pub llm: LlmConfig,
    /// Sentence splitting rules.
    pub segmenter: SegmenterConfig,
    /// Orchestrator switches.
    pub pipeline: PipelineConfig,
    /// Prompt overrides.
    pub prompts: PromptConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (the CLI's `--config`).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.llm.model, default.llm.model);
        assert_eq!(config.llm.endpoint, default.llm.endpoint);
        assert_eq!(config.segmenter.terminators, default.segmenter.terminators);
        assert_eq!(config.pipeline.record_history, default.pipeline.record_history);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.llm.endpoint, "https://api.openai.com/v1");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert!(cfg.llm.api_key.is_none());
        assert!(cfg.llm.max_tokens.is_none());
        assert!(cfg.llm.stream);
        assert!(cfg.segmenter.terminators.contains(&'。'));
        assert!(cfg.segmenter.terminators.contains(&'\n'));
        assert_eq!(cfg.segmenter.default_marker, '。');
        assert!(cfg.pipeline.record_history);
        assert!(cfg.prompts.analyzer.is_none());
    }

    /// A written settings file loads back with every modified value.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.llm.endpoint = "http://localhost:11434/v1".into();
        cfg.llm.api_key = Some("sk-test".into());
        cfg.llm.max_tokens = Some(800);
        cfg.llm.stream = false;
        cfg.segmenter.terminators = vec!['。', '.'];
        cfg.pipeline.record_history = false;
        cfg.prompts.proofreader = Some(PathBuf::from("/tmp/proofreader.md"));

        std::fs::write(&path, toml::to_string_pretty(&cfg).expect("serialise")).unwrap();
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.llm.endpoint, "http://localhost:11434/v1");
        assert_eq!(loaded.llm.api_key, Some("sk-test".into()));
        assert_eq!(loaded.llm.max_tokens, Some(800));
        assert!(!loaded.llm.stream);
        assert_eq!(loaded.segmenter.terminators, vec!['。', '.']);
        assert!(!loaded.pipeline.record_history);
        assert_eq!(
            loaded.prompts.proofreader,
            Some(PathBuf::from("/tmp/proofreader.md"))
        );
    }

    /// A file naming only some keys keeps defaults for the rest.
    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[llm]\nmodel = \"llama3.1\"\n").unwrap();

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.llm.model, "llama3.1");
        assert_eq!(loaded.llm.timeout_secs, 60);
        assert_eq!(loaded.segmenter.default_marker, '。');
    }
}
