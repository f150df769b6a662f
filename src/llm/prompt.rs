//! System prompts for the proofreading, analysis and suggestion tasks.
//!
//! [`PromptSet`] holds the three task instructions. Each one ships with a
//! built-in default and can be replaced by a Markdown file named in
//! [`PromptConfig`]. The repair instruction is generated per call from the
//! malformed response it has to fix.

use anyhow::{Context, Result};

use std::path::{Path, PathBuf};

use crate::config::{AppPaths, PromptConfig};

// ---------------------------------------------------------------------------
// Built-in instructions
// ---------------------------------------------------------------------------

/// Per-sentence proofreading. The reply must be one JSON record.
const PROOFREADER_INSTRUCTION: &str = "\
You are a Japanese (日本語) tutor reviewing one sentence written by a student.
Write every explanation in English.

Reply with exactly one JSON object and nothing else:
{
  \"original_sentence\": \"<the sentence exactly as the student wrote it>\",
  \"corrected_sentence\": \"<the corrected sentence, or the original if it is already correct>\",
  \"error_details\": \"<what is wrong, or an empty string>\",
  \"reason\": \"<why: the grammar rule, or the meaning of the misused word and the word the student wanted>\",
  \"misused_words\": [\"<each misused word or particle>\"]
}";

/// Whole-text analysis over the corrected sentences. The reply is Markdown.
const ANALYZER_INSTRUCTION: &str = "\
You are a Japanese (日本語) tutor. The user message is a short text that has
already been corrected sentence by sentence.
Write in English, formatted as Markdown:
1. A one-paragraph summary of what the text says.
2. Notes on register and naturalness (politeness level, word choice, flow).
3. Up to three concrete suggestions that would make the text sound more natural.";

/// Free-form suggestions over the whole prompt. The reply is Markdown.
const SUGGESTER_INSTRUCTION: &str = "\
You are a helpful assistant that helps students review and proofread their
Japanese (日本語) writing. Respond in English, formatted as Markdown.
Break the text into individual sentences and list the specific mistakes in
each one with an explanation.
If a mistake is grammatical, give the specific reason the grammar is wrong.
If a mistake is vocabulary, give a short definition of the misused word and
the word the student most likely wanted.
Finish each sentence with a corrected version.";

// ---------------------------------------------------------------------------
// PromptSet
// ---------------------------------------------------------------------------

/// Task instructions used by the pipeline.
///
/// # Example
/// ```rust
/// use proofreader::llm::PromptSet;
///
/// let prompts = PromptSet::default();
/// let repair = prompts.repair_instruction("not json");
/// assert!(repair.contains("not json"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub proofreader: String,
    pub analyzer: String,
    pub suggester: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            proofreader: PROOFREADER_INSTRUCTION.to_string(),
            analyzer: ANALYZER_INSTRUCTION.to_string(),
            suggester: SUGGESTER_INSTRUCTION.to_string(),
        }
    }
}

impl PromptSet {
    /// Built-in prompts, with any file overrides from `config` applied.
    ///
    /// Relative override paths are resolved against the `prompts/` folder
    /// of the config directory.
    pub fn from_config(config: &PromptConfig) -> Result<Self> {
        Self::from_config_in(config, &AppPaths::new().prompts_dir)
    }

    fn from_config_in(config: &PromptConfig, prompts_dir: &Path) -> Result<Self> {
        let mut prompts = Self::default();
        let overrides = [
            (&config.proofreader, &mut prompts.proofreader),
            (&config.analyzer, &mut prompts.analyzer),
            (&config.suggester, &mut prompts.suggester),
        ];
        for (path, slot) in overrides {
            if let Some(path) = path {
                let path = resolve(prompts_dir, path);
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading prompt file {}", path.display()))?;
                let text = text.trim();
                if text.is_empty() {
                    log::warn!("prompt file {} is empty; keeping built-in prompt", path.display());
                    continue;
                }
                *slot = text.to_string();
            }
        }
        Ok(prompts)
    }

    /// Instruction for the one-shot repair call.
    ///
    /// Embeds the previous raw response and demands the same record shape
    /// as strict JSON.
    pub fn repair_instruction(&self, previous_raw: &str) -> String {
        format!(
            "Your previous reply could not be parsed as JSON.\n\
             Previous reply:\n\
             <<<\n{previous_raw}\n>>>\n\n\
             Re-send the same analysis of the user's sentence as a minimal, exact JSON object \
             with exactly these keys and nothing before or after it:\n\
             {{\"original_sentence\": string, \"corrected_sentence\": string, \
             \"error_details\": string, \"reason\": string, \"misused_words\": [string]}}\n\
             Output only the JSON object. No Markdown, no code fences, no commentary."
        )
    }
}

fn resolve(prompts_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        prompts_dir.join(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn proofreader_prompt_names_every_record_field() {
        let prompts = PromptSet::default();
        for key in [
            "original_sentence",
            "corrected_sentence",
            "error_details",
            "reason",
            "misused_words",
        ] {
            assert!(prompts.proofreader.contains(key), "missing key {key}");
        }
    }

    #[test]
    fn repair_instruction_embeds_previous_reply() {
        let prompts = PromptSet::default();
        let repair = prompts.repair_instruction("Sure! Here is the analysis: ...");

        assert!(repair.contains("Sure! Here is the analysis: ..."));
        assert!(repair.contains("JSON"));
        assert!(repair.contains("misused_words"));
    }

    #[test]
    fn file_overrides_replace_builtins() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("analyzer.md");
        std::fs::write(&path, "  Custom analyzer prompt.\n").unwrap();

        let config = PromptConfig {
            analyzer: Some(path),
            ..PromptConfig::default()
        };
        let prompts = PromptSet::from_config(&config).unwrap();

        assert_eq!(prompts.analyzer, "Custom analyzer prompt.");
        assert_eq!(prompts.proofreader, PromptSet::default().proofreader);
    }

    #[test]
    fn empty_override_keeps_builtin() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("suggester.md");
        std::fs::write(&path, "\n\n").unwrap();

        let config = PromptConfig {
            suggester: Some(path),
            ..PromptConfig::default()
        };
        let prompts = PromptSet::from_config(&config).unwrap();
        assert_eq!(prompts.suggester, PromptSet::default().suggester);
    }

    #[test]
    fn missing_override_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let config = PromptConfig {
            proofreader: Some(dir.path().join("absent.md")),
            ..PromptConfig::default()
        };
        assert!(PromptSet::from_config(&config).is_err());
    }

    #[test]
    fn relative_override_resolves_in_prompts_dir() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("proofreader.md"), "Relative prompt.").unwrap();

        let config = PromptConfig {
            proofreader: Some(PathBuf::from("proofreader.md")),
            ..PromptConfig::default()
        };
        let prompts = PromptSet::from_config_in(&config, dir.path()).unwrap();
        assert_eq!(prompts.proofreader, "Relative prompt.");
    }
}
