//! Configuration module for the proofreader.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the provider,
//! segmenter, pipeline and prompts, `AppPaths` for the platform config
//! directory, and TOML loading via `AppConfig::load` / `AppConfig::load_from`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, LlmConfig, PipelineConfig, PromptConfig, SegmenterConfig};
