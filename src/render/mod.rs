//! Markdown → HTML rendering for model output.
//!
//! The renderer is a stateless collaborator: one instance is built at
//! startup and shared by reference with every pipeline run.

use pulldown_cmark::{html, Options, Parser};
use thiserror::Error;

/// Rendering failed; the pipeline logs this and emits an empty body.
#[derive(Debug, Error)]
#[error("markdown rendering failed: {0}")]
pub struct RenderError(pub String);

/// Converts Markdown text into an HTML fragment.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;
}

/// CommonMark renderer with the GitHub-flavoured extensions (tables,
/// strikethrough, task lists, footnotes).
///
/// Raw HTML in the input is passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMarkRenderer;

impl CommonMarkRenderer {
    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES
    }
}

impl MarkdownRenderer for CommonMarkRenderer {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let parser = Parser::new_ext(markdown, Self::options());
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}
