//! Sentence-level proofreading and writing suggestions over any
//! OpenAI-compatible chat endpoint.

pub mod config;
pub mod llm;
pub mod pipeline;
pub mod render;
