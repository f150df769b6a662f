//! Server-sent-event decoding for streamed chat completions.
//!
//! OpenAI-compatible endpoints stream `data: {json}` lines, one per delta,
//! and finish with `data: [DONE]`. [`sse_text_stream`] turns the raw byte
//! stream into an ordered stream of text chunks. Dropping the returned
//! stream drops the underlying HTTP response.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::llm::provider::LlmError;

/// Ordered, cancellable sequence of text chunks from one completion.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Classification of one SSE line.
#[derive(Debug, PartialEq)]
pub(crate) enum SseLine<'a> {
    Data(&'a str),
    Done,
    Ignore,
}

pub(crate) fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim_end_matches('\r');
    match line.strip_prefix("data:") {
        Some(payload) => {
            let payload = payload.trim();
            if payload == "[DONE]" {
                SseLine::Done
            } else if payload.is_empty() {
                SseLine::Ignore
            } else {
                SseLine::Data(payload)
            }
        }
        // `event:`, `id:`, `: keep-alive` comments and blank separators.
        None => SseLine::Ignore,
    }
}

/// Pull the delta text out of one `data:` payload.
pub(crate) fn delta_content(payload: &str) -> Result<Option<String>, LlmError> {
    let json: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| LlmError::Parse(e.to_string()))?;

    if let Some(err) = json.get("error") {
        let message = err["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(LlmError::Stream(message));
    }

    Ok(json["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> SseState<S> {
    /// Consume every complete line in the buffer.
    fn drain_lines(&mut self) -> Result<(), LlmError> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.handle_line(&line[..line.len() - 1])?;
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        Ok(())
    }

    /// Handle a trailing line that arrived without a newline.
    fn flush(&mut self) -> Result<(), LlmError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let line = std::mem::take(&mut self.buffer);
        self.handle_line(&line)
    }

    fn handle_line(&mut self, raw: &[u8]) -> Result<(), LlmError> {
        let line = std::str::from_utf8(raw).map_err(|e| LlmError::Stream(e.to_string()))?;
        match parse_sse_line(line) {
            SseLine::Data(payload) => {
                if let Some(text) = delta_content(payload)? {
                    self.pending.push_back(text);
                }
            }
            SseLine::Done => self.finished = true,
            SseLine::Ignore => {}
        }
        Ok(())
    }
}

/// Decode an SSE byte stream into text chunks.
pub fn sse_text_stream<S, B, E>(inner: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(inner),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    st.buffer.extend_from_slice(bytes.as_ref());
                    if let Err(e) = st.drain_lines() {
                        st.finished = true;
                        st.pending.clear();
                        return Some((Err(e), st));
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.finished = true;
                    if let Err(e) = st.flush() {
                        st.pending.clear();
                        return Some((Err(e), st));
                    }
                }
            }
        }
    })
    .boxed()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
