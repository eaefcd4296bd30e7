//! Incremental decoder for newline-delimited JSON generation streams.
//!
//! The backend streams one JSON object per line:
//!
//! ```text
//! {"response":"Hel","done":false}
//! {"response":"lo","done":false}
//! {"done":true}
//! ```
//!
//! Chunks arrive on arbitrary byte boundaries, so the decoder keeps the
//! trailing partial line buffered until its newline shows up. A line that
//! fails to decode is logged and skipped; a `done` marker ends the sequence
//! and anything still buffered is discarded.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use folio_core::{DecodeError, GenerationError, TextStream};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{trace, warn};

/// One decoded line of a generation stream.
#[derive(Debug, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// What a complete line contributed to the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A non-empty text delta.
    Text(String),
    /// The completion marker. Nothing follows it.
    Done,
}

/// Buffering line decoder. Feed it raw chunks, get frames back.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the completion marker has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Append a chunk and decode every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_into(&line[..pos], &mut frames);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }

        frames
    }

    /// The byte stream ended. Decode a final unterminated line, if any.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if !self.finished {
            let rest = std::mem::take(&mut self.buffer);
            self.decode_into(&rest, &mut frames);
        }
        self.finished = true;
        self.buffer.clear();
        frames
    }

    fn decode_into(&mut self, line: &[u8], frames: &mut Vec<Frame>) {
        match decode_line(line) {
            Ok(None) => {}
            Ok(Some(frame)) => {
                if let Some(text) = frame.response.filter(|t| !t.is_empty()) {
                    frames.push(Frame::Text(text));
                }
                if frame.done {
                    self.finished = true;
                    frames.push(Frame::Done);
                }
            }
            Err(e) => warn!(error = %e, "Skipping undecodable stream line"),
        }
    }
}

fn decode_line(line: &[u8]) -> Result<Option<StreamFrame>, DecodeError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    trace!(line, "Decoding stream line");
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| DecodeError {
            line: line.to_string(),
            reason: e.to_string(),
        })
}

struct DecodeState<S> {
    inner: Pin<Box<S>>,
    decoder: NdjsonDecoder,
    pending: VecDeque<String>,
    ended: bool,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            match frame {
                Frame::Text(text) => self.pending.push_back(text),
                Frame::Done => self.ended = true,
            }
        }
    }
}

/// Turn a raw chunk stream into a lazy stream of text deltas.
///
/// The sequence ends after the `done` marker or when the chunk stream ends.
/// A transport error yields one `StreamInterrupted` item and then ends.
/// Dropping the returned stream drops `chunks`.
pub fn decode_stream<S, B, E>(chunks: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        inner: Box::pin(chunks),
        decoder: NdjsonDecoder::new(),
        pending: VecDeque::new(),
        ended: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            if state.ended {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(chunk.as_ref());
                    state.absorb(frames);
                }
                Some(Err(e)) => {
                    state.ended = true;
                    warn!(error = %e, "Generation stream interrupted");
                    return Some((
                        Err(GenerationError::StreamInterrupted(e.to_string())),
                        state,
                    ));
                }
                None => {
                    let frames = state.decoder.finish();
                    state.absorb(frames);
                    state.ended = true;
                }
            }
        }
    }))
}
