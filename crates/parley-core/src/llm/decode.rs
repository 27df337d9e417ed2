//! Incremental decoding of streamed response bodies.
//!
//! Backends deliver their replies as a byte stream cut at arbitrary points:
//! a chunk may end inside a multi-byte character or halfway through a
//! record. Decoding happens in three layers, each usable on its own:
//!
//! ```text
//! bytes ──▶ Utf8Decoder ──▶ LineBuffer ──▶ Framing (prefix, marker, parse) ──▶ text
//! ```
//!
//! [`StreamDecoder`] stacks the three for one call, and [`decode_stream`]
//! wraps it around any byte stream to produce a [`TextStream`].

use std::fmt::Display;

use futures_util::{Stream, StreamExt};
use tracing::{trace, warn};

use super::provider::{ProviderError, TextStream};

/// Incremental UTF-8 decoder.
///
/// Carries an incomplete trailing sequence (at most 3 bytes) over to the
/// next call. Bytes that can never form a valid sequence become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (after any carried-over prefix) as possible.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        out.push_str(valid);
                    }
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush a dangling partial sequence as U+FFFD.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    /// Number of carried-over bytes.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Accumulates decoded text and hands out complete lines.
///
/// Between calls the buffer holds nothing but the unterminated tail of the
/// last record.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Remove and return the next complete line, without its `\n` or `\r\n`.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buf.find('\n')?;
        let mut line: String = self.buf.drain(..=end).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// Take whatever is left, terminated or not.
    pub fn take_rest(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }

    /// The unterminated tail currently held.
    pub fn pending(&self) -> &str {
        &self.buf
    }
}

/// What one decoded record contributed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Text increments, in order. Empty strings are dropped by the decoder.
    pub texts: Vec<String>,
    /// The record itself says the stream is over.
    pub finished: bool,
    /// The record is an error report from the backend. Ends the stream.
    pub failure: Option<String>,
}

impl Chunk {
    /// A record that carries no text (pings, metadata, usage).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            texts: vec![text.into()],
            ..Self::default()
        }
    }

    pub fn finished() -> Self {
        Self {
            finished: true,
            ..Self::default()
        }
    }

    /// A backend-reported error, e.g. an `error` event mid-stream.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            finished: true,
            failure: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Parses one record payload.
pub type ParseFn = fn(&str) -> Result<Chunk, serde_json::Error>;

/// How a backend frames its stream.
#[derive(Clone, Copy)]
pub struct Framing {
    /// Prefix every data record carries, e.g. `data:`. Lines without it are
    /// skipped. `None` means every line is a payload.
    pub prefix: Option<&'static str>,
    /// Payload that ends the stream normally, e.g. `[DONE]`.
    pub done_marker: Option<&'static str>,
    pub parse: ParseFn,
}

impl Framing {
    /// Event-stream framing: `data:` records, optionally ended by a marker.
    pub const fn event_stream(done_marker: Option<&'static str>, parse: ParseFn) -> Self {
        Self {
            prefix: Some("data:"),
            done_marker,
            parse,
        }
    }

    /// One bare JSON document per line.
    pub const fn json_lines(parse: ParseFn) -> Self {
        Self {
            prefix: None,
            done_marker: None,
            parse,
        }
    }
}

/// Result of feeding one chunk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Step {
    pub increments: Vec<String>,
    /// The stream ended; anything fed afterwards is ignored.
    pub done: bool,
    /// Set when the stream ended because the backend reported an error.
    pub failure: Option<String>,
}

/// Per-call decoder state: UTF-8 carry, line buffer, and framing.
pub struct StreamDecoder {
    framing: Framing,
    utf8: Utf8Decoder,
    lines: LineBuffer,
    done: bool,
    failure: Option<String>,
}

impl StreamDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            utf8: Utf8Decoder::new(),
            lines: LineBuffer::new(),
            done: false,
            failure: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode one chunk of the body.
    pub fn feed(&mut self, bytes: &[u8]) -> Step {
        let mut step = Step::default();
        if !self.done {
            let text = self.utf8.decode(bytes);
            self.lines.push(&text);
            self.drain_lines(&mut step.increments);
        }
        step.done = self.done;
        step.failure = self.failure.take();
        step
    }

    /// Flush the unterminated remainder at end of input.
    pub fn finish(&mut self) -> Step {
        let mut step = Step {
            done: true,
            ..Step::default()
        };
        if self.done {
            return step;
        }
        let tail = self.utf8.finish();
        self.lines.push(&tail);
        self.drain_lines(&mut step.increments);
        if !self.done {
            let rest = self.lines.take_rest();
            self.process_line(&rest, &mut step.increments);
        }
        self.done = true;
        step.failure = self.failure.take();
        step
    }

    fn drain_lines(&mut self, out: &mut Vec<String>) {
        while let Some(line) = self.lines.next_line() {
            if self.process_line(&line, out) {
                self.done = true;
                self.lines.take_rest();
                break;
            }
        }
    }

    /// Returns true when the line ends the stream.
    fn process_line(&mut self, line: &str, out: &mut Vec<String>) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }

        let payload = match self.framing.prefix {
            Some(prefix) => match line.strip_prefix(prefix) {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
                None => {
                    trace!(line, "skipping non-data line");
                    return false;
                }
            },
            None => line,
        };

        if self.framing.done_marker == Some(payload) {
            return true;
        }

        match (self.framing.parse)(payload) {
            Ok(chunk) => {
                out.extend(chunk.texts.into_iter().filter(|t| !t.is_empty()));
                if chunk.failure.is_some() {
                    self.failure = chunk.failure;
                    return true;
                }
                chunk.finished
            }
            Err(err) => {
                warn!(error = %err, record = payload, "skipping malformed stream record");
                false
            }
        }
    }
}

/// Turn a byte stream into a lazy stream of text increments.
///
/// Nothing is read from `source` until the returned stream is polled. A
/// source error is reported once as [`ProviderError::Network`] and ends the
/// stream. An error record from the backend ends it the same way, as
/// [`ProviderError::Stream`].
pub fn decode_stream<S, B, E>(source: S, framing: Framing) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut source = Box::pin(source);
        let mut decoder = StreamDecoder::new(framing);
        let mut failed = false;

        while let Some(item) = source.next().await {
            let step = match item {
                Ok(bytes) => {
                    trace!(len = bytes.as_ref().len(), "received stream chunk");
                    decoder.feed(bytes.as_ref())
                }
                Err(err) => {
                    failed = true;
                    yield Err(ProviderError::Network(err.to_string()));
                    break;
                }
            };
            for text in step.increments {
                yield Ok(text);
            }
            if let Some(message) = step.failure {
                failed = true;
                yield Err(ProviderError::Stream(message));
                break;
            }
            if step.done {
                break;
            }
        }

        if !failed {
            let step = decoder.finish();
            for text in step.increments {
                yield Ok(text);
            }
            if let Some(message) = step.failure {
                yield Err(ProviderError::Stream(message));
            }
        }
    })
}
