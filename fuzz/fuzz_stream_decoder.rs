//! Fuzz target for the incremental stream decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_stream_decoder
//!
//! The first two bytes pick a split point; the rest is the response body.
//! Decoding the body in two pieces must never panic and must give the same
//! increments as decoding it in one piece.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_core::llm::{Chunk, Framing, StreamDecoder};

fn parse(payload: &str) -> Result<Chunk, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    Ok(Chunk {
        texts: value
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .into_iter()
            .collect(),
        finished: value.get("done").and_then(|d| d.as_bool()).unwrap_or(false),
        failure: value
            .get("error")
            .and_then(|e| e.as_str())
            .map(str::to_string),
    })
}

fn decode(framing: Framing, pieces: &[&[u8]]) -> Vec<String> {
    let mut decoder = StreamDecoder::new(framing);
    let mut out = Vec::new();
    for piece in pieces {
        let step = decoder.feed(piece);
        out.extend(step.increments);
        if let Some(failure) = step.failure {
            out.push(format!("error: {failure}"));
        }
    }
    let tail = decoder.finish();
    out.extend(tail.increments);
    if let Some(failure) = tail.failure {
        out.push(format!("error: {failure}"));
    }
    out
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let split = u16::from_le_bytes([data[0], data[1]]) as usize;
    let body = &data[2..];
    let split = split.min(body.len());

    for framing in [
        Framing::event_stream(Some("[DONE]"), parse),
        Framing::json_lines(parse),
    ] {
        let whole = decode(framing, &[body]);
        let halves = decode(framing, &[&body[..split], &body[split..]]);
        assert_eq!(whole, halves);
    }
});
