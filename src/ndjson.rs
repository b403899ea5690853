//! Newline-delimited JSON processing for streaming chat responses.
//!
//! The model server answers a streaming chat request with one JSON object per line.
//! This module turns the raw HTTP byte stream into a stream of parsed
//! [`ChatChunk`]s, handling lines split across reads, a final unterminated line, inline
//! error objects, and stalled connections.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::observability::STREAM_BYTES;
use crate::{ChatChunk, Error, Result};

struct LineReader<S> {
    stream: S,
    buffer: Vec<u8>,
    finished: bool,
}

/// Process a stream of bytes into a stream of chat chunks.
///
/// When `idle_timeout` is set, going that long without receiving any bytes yields a
/// timeout error.  The stream ends after the first transport error or timeout.
pub fn process_ndjson<S>(
    byte_stream: S,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<ChatChunk>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    let reader = LineReader {
        stream: byte_stream,
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(reader, move |mut reader| async move {
        loop {
            if reader.finished {
                return None;
            }

            // First check if we have a complete line in the buffer
            if let Some(line) = take_line(&mut reader.buffer) {
                if is_blank(&line) {
                    continue;
                }
                return Some((decode_line(&line), reader));
            }

            // Read more data
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, reader.stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        reader.finished = true;
                        return Some((
                            Err(Error::timeout(
                                "no data received from model server",
                                Some(limit.as_secs_f64()),
                            )),
                            reader,
                        ));
                    }
                },
                None => reader.stream.next().await,
            };

            match next {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    reader.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    reader.finished = true;
                    return Some((
                        Err(Error::streaming(
                            format!("Error in HTTP stream: {e}"),
                            Some(Box::new(e)),
                        )),
                        reader,
                    ));
                }
                None => {
                    // End of stream; the last line may lack its newline
                    reader.finished = true;
                    let rest = std::mem::take(&mut reader.buffer);
                    if is_blank(&rest) {
                        return None;
                    }
                    return Some((decode_line(&rest), reader));
                }
            }
        }
    })
}

/// Removes and returns the first newline-terminated line, without the newline.
fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=end).collect();
    line.pop();
    Some(line)
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Parse a single NDJSON line into a chunk.
///
/// A line of the form `{"error": "..."}` is the server reporting a failure mid-stream.
fn decode_line(line: &[u8]) -> Result<ChatChunk> {
    let text = std::str::from_utf8(line).map_err(|e| {
        Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e)))
    })?;
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| {
        Error::serialization(
            format!("Failed to parse stream line: {e}"),
            Some(Box::new(e)),
        )
    })?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(Error::streaming(message, None));
    }
    serde_json::from_value::<ChatChunk>(value).map_err(|e| {
        Error::serialization(
            format!("Failed to parse stream chunk: {e}"),
            Some(Box::new(e)),
        )
    })
}
