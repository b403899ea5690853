//! Logging trait for model server traffic.
//!
//! This module provides the [`ClientLogger`] trait that allows callers to capture
//! every request and response passing through the [`Ollama`](crate::Ollama) client,
//! plus [`JsonlLogger`], which appends them to a file as JSON lines.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::types::{ChatChunk, ChatRequest, ChatResponse};

/// A trait for logging client operations.
///
/// Implementations must be cheap: the streaming hooks run once per decoded chunk.
pub trait ClientLogger: Send + Sync {
    /// Log a chat request just before it is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log a complete response from a non-streaming `send` call.
    fn log_response(&self, response: &ChatResponse);

    /// Log an individual chunk of a streamed response.
    fn log_stream_chunk(&self, chunk: &ChatChunk);

    /// Log a failed request or a failure in the middle of a stream.
    fn log_error(&self, error: &Error);
}

/// Appends one JSON object per client event to a file.
pub struct JsonlLogger {
    file: Mutex<BufWriter<File>>,
}

impl JsonlLogger {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|err| Error::io("failed to open log file", err))?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_event(&self, event: &str, body: Value) {
        let at = crate::utils::time::format(&OffsetDateTime::now_utc());
        let line = json!({"at": at, "event": event, "body": body});
        // Write failures and lock poisoning are ignored.
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
        }
    }
}

impl ClientLogger for JsonlLogger {
    fn log_request(&self, request: &ChatRequest) {
        self.write_event("request", serde_json::to_value(request).unwrap_or(Value::Null));
    }

    fn log_response(&self, response: &ChatResponse) {
        self.write_event(
            "response",
            serde_json::to_value(response).unwrap_or(Value::Null),
        );
    }

    fn log_stream_chunk(&self, chunk: &ChatChunk) {
        self.write_event("chunk", serde_json::to_value(chunk).unwrap_or(Value::Null));
    }

    fn log_error(&self, error: &Error) {
        self.write_event("error", Value::String(error.to_string()));
    }
}
