use super::sink::TraceSink;
use crate::error::BackendError;
use crate::llm::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, Level};

/// Target of the events that carry trace records
pub const TRICOT_CHANNEL: &str = "TRICOT";

/// One intercepted exchange: the forwarded messages followed by the reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Start of the call, seconds since the Unix epoch
    pub timestamp: f64,
    pub messages: Vec<ChatMessage>,
}

impl TraceRecord {
    pub fn new(timestamp: f64, forwarded: Vec<ChatMessage>, reply: ChatMessage) -> Self {
        let mut messages = forwarded;
        messages.push(reply);
        Self {
            timestamp,
            messages,
        }
    }

    /// The model reply, always the last message
    pub fn reply(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Serializes the record as a single line of JSON
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Appends the record to the open file of `sink` and publishes it as an
    /// INFO event with target `TRICOT`
    ///
    /// The file write does not depend on any `tracing` subscriber; the event is
    /// only a feed for whatever subscriber the host runs. Returns whether a file
    /// received the line.
    pub fn emit(&self, sink: &TraceSink) -> Result<bool, BackendError> {
        let line = self
            .to_json_line()
            .map_err(|e| BackendError::Serialization {
                message: e.to_string(),
            })?;

        let written = if sink.accepts(&Level::INFO) {
            sink.write_line(&line)
                .map_err(|e| BackendError::TraceWrite {
                    message: e.to_string(),
                })?
        } else {
            false
        };

        info!(target: TRICOT_CHANNEL, "{}", line);
        Ok(written)
    }
}

/// Fractional seconds since the Unix epoch
pub fn epoch_seconds(now: DateTime<Utc>) -> f64 {
    now.timestamp_micros() as f64 / 1_000_000.0
}
