//! Message listeners.
//!
//! The aggregator hands every completed [`Message`] to exactly one
//! [`MessageListener`]. Any `Fn(Message)` closure is a listener; the
//! binary uses [`StdoutSink`] or [`JsonLinesSink`].

use std::io::Write;

use tracing::warn;

use crate::models::message::Message;

/// Consumer of completed messages.
///
/// Called from the aggregator task, one message at a time, in delivery
/// order. Implementations must not block for long.
///
/// A flush that completes an empty buffer is not delivered, so a command
/// that writes nothing to standard error produces no `error` message.
pub trait MessageListener: Send + Sync {
    /// Receive one completed message.
    fn on_message(&self, message: Message);
}

impl<F> MessageListener for F
where
    F: Fn(Message) + Send + Sync,
{
    fn on_message(&self, message: Message) {
        self(message);
    }
}

/// Writes payloads verbatim to the process's standard output.
///
/// This is the sink used when a session is built without a listener.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl MessageListener for StdoutSink {
    fn on_message(&self, message: Message) {
        let mut out = std::io::stdout().lock();
        if let Err(err) = out
            .write_all(message.payload.as_bytes())
            .and_then(|()| out.flush())
        {
            warn!(%err, kind = %message.kind, "stdout sink: write failed");
        }
    }
}

/// Writes each message as one NDJSON line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesSink;

impl MessageListener for JsonLinesSink {
    fn on_message(&self, message: Message) {
        let mut line = match serde_json::to_vec(&message) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, kind = %message.kind, "json sink: failed to serialise message");
                return;
            }
        };
        line.push(b'\n');

        let mut out = std::io::stdout().lock();
        if let Err(err) = out.write_all(&line).and_then(|()| out.flush()) {
            warn!(%err, kind = %message.kind, "json sink: write failed");
        }
    }
}
