//! Output units exchanged between the drainers, the aggregator and the
//! message listener.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Stream classification carried by fragments and messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Standard output of the shell, plus the prompt.
    Text,
    /// Standard error of the shell, plus input failure reports.
    Error,
    /// Session lifecycle notices.
    Log,
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Error => "error",
            Self::Log => "log",
        };
        f.write_str(name)
    }
}

/// A partial output chunk. Consumed only by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Buffer this fragment is appended to.
    pub kind: MessageKind,
    /// Decoded text with any sentinel removed.
    pub payload: String,
    /// Whether this fragment completes a deliverable message.
    pub flush: bool,
}

impl Fragment {
    /// A fragment that is buffered until a later flush.
    #[must_use]
    pub fn partial(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            flush: false,
        }
    }

    /// A fragment that completes the message of its kind.
    #[must_use]
    pub fn flushed(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            flush: true,
        }
    }
}

/// A complete output unit delivered to the listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Message {
    /// Stream the payload came from.
    pub kind: MessageKind,
    /// Concatenated fragment payloads since the previous flush of this kind.
    pub payload: String,
}

impl Message {
    /// Construct a message.
    #[must_use]
    pub fn new(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}
