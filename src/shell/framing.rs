//! Conversion of raw pipe reads into fragments.
//!
//! The framer is the pure half of a drainer: it knows the sentinel, the
//! read capacity and the stream kind, and turns each chunk returned by one
//! `read` call into the fragments that chunk produces. Keeping it free of
//! I/O lets the boundary rules be exercised without a subprocess.
//!
//! # Rules, per chunk
//!
//! | Situation                                   | Fragments emitted                                   |
//! |---------------------------------------------|-----------------------------------------------------|
//! | text before each sentinel occurrence        | flushed fragment (sentinel removed)                 |
//! | flush on the stdout stream                  | extra flushed prompt fragment                       |
//! | text after the last sentinel                | partial fragment, if non-empty                      |
//! | trailing bytes that could start a sentinel  | held back until the next read                       |
//! | short read, no sentinel, not ending in `\n` | extra flushed `"\n"` fragment (heuristic)           |
//!
//! With newline synthesis on, every flushed message ends in exactly one
//! `\n`, whether or not the missing newline belongs to this read.

use crate::models::message::{Fragment, MessageKind};

/// Per-stream framing state.
#[derive(Debug, Clone)]
pub struct OutputFramer {
    kind: MessageKind,
    capacity: usize,
    sentinel: String,
    prompt: Option<String>,
    synthesize_newline: bool,
    /// Trailing bytes of an incomplete UTF-8 sequence from the previous read.
    carry: Vec<u8>,
    /// Decoded text that may be the start of a sentinel split across reads.
    held: String,
    /// Whether partial output is pending since the last flush, and if so
    /// whether it ended in a newline.
    open_tail: Option<bool>,
}

impl OutputFramer {
    /// Create a framer for one stream.
    ///
    /// `capacity` must match the drainer's read buffer size; it decides
    /// which reads count as short.
    #[must_use]
    pub fn new(kind: MessageKind, capacity: usize, sentinel: impl Into<String>) -> Self {
        Self {
            kind,
            capacity,
            sentinel: sentinel.into(),
            prompt: None,
            synthesize_newline: true,
            carry: Vec::new(),
            held: String::new(),
            open_tail: None,
        }
    }

    /// Emit `prompt` as a flushed text fragment after every flush.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Toggle the newline synthesis heuristic.
    #[must_use]
    pub fn with_newline_synthesis(mut self, enabled: bool) -> Self {
        self.synthesize_newline = enabled;
        self
    }

    /// Stream kind this framer tags fragments with.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Read capacity this framer was configured with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Turn one read into fragments.
    #[must_use]
    pub fn frame(&mut self, chunk: &[u8]) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        if chunk.is_empty() {
            return fragments;
        }

        let short_read = chunk.len() < self.capacity;
        let mut text = std::mem::take(&mut self.held);
        text.push_str(&self.decode(chunk));
        let mut rest = text.as_str();
        let mut saw_sentinel = false;

        while let Some(index) = rest.find(&self.sentinel) {
            saw_sentinel = true;
            let mut payload = rest[..index].to_owned();
            if self.needs_newline(&payload) {
                payload.push('\n');
            }
            self.open_tail = None;
            fragments.push(Fragment::flushed(self.kind, payload));

            if let Some(prompt) = &self.prompt {
                fragments.push(Fragment::flushed(MessageKind::Text, prompt.clone()));
            }

            rest = &rest[index + self.sentinel.len()..];
        }

        let (emit, held) = rest.split_at(rest.len() - self.sentinel_prefix_len(rest));
        self.held = held.to_owned();

        if !emit.is_empty() {
            fragments.push(Fragment::partial(self.kind, emit));
            self.open_tail = Some(emit.ends_with('\n'));

            if self.synthesize_newline
                && short_read
                && !saw_sentinel
                && self.held.is_empty()
                && !emit.ends_with('\n')
            {
                fragments.push(Fragment::flushed(self.kind, "\n"));
                self.open_tail = None;
            }
        }

        fragments
    }

    /// Release whatever is still held back once the stream has ended.
    ///
    /// Returns the held text as a partial fragment, or `None` when nothing
    /// is pending.
    pub fn finish(&mut self) -> Option<Fragment> {
        let mut text = std::mem::take(&mut self.held);
        text.push_str(&String::from_utf8_lossy(&std::mem::take(&mut self.carry)));
        if text.is_empty() {
            return None;
        }
        self.open_tail = Some(text.ends_with('\n'));
        Some(Fragment::partial(self.kind, text))
    }

    /// Whether a flush closing `payload` must append a newline so the whole
    /// message ends in one.
    fn needs_newline(&self, payload: &str) -> bool {
        if !self.synthesize_newline {
            return false;
        }
        if payload.is_empty() {
            self.open_tail == Some(false)
        } else {
            !payload.ends_with('\n')
        }
    }

    /// Length of the longest suffix of `text` that is a proper prefix of
    /// the sentinel.
    fn sentinel_prefix_len(&self, text: &str) -> usize {
        let longest = text.len().min(self.sentinel.len().saturating_sub(1));
        (1..=longest)
            .rev()
            .find(|&len| {
                self.sentinel
                    .get(..len)
                    .is_some_and(|prefix| text.ends_with(prefix))
            })
            .unwrap_or(0)
    }

    /// Decode `chunk` as UTF-8, holding back an incomplete trailing
    /// sequence for the next read. Invalid bytes are replaced.
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.carry.extend_from_slice(chunk);

        let complete = match std::str::from_utf8(&self.carry) {
            Ok(_) => self.carry.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => self.carry.len(),
        };

        let tail = self.carry.split_off(complete);
        let text = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry = tail;
        text
    }
}
