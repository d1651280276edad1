//! Shared helpers for session-level integration tests.
//!
//! Sessions run on a spawned task against a real `sh`, read commands from
//! an in-memory duplex pipe and report messages over an unbounded channel,
//! so tests can interleave writing input with waiting for output.

use std::sync::Arc;
use std::time::Duration;

use autoshell::{Message, MessageKind, MessageListener, Result, Session, ShellConfig};
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Upper bound on any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(10);

/// Prompt used by the default configuration.
pub fn prompt() -> Message {
    Message::new(MessageKind::Text, ShellConfig::default().prompt)
}

/// A running session wired to test-controlled input and output.
pub struct Harness {
    /// Write end of the session's input.
    pub input: Option<DuplexStream>,
    /// Messages delivered by the session.
    pub messages: mpsc::UnboundedReceiver<Message>,
    /// The session task; yields the session back with its result.
    pub task: JoinHandle<(Session, Result<()>)>,
}

/// Listener forwarding every message onto a channel.
pub fn channel_listener() -> (Arc<dyn MessageListener>, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener: Arc<dyn MessageListener> = Arc::new(move |message: Message| {
        let _ = tx.send(message);
    });
    (listener, rx)
}

impl Harness {
    /// Start a session with `config`.
    pub fn start(config: ShellConfig) -> Self {
        let (listener, messages) = channel_listener();
        let session = Session::new(config, Some(listener));
        Self::start_session(session, messages)
    }

    /// Start an already-constructed session.
    pub fn start_session(
        mut session: Session,
        messages: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        let (writer, reader) = tokio::io::duplex(4096);
        let task = tokio::spawn(async move {
            let result = session.run(BufReader::new(reader)).await;
            (session, result)
        });
        Self {
            input: Some(writer),
            messages,
            task,
        }
    }

    /// Write raw input to the session.
    pub async fn send(&mut self, raw: &str) {
        let input = self.input.as_mut().expect("input still open");
        input.write_all(raw.as_bytes()).await.expect("write input");
        input.flush().await.expect("flush input");
    }

    /// Close the input, signalling end of file to the session.
    pub fn close_input(&mut self) {
        self.input = None;
    }

    /// Receive the next message, failing the test after [`WAIT`].
    pub async fn next_message(&mut self) -> Message {
        tokio::time::timeout(WAIT, self.messages.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("message channel closed")
    }

    /// Collect messages until `done` holds for the collection.
    pub async fn collect_until(&mut self, done: impl Fn(&[Message]) -> bool) -> Vec<Message> {
        let mut seen = Vec::new();
        while !done(&seen) {
            seen.push(self.next_message().await);
        }
        seen
    }

    /// Wait for the session task and return the session and its result.
    pub async fn finish(self) -> (Session, Result<()>, Vec<Message>) {
        let Self {
            input,
            mut messages,
            task,
        } = self;
        let (session, result) = tokio::time::timeout(WAIT, task)
            .await
            .expect("timed out waiting for the session")
            .expect("session task panicked");
        drop(input);

        let mut rest = Vec::new();
        while let Ok(message) = messages.try_recv() {
            rest.push(message);
        }
        (session, result, rest)
    }
}

/// Number of prompts in `messages`.
pub fn prompt_count(messages: &[Message]) -> usize {
    let prompt = prompt();
    messages.iter().filter(|message| **message == prompt).count()
}

/// Messages other than prompts, in order.
pub fn without_prompts(messages: &[Message]) -> Vec<Message> {
    let prompt = prompt();
    messages
        .iter()
        .filter(|message| **message != prompt)
        .cloned()
        .collect()
}
