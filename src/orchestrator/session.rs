//! Session controller.
//!
//! A [`Session`] owns one run of the engine: it emits the start-up prompt,
//! starts the aggregator and the shell host, forwards input lines to the
//! feeder and, when input ends or a terminal command arrives, shuts every
//! worker down in order and waits for all of them.
//!
//! Shutdown waits for the shell to exit and for both output pipes to reach
//! end-of-stream before the aggregator is told to stop, so output of every
//! command sent ahead of the terminal one is delivered. Output left without
//! a closing sentinel stays partial and is discarded.
//!
//! ```text
//! Idle ──run()──▶ Running ──terminal / EOF / host exit──▶ Draining ──joined──▶ Closed
//! ```
//!
//! Sessions are single-shot: calling [`Session::run`] on a session that has
//! already left `Idle` fails with `AppError::Session`.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ShellConfig;
use crate::models::command::Command;
use crate::models::message::{Fragment, MessageKind};
use crate::orchestrator::aggregator::{run_aggregator, AggregatorEvent};
use crate::orchestrator::listener::{MessageListener, StdoutSink};
use crate::shell::host::{run_host, HostContext};
use crate::shell::protocol::SyncProtocol;
use crate::{AppError, Result};

/// Prefix of the error message reported when the input source fails.
pub const INPUT_ERROR_PREFIX: &str = "[auto-shell] Error: ";

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, not yet run.
    Idle,
    /// Shell host started, accepting input.
    Running,
    /// No more input; waiting for the shell to exit and its pipes to close.
    Draining,
    /// Every worker has finished. Terminal.
    Closed,
}

/// One interactive shell session.
pub struct Session {
    config: Arc<ShellConfig>,
    protocol: Arc<SyncProtocol>,
    listener: Arc<dyn MessageListener>,
    state_tx: watch::Sender<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("signature", &self.protocol.signature())
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session with a fresh signature.
    ///
    /// Messages go to `listener`, or to [`StdoutSink`] when `None`.
    #[must_use]
    pub fn new(config: ShellConfig, listener: Option<Arc<dyn MessageListener>>) -> Self {
        let listener = listener.unwrap_or_else(|| Arc::new(StdoutSink));
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            config: Arc::new(config),
            protocol: Arc::new(SyncProtocol::generate()),
            listener,
            state_tx,
        }
    }

    /// The session's unique signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        self.protocol.signature()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Observe lifecycle transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Run the session reading command lines from the process's stdin.
    ///
    /// # Errors
    ///
    /// See [`Session::run`].
    pub async fn run_stdin(&mut self) -> Result<()> {
        self.run(BufReader::new(tokio::io::stdin())).await
    }

    /// Run the session to completion, reading command lines from `input`.
    ///
    /// Returns once the shell has exited and every worker has finished.
    ///
    /// # Errors
    ///
    /// - `AppError::Session`: the session has already been run.
    /// - `AppError::Spawn`: the shell could not be started.
    /// - `AppError::Shell`: the shell could not be awaited, or exited
    ///   unsuccessfully while the session was running.
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        if self.state() != SessionState::Idle {
            return Err(AppError::Session(
                "session already ran; sessions cannot be restarted".into(),
            ));
        }
        self.config.validate()?;

        let span = info_span!("session", signature = self.protocol.signature());
        self.drive(input).instrument(span).await
    }

    async fn drive<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let capacity = self.config.queue_capacity;
        let (fragment_tx, fragment_rx) = mpsc::channel(capacity);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let draining = CancellationToken::new();
        let tracker = TaskTracker::new();

        let aggregator = tracker.spawn(
            run_aggregator(
                fragment_rx,
                Arc::clone(&self.listener),
                self.config.flush_partial_on_close,
            )
            .in_current_span(),
        );

        emit(
            &fragment_tx,
            Fragment::flushed(MessageKind::Text, self.config.prompt.clone()),
        )
        .await;
        if self.config.lifecycle_messages {
            emit(
                &fragment_tx,
                Fragment::flushed(MessageKind::Log, "session started\n"),
            )
            .await;
        }

        let ctx = HostContext {
            config: Arc::clone(&self.config),
            protocol: Arc::clone(&self.protocol),
            command_rx,
            fragment_tx: fragment_tx.clone(),
            draining: draining.clone(),
        };
        let mut host: JoinHandle<Result<()>> =
            tracker.spawn(run_host(ctx, tracker.clone()).in_current_span());
        self.state_tx.send_replace(SessionState::Running);
        info!("session running");

        let mut lines = input.lines();
        let mut host_result = None;

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(raw)) => {
                        let Some(command) = Command::parse(&raw) else {
                            continue;
                        };
                        let terminal = command.is_terminal();
                        if command_tx.send(command).await.is_err() {
                            warn!("command queue closed, leaving the command loop");
                            break;
                        }
                        if terminal {
                            info!("terminal command received, leaving the command loop");
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("input exhausted, leaving the command loop");
                        break;
                    }
                    Err(err) => {
                        error!(%err, "failed to read input");
                        emit(
                            &fragment_tx,
                            Fragment::flushed(
                                MessageKind::Error,
                                format!("{INPUT_ERROR_PREFIX}{err}\n"),
                            ),
                        )
                        .await;
                        break;
                    }
                },
                joined = &mut host => {
                    info!("shell host finished, leaving the command loop");
                    host_result = Some(flatten(joined));
                    break;
                }
            }
        }

        // ── Ordered shutdown ───────────────────────────────
        draining.cancel();
        self.state_tx.send_replace(SessionState::Draining);

        debug!("closing command queue");
        drop(command_tx);

        // The host finishes only once the shell has exited and both
        // drainers have queued everything they read.
        let result = match host_result {
            Some(result) => result,
            None => flatten(host.await),
        };

        if self.config.lifecycle_messages {
            emit(
                &fragment_tx,
                Fragment::flushed(MessageKind::Log, "session closing\n"),
            )
            .await;
        }
        debug!("signalling aggregator shutdown");
        if fragment_tx.send(AggregatorEvent::Shutdown).await.is_err() {
            debug!("aggregator already stopped");
        }
        drop(fragment_tx);

        debug!("waiting for session workers");
        tracker.close();
        tracker.wait().await;

        match aggregator.await {
            Ok(stats) => info!(
                delivered = stats.delivered,
                discarded = stats.discarded,
                "session output settled"
            ),
            Err(err) => warn!(%err, "aggregator task failed"),
        }

        self.state_tx.send_replace(SessionState::Closed);
        match &result {
            Ok(()) => info!("session closed"),
            Err(err) => error!(%err, "session closed after a fatal shell failure"),
        }
        result
    }
}

/// Queue a controller-produced fragment for the aggregator.
async fn emit(fragment_tx: &mpsc::Sender<AggregatorEvent>, fragment: Fragment) {
    if fragment_tx
        .send(AggregatorEvent::Fragment(fragment))
        .await
        .is_err()
    {
        debug!("aggregator closed, fragment dropped");
    }
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|err| AppError::Shell(format!("shell host task failed: {err}")))?
}
