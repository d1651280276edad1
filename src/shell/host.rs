//! Shell process host.
//!
//! Spawns the shell with all three standard streams piped and
//! `kill_on_drop(true)`, starts the feeder and both drainers on the
//! session's [`TaskTracker`], then waits for the shell to exit and for
//! both output pipes to close.
//!
//! Failing to start the shell or to capture a pipe is fatal for the session:
//! the error is returned to the controller and never delivered to the
//! listener.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ShellConfig;
use crate::models::command::Command as ShellCommand;
use crate::models::message::MessageKind;
use crate::orchestrator::aggregator::AggregatorEvent;
use crate::shell::drainer::run_drainer;
use crate::shell::feeder::run_feeder;
use crate::shell::framing::OutputFramer;
use crate::shell::protocol::SyncProtocol;
use crate::{AppError, Result};

// ── Process handle ───────────────────────────────────────────────────────────

/// A running shell and its three pipes.
#[derive(Debug)]
pub struct ShellProcess {
    /// Child process handle. Dropping it kills the shell.
    pub child: Child,
    /// Write end of the shell's standard input.
    pub stdin: ChildStdin,
    /// Read end of the shell's standard output.
    pub stdout: ChildStdout,
    /// Read end of the shell's standard error.
    pub stderr: ChildStderr,
}

/// Spawn the configured shell with piped standard streams.
///
/// # Errors
///
/// - `AppError::Spawn("failed to spawn shell …")`: OS spawn failure.
/// - `AppError::Spawn("failed to capture shell …")`: a pipe is missing.
pub fn spawn_shell(config: &ShellConfig) -> Result<ShellProcess> {
    let mut cmd = Command::new(&config.shell);
    cmd.args(&config.shell_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        AppError::Spawn(format!("failed to spawn shell `{}`: {err}", config.shell))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture shell stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture shell stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture shell stderr".into()))?;

    info!(shell = %config.shell, pid = child.id(), "shell spawned");

    Ok(ShellProcess {
        child,
        stdin,
        stdout,
        stderr,
    })
}

// ── Host task ────────────────────────────────────────────────────────────────

/// Everything the host hands to the workers it starts.
#[derive(Debug)]
pub struct HostContext {
    /// Session configuration.
    pub config: Arc<ShellConfig>,
    /// Session markers.
    pub protocol: Arc<SyncProtocol>,
    /// Commands accepted by the controller.
    pub command_rx: mpsc::Receiver<ShellCommand>,
    /// Producer handle onto the aggregator queue, cloned for each drainer.
    pub fragment_tx: mpsc::Sender<AggregatorEvent>,
    /// Cancelled once the session stops sending work to the shell.
    pub draining: CancellationToken,
}

/// Host task: spawn the shell, start its workers and await its exit.
///
/// The feeder and both drainers run on `tracker`, so the session's join
/// barrier covers them as well as this task. The task returns only after
/// the shell has exited and both drainers have reached end-of-stream, so
/// every fragment the shell produced is queued by then.
///
/// # Errors
///
/// - `AppError::Spawn`: see [`spawn_shell`].
/// - `AppError::Shell`: waiting failed, or the shell exited unsuccessfully
///   before `draining` was cancelled.
pub async fn run_host(ctx: HostContext, tracker: TaskTracker) -> Result<()> {
    let HostContext {
        config,
        protocol,
        command_rx,
        fragment_tx,
        draining,
    } = ctx;

    let ShellProcess {
        mut child,
        stdin,
        stdout,
        stderr,
    } = spawn_shell(&config)?;

    let feeder_protocol = Arc::clone(&protocol);
    let feeder_draining = draining.clone();
    tracker.spawn(async move {
        if let Err(err) = run_feeder(stdin, command_rx, feeder_protocol, feeder_draining).await {
            warn!(%err, "command feeder stopped");
        }
    });

    let stdout_framer = OutputFramer::new(
        MessageKind::Text,
        config.framing.stdout_buffer_bytes,
        protocol.sentinel(),
    )
    .with_prompt(config.prompt.clone())
    .with_newline_synthesis(config.framing.synthesize_newline);
    let stdout_drainer = tracker.spawn(run_drainer(stdout, stdout_framer, fragment_tx.clone()));

    let stderr_framer = OutputFramer::new(
        MessageKind::Error,
        config.framing.stderr_buffer_bytes,
        protocol.sentinel(),
    )
    .with_newline_synthesis(config.framing.synthesize_newline);
    let stderr_drainer = tracker.spawn(run_drainer(stderr, stderr_framer, fragment_tx));

    let status = child
        .wait()
        .await
        .map_err(|err| AppError::Shell(format!("failed to wait for shell: {err}")))?;
    let draining_at_exit = draining.is_cancelled();

    for (stream, drainer) in [("stdout", stdout_drainer), ("stderr", stderr_drainer)] {
        match drainer.await {
            Ok(bytes) => debug!(stream, bytes, "drainer joined"),
            Err(err) => warn!(stream, %err, "drainer task failed"),
        }
    }

    check_exit(status, draining_at_exit)
}

/// Decide whether a shell exit is acceptable.
///
/// Any exit is accepted once the session is draining; before that only a
/// successful exit is.
///
/// # Errors
///
/// Returns `AppError::Shell` describing the exit status otherwise.
pub fn check_exit(status: ExitStatus, draining: bool) -> Result<()> {
    let reason = status.code().map_or_else(
        || "shell terminated by signal".to_owned(),
        |code| format!("shell exited with code {code}"),
    );

    if status.success() || draining {
        info!(%reason, draining, "shell process exited");
        return Ok(());
    }

    warn!(%reason, "shell process exited while the session was running");
    Err(AppError::Shell(reason))
}
