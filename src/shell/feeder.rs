//! Command feeder task.
//!
//! Receives accepted [`Command`]s from a tokio [`mpsc`] channel and writes
//! each one to the shell's `stdin`, followed by the stderr and stdout marker
//! commands of the session's [`SyncProtocol`].

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::command::Command;
use crate::shell::protocol::SyncProtocol;
use crate::{AppError, Result};

/// Line written to the shell when a terminal command is received.
pub const EXIT_LINE: &str = "exit\n";

/// Command feeder task: writes commands and sync markers to `stdin`.
///
/// The task exits when:
/// - a terminal command is received: `draining` is cancelled, [`EXIT_LINE`]
///   is written and no markers follow, or
/// - `cmd_rx` is closed (all senders dropped).
///
/// In both cases `stdin` is dropped on return, so the shell sees
/// end-of-input.
///
/// # Errors
///
/// Returns [`AppError::Io`]`("write failed: …")` if writing to `stdin` fails
/// (e.g. the shell has already exited).
pub async fn run_feeder<W>(
    stdin: W,
    mut cmd_rx: mpsc::Receiver<Command>,
    protocol: Arc<SyncProtocol>,
    draining: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut stdin = stdin;

    while let Some(command) = cmd_rx.recv().await {
        if command.is_terminal() {
            info!(command = command.line(), "feeder: terminal command, exiting shell");
            draining.cancel();
            write_all(&mut stdin, EXIT_LINE).await?;
            return Ok(());
        }

        debug!(command = command.line(), "feeder: forwarding command");
        write_all(&mut stdin, &protocol.command_script(command.line())).await?;
    }

    debug!("feeder: command queue closed, releasing shell stdin");
    Ok(())
}

async fn write_all<W>(stdin: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    stdin.write_all(text.as_bytes()).await.map_err(|e| {
        warn!(error = %e, "feeder: write to stdin failed");
        AppError::Io(format!("write failed: {e}"))
    })?;

    stdin.flush().await.map_err(|e| {
        warn!(error = %e, "feeder: flush of stdin failed");
        AppError::Io(format!("flush failed: {e}"))
    })
}
