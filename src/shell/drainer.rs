//! Stream drainer task.
//!
//! Reads one of the shell's output pipes in fixed-size chunks, hands each
//! chunk to an [`OutputFramer`] and forwards the resulting fragments to the
//! aggregator.
//!
//! End-of-stream is the normal way out: the pipe closes when the shell
//! exits. Read errors end the task the same way and are only logged.
//! Anything the framer still holds back is forwarded as a partial
//! fragment before the task returns.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::orchestrator::aggregator::AggregatorEvent;
use crate::shell::framing::OutputFramer;

/// Drainer task: reads `pipe` to end-of-stream and emits fragments.
///
/// The read buffer is sized by [`OutputFramer::capacity`]. Once the
/// aggregator stops accepting fragments the drainer keeps reading and
/// discarding, so the shell never blocks on a full pipe.
///
/// Returns the number of bytes read.
pub async fn run_drainer<R>(
    pipe: R,
    mut framer: OutputFramer,
    fragment_tx: mpsc::Sender<AggregatorEvent>,
) -> u64
where
    R: AsyncRead + Unpin + Send,
{
    let kind = framer.kind();
    let mut pipe = pipe;
    let mut buf = vec![0u8; framer.capacity()];
    let mut total: u64 = 0;
    let mut accepting = true;

    loop {
        let n = match pipe.read(&mut buf).await {
            Ok(0) => {
                debug!(%kind, "drainer: end of stream");
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(%kind, error = %err, "drainer: read failed, stopping");
                break;
            }
        };

        total += n as u64;

        if !accepting {
            continue;
        }

        for fragment in framer.frame(&buf[..n]) {
            if fragment_tx
                .send(AggregatorEvent::Fragment(fragment))
                .await
                .is_err()
            {
                debug!(%kind, "drainer: aggregator closed, discarding remaining output");
                accepting = false;
                break;
            }
        }
    }

    if accepting {
        if let Some(fragment) = framer.finish() {
            if fragment_tx
                .send(AggregatorEvent::Fragment(fragment))
                .await
                .is_err()
            {
                debug!(%kind, "drainer: aggregator closed, held output dropped");
            }
        }
    }

    debug!(%kind, bytes = total, "drainer: done");
    total
}
