//! Fragment aggregator task.
//!
//! The single serialization point of a session: every fragment from the
//! controller and both drainers passes through one queue, is appended to
//! the buffer of its kind, and becomes a [`Message`] when a flushed
//! fragment arrives. Delivery order therefore equals receipt order.
//!
//! # Shutdown
//!
//! The controller sends [`AggregatorEvent::Shutdown`] on the same queue,
//! after every fragment it produced itself. On receipt the aggregator
//! closes the queue, so producers still holding a sender get an error on
//! their next send and stop forwarding, then discards whatever was queued
//! behind the shutdown event. Unflushed buffers are dropped unless
//! `flush_partial_on_close` is set.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::message::{Fragment, Message, MessageKind};
use crate::orchestrator::listener::MessageListener;

/// Items carried by the aggregator queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatorEvent {
    /// Output to buffer and possibly deliver.
    Fragment(Fragment),
    /// Stop delivering; everything queued after this is discarded.
    Shutdown,
}

/// Counters reported when the aggregator stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Messages handed to the listener.
    pub delivered: usize,
    /// Fragments dropped after shutdown, unflushed buffers included.
    pub discarded: usize,
}

#[derive(Debug, Default)]
struct Buffers {
    text: String,
    error: String,
    log: String,
}

impl Buffers {
    fn get_mut(&mut self, kind: MessageKind) -> &mut String {
        match kind {
            MessageKind::Text => &mut self.text,
            MessageKind::Error => &mut self.error,
            MessageKind::Log => &mut self.log,
        }
    }
}

struct Aggregator {
    buffers: Buffers,
    listener: Arc<dyn MessageListener>,
    stats: AggregatorStats,
}

impl Aggregator {
    fn accept(&mut self, fragment: Fragment) {
        let buffer = self.buffers.get_mut(fragment.kind);
        buffer.push_str(&fragment.payload);

        if fragment.flush {
            let payload = std::mem::take(buffer);
            self.deliver(fragment.kind, payload);
        }
    }

    fn deliver(&mut self, kind: MessageKind, payload: String) {
        if payload.is_empty() {
            debug!(%kind, "aggregator: empty message not delivered");
            return;
        }
        self.listener.on_message(Message::new(kind, payload));
        self.stats.delivered += 1;
    }

    fn close(&mut self, flush_partial: bool) {
        for kind in [MessageKind::Text, MessageKind::Error, MessageKind::Log] {
            let payload = std::mem::take(self.buffers.get_mut(kind));
            if payload.is_empty() {
                continue;
            }
            if flush_partial {
                self.deliver(kind, payload);
            } else {
                debug!(%kind, bytes = payload.len(), "aggregator: discarding partial output");
                self.stats.discarded += 1;
            }
        }
    }
}

/// Aggregator task: assembles fragments into messages until shutdown.
///
/// Also stops when every producer has dropped its sender. Returns the
/// delivery counters once the queue is closed and drained.
pub async fn run_aggregator(
    mut fragment_rx: mpsc::Receiver<AggregatorEvent>,
    listener: Arc<dyn MessageListener>,
    flush_partial_on_close: bool,
) -> AggregatorStats {
    let mut aggregator = Aggregator {
        buffers: Buffers::default(),
        listener,
        stats: AggregatorStats::default(),
    };

    while let Some(event) = fragment_rx.recv().await {
        match event {
            AggregatorEvent::Fragment(fragment) => aggregator.accept(fragment),
            AggregatorEvent::Shutdown => {
                debug!("aggregator: shutdown received");
                break;
            }
        }
    }

    aggregator.close(flush_partial_on_close);

    fragment_rx.close();
    while let Some(event) = fragment_rx.recv().await {
        if matches!(event, AggregatorEvent::Fragment(_)) {
            aggregator.stats.discarded += 1;
        }
    }

    debug!(
        delivered = aggregator.stats.delivered,
        discarded = aggregator.stats.discarded,
        "aggregator stopped"
    );
    aggregator.stats
}
