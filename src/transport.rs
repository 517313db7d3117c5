//! Command Transport (spec §4.4): a bounded, non-blocking SPSC channel from
//! the hook thread to the worker thread, plus the atomic drop/peak-depth
//! counters the spec's `ChannelStats` entity requires.
//!
//! Built on `crossbeam-channel`'s bounded channel (the same crate the
//! sibling pack repo `forestail-Kikyo/crates/kikyo-core` reaches for on this
//! exact hook-to-worker handoff) rather than `std::sync::mpsc`, because it
//! exposes `len()` for the peak-depth counter without extra bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::window_manager::WindowId;

/// Z-order placement a [`WindowCommand`] may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    None,
    ToTop,
    ToBottom,
}

/// Immutable once enqueued; copied by value into the queue — no pointers
/// cross the thread boundary (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCommand {
    pub target: WindowId,
    pub x: i32,
    pub y: i32,
    /// `(0, 0)` means "no size change" — a move-only command.
    pub w: i32,
    pub h: i32,
    pub z: ZOrder,
    /// Whether this command is part of an active Resizing gesture — tells
    /// the executor whether to drive the overlay.
    pub resizing: bool,
}

impl WindowCommand {
    pub fn mv(target: WindowId, x: i32, y: i32) -> Self {
        Self {
            target,
            x,
            y,
            w: 0,
            h: 0,
            z: ZOrder::None,
            resizing: false,
        }
    }

    pub fn resize(target: WindowId, x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            target,
            x,
            y,
            w,
            h,
            z: ZOrder::None,
            resizing: true,
        }
    }

    pub fn z_order(target: WindowId, z: ZOrder) -> Self {
        Self {
            target,
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            z,
            resizing: false,
        }
    }

    pub fn has_size_change(&self) -> bool {
        self.w != 0 || self.h != 0
    }
}

/// Monotonically non-decreasing counters (spec §3 `ChannelStats`).
#[derive(Debug, Default)]
pub struct ChannelStats {
    pub dropped: AtomicU64,
    pub peak_depth: AtomicU64,
}

impl ChannelStats {
    fn record_depth(&self, depth: u64) {
        let mut peak = self.peak_depth.load(Ordering::Relaxed);
        while depth > peak {
            match self.peak_depth.compare_exchange_weak(
                peak,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }
}

/// Producer half, held by the hook thread.
pub struct CommandProducer {
    tx: Sender<WindowCommand>,
    stats: Arc<ChannelStats>,
}

impl CommandProducer {
    /// Never blocks. Drops and counts on overflow.
    pub fn try_push(&self, cmd: WindowCommand) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => {
                self.stats.record_depth(self.tx.len() as u64);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

/// Consumer half, held by the worker thread.
pub struct CommandConsumer {
    rx: Receiver<WindowCommand>,
    stats: Arc<ChannelStats>,
}

impl CommandConsumer {
    /// Drains everything currently buffered, calling `f` for each command in
    /// arrival order.
    pub fn drain(&self, mut f: impl FnMut(WindowCommand)) {
        while let Ok(cmd) = self.rx.try_recv() {
            f(cmd);
        }
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}

pub fn channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let stats = Arc::new(ChannelStats::default());
    (
        CommandProducer {
            tx,
            stats: stats.clone(),
        },
        CommandConsumer { rx, stats },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_manager::WindowId;

    #[test]
    fn producer_never_blocks_and_counts_drops() {
        let (producer, consumer) = channel(2);
        let w = WindowId(1);
        assert!(producer.try_push(WindowCommand::mv(w, 1, 1)));
        assert!(producer.try_push(WindowCommand::mv(w, 2, 2)));
        // Queue full: must not block, must drop and count.
        assert!(!producer.try_push(WindowCommand::mv(w, 3, 3)));
        assert_eq!(consumer.stats().dropped.load(Ordering::Relaxed), 1);

        let mut seen = Vec::new();
        consumer.drain(|cmd| seen.push((cmd.x, cmd.y)));
        assert_eq!(seen, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn peak_depth_tracks_high_water_mark() {
        let (producer, consumer) = channel(4);
        let w = WindowId(1);
        producer.try_push(WindowCommand::mv(w, 0, 0));
        producer.try_push(WindowCommand::mv(w, 0, 0));
        producer.try_push(WindowCommand::mv(w, 0, 0));
        assert_eq!(consumer.stats().peak_depth.load(Ordering::Relaxed), 3);
        consumer.drain(|_| {});
        producer.try_push(WindowCommand::mv(w, 0, 0));
        // Peak stays at the historical high, not the current depth.
        assert_eq!(consumer.stats().peak_depth.load(Ordering::Relaxed), 3);
    }
}
