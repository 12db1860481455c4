//! Arrival stamps
//!
//! A received frame is stamped by the radio the moment it is demodulated,
//! before any consumer looks at it. The stamp carries the arrival instant,
//! for time windows, and a process-wide sequence number that totally orders
//! stamps even when the clock does not move (paused test clocks, coarse
//! timers). Anything that must happen "after this frame" compares sequences.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

use crate::frame::BitFrame;

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Point in time with a unique position in the global event order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stamp {
    sequence: u64,
    instant: Instant,
}

impl Stamp {
    /// Stamp an event happening now
    pub fn now() -> Self {
        Self::at(Instant::now())
    }

    /// Stamp an event that happened at `instant`
    ///
    /// The sequence is still drawn now, so the stamp orders after every
    /// stamp already taken.
    pub fn at(instant: Instant) -> Self {
        Self {
            sequence: SEQUENCE.fetch_add(1, Ordering::SeqCst),
            instant,
        }
    }

    /// When the event happened
    pub fn instant(&self) -> Instant {
        self.instant
    }

    /// Position in the global event order
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether this stamp was taken after `other`
    pub fn is_after(&self, other: &Stamp) -> bool {
        self.sequence > other.sequence
    }
}

/// A frame as delivered by the radio, with its arrival stamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub frame: BitFrame,
    pub stamp: Stamp,
}

impl ReceivedFrame {
    /// Stamp a frame arriving now
    pub fn now(frame: BitFrame) -> Self {
        Self {
            frame,
            stamp: Stamp::now(),
        }
    }
}
