//! Tick-ordered buffer of pending client data.
//!
//! Both predicting protocols keep something per local tick until the server
//! acknowledges it: the rollback client keeps the compound action it predicted with, and
//! the algebraic client keeps the drift its prediction introduced. [`TickBuffer`] is that
//! store. Entries are appended at the tail with strictly increasing ticks and trimmed
//! from the head when an acknowledgement covers them.

use std::collections::VecDeque;

use crate::telemetry::{InvariantChecker, InvariantViolation};
use crate::{debug_check_invariants, SyncError, Tick};

/// An ordered sequence of `(tick, value)` pairs, strictly increasing by tick.
///
/// ```
/// use predictive_sync::{TickBuffer, Tick};
///
/// let mut buffer = TickBuffer::new();
/// for tick in 4..=7 {
///     buffer.push(Tick::new(tick), tick * 10).expect("ticks increase");
/// }
///
/// assert_eq!(buffer.acknowledge(Tick::new(5)), 2);
/// let remaining: Vec<u64> = buffer.ticks().map(Tick::as_u64).collect();
/// assert_eq!(remaining, [6, 7]);
///
/// // An older ack trims nothing.
/// assert_eq!(buffer.acknowledge(Tick::new(2)), 0);
/// assert_eq!(buffer.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TickBuffer<V> {
    entries: VecDeque<(Tick, V)>,
}

impl<V> Default for TickBuffer<V> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<V> TickBuffer<V> {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry at the tail.
    ///
    /// Fails without modifying the buffer if `tick` is not newer than the current tail.
    pub fn push(&mut self, tick: Tick, value: V) -> Result<(), SyncError> {
        if let Some(tail) = self.back_tick() {
            if tick <= tail {
                return Err(SyncError::InvalidRequest {
                    info: format!("tick {tick} is not newer than buffered tick {tail}"),
                });
            }
        }
        self.entries.push_back((tick, value));
        debug_check_invariants!(self, "after push");
        Ok(())
    }

    /// Drops every entry with tick ≤ `ack` and returns how many were dropped.
    ///
    /// An ack older than the head, or an empty buffer, drops nothing.
    pub fn acknowledge(&mut self, ack: Tick) -> usize {
        let count = self.acknowledged_count(ack);
        self.entries.drain(..count);
        debug_check_invariants!(self, "after acknowledge");
        count
    }

    /// Removes and returns every entry with tick ≤ `ack`, oldest first.
    pub fn take_acknowledged(&mut self, ack: Tick) -> impl Iterator<Item = (Tick, V)> + '_ {
        let count = self.acknowledged_count(ack);
        self.entries.drain(..count)
    }

    /// Removes and returns the oldest entry.
    pub fn pop_oldest(&mut self) -> Option<(Tick, V)> {
        self.entries.pop_front()
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tick of the oldest entry: the first tick not yet acknowledged.
    #[must_use]
    pub fn front_tick(&self) -> Option<Tick> {
        self.entries.front().map(|(tick, _)| *tick)
    }

    /// The oldest entry's value, for folding an evicted predecessor into it.
    pub fn front_mut(&mut self) -> Option<&mut V> {
        self.entries.front_mut().map(|(_, value)| value)
    }

    /// Tick of the newest entry.
    #[must_use]
    pub fn back_tick(&self) -> Option<Tick> {
        self.entries.back().map(|(tick, _)| *tick)
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (Tick, &V)> {
        self.entries.iter().map(|(tick, value)| (*tick, value))
    }

    /// Iterates buffered ticks oldest first.
    pub fn ticks(&self) -> impl Iterator<Item = Tick> + '_ {
        self.entries.iter().map(|(tick, _)| *tick)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn acknowledged_count(&self, ack: Tick) -> usize {
        self.entries.partition_point(|(tick, _)| *tick <= ack)
    }
}

impl<V> InvariantChecker for TickBuffer<V> {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut previous: Option<Tick> = None;
        for (tick, _) in &self.entries {
            if let Some(prev) = previous {
                if *tick <= prev {
                    return Err(InvariantViolation::new(
                        "TickBuffer",
                        "ticks must be strictly increasing",
                    )
                    .with_details(format!("{prev} followed by {tick}")));
                }
            }
            previous = Some(*tick);
        }
        Ok(())
    }
}
