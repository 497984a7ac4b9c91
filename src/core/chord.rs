// File: src/core/chord.rs
use crate::core::dots::{Chord, DotSet};
use std::time::{Duration, Instant};

/// Default quiescence window before a pending chord is closed.
pub const DEFAULT_CHORD_TIMEOUT_MS: u64 = 50;

/// Collects individual dot presses into chords.
///
/// Aggregation is trailing-edge: every press re-arms the deadline, and
/// the chord closes once no dot arrives for the configured timeout. The
/// aggregator never owns a timer; the caller feeds it the current
/// `Instant` on every press and polls [`ChordAggregator::deadline`] from
/// its own event loop.
#[derive(Debug, Clone)]
pub struct ChordAggregator {
    pending: DotSet,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl ChordAggregator {
    pub fn new() -> Self {
        Self {
            pending: DotSet::EMPTY,
            deadline: None,
            timeout: Duration::from_millis(DEFAULT_CHORD_TIMEOUT_MS),
        }
    }

    /// Feeds one dot-press event.
    ///
    /// Dot 0 is the space convention: any pending cell is committed
    /// first, then a separate space chord follows, so the result can
    /// hold up to two chords. Any other in-range dot joins the pending
    /// set (repeats are idempotent) and re-arms the deadline. Dots
    /// above 6 are ignored.
    pub fn press(&mut self, dot: u8, now: Instant) -> Vec<Chord> {
        if dot == 0 {
            let mut closed = Vec::with_capacity(2);
            if let Some(chord) = self.take_pending() {
                closed.push(chord);
            }
            closed.push(Chord::Space);
            return closed;
        }
        if dot > 6 {
            return Vec::new();
        }
        self.pending.insert(dot);
        self.deadline = Some(now + self.timeout);
        Vec::new()
    }

    /// Delivers the pending chord if the quiescence deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<Chord> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.take_pending(),
            _ => None,
        }
    }

    /// The instant the host should arm its timer for, if a chord is
    /// pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Commits the pending chord immediately. No-op on empty.
    pub fn flush(&mut self) -> Option<Chord> {
        self.take_pending()
    }

    /// Discards pending state without delivering anything.
    pub fn cancel(&mut self) {
        self.pending = DotSet::EMPTY;
        self.deadline = None;
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Changes the quiescence window. Takes effect on the next press;
    /// an already-armed deadline is left alone.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn take_pending(&mut self) -> Option<Chord> {
        self.deadline = None;
        if self.pending.is_empty() {
            return None;
        }
        let chord = Chord::Cell(self.pending);
        self.pending = DotSet::EMPTY;
        Some(chord)
    }
}

impl Default for ChordAggregator {
    fn default() -> Self {
        Self::new()
    }
}
