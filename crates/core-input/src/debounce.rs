//! Per-signal debounce timers.
//!
//! A transition on signal `S` at instant `t` is accepted only when at least
//! `window(S)` has elapsed since the last *accepted* transition on `S`.
//! Rejected transitions leave the timer untouched, so a bouncing contact
//! cannot keep extending its own suppression. Timers advance only when a
//! source polls; nothing here blocks or sleeps.

use ahash::AHashMap;
use core_events::SignalId;
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct Debouncer {
    default_window: Duration,
    overrides: AHashMap<SignalId, Duration>,
    last_accepted: AHashMap<SignalId, Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(default_window: Duration) -> Self {
        Self {
            default_window,
            overrides: AHashMap::new(),
            last_accepted: AHashMap::new(),
        }
    }

    /// Configure an independent window for one signal.
    pub fn set_window(&mut self, signal: SignalId, window: Duration) {
        self.overrides.insert(signal, window);
    }

    pub fn with_window(mut self, signal: SignalId, window: Duration) -> Self {
        self.set_window(signal, window);
        self
    }

    pub fn window_for(&self, signal: &SignalId) -> Duration {
        self.overrides
            .get(signal)
            .copied()
            .unwrap_or(self.default_window)
    }

    /// Decide whether a transition observed at `at` passes. Accepting records
    /// `at` as the signal's new reference point.
    pub fn accept(&mut self, signal: &SignalId, at: Instant) -> bool {
        let window = self.window_for(signal);
        if let Some(last) = self.last_accepted.get(signal)
            && at.saturating_duration_since(*last) < window
        {
            return false;
        }
        self.last_accepted.insert(signal.clone(), at);
        true
    }

    /// Forget every accepted timestamp. Windows (and overrides) are kept.
    pub fn reset(&mut self) {
        self.last_accepted.clear();
    }

    pub fn reset_signal(&mut self, signal: &SignalId) {
        self.last_accepted.remove(signal);
    }

    pub fn tracked_signals(&self) -> usize {
        self.last_accepted.len()
    }
}
