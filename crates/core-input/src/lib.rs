//! Input abstraction layer.
//!
//! Heterogeneous physical sources (terminal keyboard, GPIO buttons) are
//! normalized into a single stream of [`LogicalAction`]s, at most one per
//! tick. Each source owns its signal mapping and its debounce timers; the
//! [`InputLayer`] samples exactly one configured *active* source and never
//! merges signals from several.

mod debounce;
mod gpio;
mod key_token;
mod keyboard;
mod layer;

pub use debounce::{DEFAULT_DEBOUNCE, Debouncer};
pub use gpio::{GpioLines, GpioSource, ScriptedLines, SysfsGpioLines};
pub use keyboard::{CrosstermKeyQueue, KeyQueue, KeyboardSource, NullKeyQueue, ScriptedKeys};
pub use layer::InputLayer;

use ahash::AHashMap;
use core_events::{
    ACTIONS_DROPPED, LogicalAction, RawSignal, SIGNALS_ACCEPTED, SIGNALS_DEBOUNCED,
    SIGNALS_UNMAPPED, SignalId, SourceKind, Transition,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering::Relaxed;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("gpio controller not present at {}", path.display())]
    ControllerUnavailable { path: PathBuf },
    #[error("input source `{0}` is not available")]
    SourceUnavailable(SourceKind),
    #[error("terminal input unavailable")]
    Terminal(#[source] io::Error),
    #[error("failed to {what}")]
    Io {
        what: String,
        #[source]
        source: io::Error,
    },
}

impl InputError {
    pub(crate) fn io(what: impl Into<String>, source: io::Error) -> Self {
        InputError::Io {
            what: what.into(),
            source,
        }
    }
}

/// Native signal identifier → logical action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalMap {
    bindings: AHashMap<SignalId, LogicalAction>,
}

impl SignalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, signal: SignalId, action: LogicalAction) {
        self.bindings.insert(signal, action);
    }

    pub fn with(mut self, signal: SignalId, action: LogicalAction) -> Self {
        self.bind(signal, action);
        self
    }

    pub fn lookup(&self, signal: &SignalId) -> Option<LogicalAction> {
        self.bindings
            .get(signal)
            .copied()
            .filter(|a| !a.is_none())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromIterator<(SignalId, LogicalAction)> for SignalMap {
    fn from_iter<T: IntoIterator<Item = (SignalId, LogicalAction)>>(iter: T) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// Capability shared by every physical input backend: sample raw state and
/// resolve it to zero or one action.
pub trait InputSource {
    fn kind(&self) -> SourceKind;

    /// Sample raw signals observed up to `now`, debounce them, and resolve at
    /// most one action.
    fn poll(&mut self, now: Instant) -> Result<Option<LogicalAction>, InputError>;

    /// Clear every debounce timer and discard raw events still pending.
    fn reset(&mut self);

    /// Swap the signal mapping. Timers are reset with it.
    fn remap(&mut self, map: SignalMap);

    fn debouncer_mut(&mut self) -> &mut Debouncer;
}

/// Debounce a batch of raw transitions (stable-sorted by timestamp) and pick
/// the earliest accepted, mapped press.
pub(crate) fn resolve_batch(
    batch: &mut Vec<RawSignal>,
    debouncer: &mut Debouncer,
    map: &SignalMap,
) -> Option<LogicalAction> {
    batch.sort_by_key(|s| s.timestamp);
    batch.retain(|raw| {
        let accepted = debouncer.accept(&raw.signal, raw.timestamp);
        if accepted {
            SIGNALS_ACCEPTED.fetch_add(1, Relaxed);
        } else {
            SIGNALS_DEBOUNCED.fetch_add(1, Relaxed);
            tracing::trace!(target: "input.debounce", signal = %raw.signal, "transition_suppressed");
        }
        accepted
    });
    pick_press(batch, map)
}

/// Pick the earliest mapped press from already-debounced transitions. Later
/// mapped presses in the same batch are dropped: one action per tick.
pub(crate) fn pick_press(batch: &mut Vec<RawSignal>, map: &SignalMap) -> Option<LogicalAction> {
    let mut winner = None;
    for raw in batch.drain(..) {
        if raw.transition != Transition::Press {
            continue;
        }
        match map.lookup(&raw.signal) {
            Some(action) if winner.is_none() => winner = Some(action),
            Some(action) => {
                ACTIONS_DROPPED.fetch_add(1, Relaxed);
                tracing::debug!(target: "input.debounce", signal = %raw.signal, %action, "press_dropped_same_tick");
            }
            None => {
                SIGNALS_UNMAPPED.fetch_add(1, Relaxed);
            }
        }
    }
    winner
}
