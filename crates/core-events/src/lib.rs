//! Core input event types and telemetry for Pocketview.
//!
//! Raw device activity (key presses, GPIO edges) is surfaced as [`RawSignal`]
//! triples of `(signal, transition, timestamp)`. The input layer normalizes
//! those into at most one [`LogicalAction`] per tick; the navigator pulls that
//! action through the [`ActionSource`] seam so it never sees device details.

use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters. The runtime is single threaded, but statics let any layer bump a
// counter without threading a metrics handle through every call. The binary logs a snapshot at
// shutdown.
// -------------------------------------------------------------------------------------------------
pub static SIGNALS_ACCEPTED: AtomicU64 = AtomicU64::new(0); // transitions that passed debounce
pub static SIGNALS_DEBOUNCED: AtomicU64 = AtomicU64::new(0); // transitions suppressed by debounce
pub static SIGNALS_UNMAPPED: AtomicU64 = AtomicU64::new(0); // accepted presses with no mapping
pub static ACTIONS_EMITTED: AtomicU64 = AtomicU64::new(0); // non-None actions handed to the navigator
pub static ACTIONS_DROPPED: AtomicU64 = AtomicU64::new(0); // extra presses lost to the one-per-tick rule
pub static SOURCE_READ_ERRORS: AtomicU64 = AtomicU64::new(0);
pub static SOURCE_SWITCHES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputTelemetrySnapshot {
    pub accepted: u64,
    pub debounced: u64,
    pub unmapped: u64,
    pub emitted: u64,
    pub dropped: u64,
    pub read_errors: u64,
    pub switches: u64,
}

pub fn telemetry_snapshot() -> InputTelemetrySnapshot {
    use std::sync::atomic::Ordering::Relaxed;
    InputTelemetrySnapshot {
        accepted: SIGNALS_ACCEPTED.load(Relaxed),
        debounced: SIGNALS_DEBOUNCED.load(Relaxed),
        unmapped: SIGNALS_UNMAPPED.load(Relaxed),
        emitted: ACTIONS_EMITTED.load(Relaxed),
        dropped: ACTIONS_DROPPED.load(Relaxed),
        read_errors: SOURCE_READ_ERRORS.load(Relaxed),
        switches: SOURCE_SWITCHES.load(Relaxed),
    }
}

// -------------------------------------------------------------------------------------------------
// Logical actions
// -------------------------------------------------------------------------------------------------

/// Closed set of device-independent actions. `None` is the idle tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalAction {
    Up,
    Down,
    Left,
    Right,
    Confirm,
    Cancel,
    Menu,
    #[default]
    None,
}

impl LogicalAction {
    pub const ALL: [LogicalAction; 7] = [
        LogicalAction::Up,
        LogicalAction::Down,
        LogicalAction::Left,
        LogicalAction::Right,
        LogicalAction::Confirm,
        LogicalAction::Cancel,
        LogicalAction::Menu,
    ];

    pub fn is_none(self) -> bool {
        matches!(self, LogicalAction::None)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogicalAction::Up => "up",
            LogicalAction::Down => "down",
            LogicalAction::Left => "left",
            LogicalAction::Right => "right",
            LogicalAction::Confirm => "confirm",
            LogicalAction::Cancel => "cancel",
            LogicalAction::Menu => "menu",
            LogicalAction::None => "none",
        }
    }
}

impl fmt::Display for LogicalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical input backends the layer can select between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Keyboard,
    Gpio,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Keyboard => "keyboard",
            SourceKind::Gpio => "gpio",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------------------------------------------------------------------------------------
// Raw signals
// -------------------------------------------------------------------------------------------------

/// Native identifier of a physical signal.
///
/// Key names are normalized lowercase (`"up"`, `"enter"`, `"esc"`, `"k"`); pins
/// are GPIO line offsets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalId {
    Key(String),
    Pin(u32),
}

impl SignalId {
    pub fn key(name: impl AsRef<str>) -> Self {
        SignalId::Key(name.as_ref().to_ascii_lowercase())
    }

    pub fn pin(line: u32) -> Self {
        SignalId::Pin(line)
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalId::Key(name) => write!(f, "key:{name}"),
            SignalId::Pin(line) => write!(f, "pin:{line}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Press,
    Release,
}

/// One observed edge of a physical signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignal {
    pub signal: SignalId,
    pub transition: Transition,
    pub timestamp: Instant,
}

impl RawSignal {
    pub fn new(signal: SignalId, transition: Transition, timestamp: Instant) -> Self {
        Self {
            signal,
            transition,
            timestamp,
        }
    }

    pub fn press(signal: SignalId, timestamp: Instant) -> Self {
        Self::new(signal, Transition::Press, timestamp)
    }

    pub fn release(signal: SignalId, timestamp: Instant) -> Self {
        Self::new(signal, Transition::Release, timestamp)
    }
}

// -------------------------------------------------------------------------------------------------
// Action source seam
// -------------------------------------------------------------------------------------------------

/// Anything that can hand the navigator exactly one resolved action per tick.
pub trait ActionSource {
    fn next_action(&mut self) -> LogicalAction;
}

/// Scripted queue: yields queued actions in order, then `None` forever.
impl ActionSource for VecDeque<LogicalAction> {
    fn next_action(&mut self) -> LogicalAction {
        self.pop_front().unwrap_or(LogicalAction::None)
    }
}
