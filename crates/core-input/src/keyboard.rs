//! Terminal keyboard source.

use crate::key_token::{KeyTranslation, translate_key_event};
use crate::{Debouncer, InputError, InputSource, SignalMap, resolve_batch};
use core_config::InputConfig;
use core_events::{LogicalAction, RawSignal, SOURCE_READ_ERRORS, SignalId, SourceKind};
use crossterm::event::{
    self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::stdout;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where keyboard transitions come from.
pub trait KeyQueue {
    /// Append every raw transition that arrived up to `now`.
    fn drain(&mut self, now: Instant, out: &mut Vec<RawSignal>) -> Result<(), InputError>;

    /// Throw away anything pending.
    fn discard(&mut self);
}

/// Reads crossterm key events without blocking. Owns terminal raw mode for
/// its lifetime.
pub struct CrosstermKeyQueue {
    shutdown: Arc<AtomicBool>,
    enhanced: bool,
}

impl CrosstermKeyQueue {
    pub fn open(shutdown: Arc<AtomicBool>) -> Result<Self, InputError> {
        enable_raw_mode().map_err(InputError::Terminal)?;
        // Release reporting needs the progressive keyboard protocol; terminals
        // without it still deliver presses.
        let enhanced = execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok();
        info!(target: "input.keyboard", enhanced, "terminal_raw_mode_enabled");
        Ok(Self { shutdown, enhanced })
    }
}

impl KeyQueue for CrosstermKeyQueue {
    fn drain(&mut self, _now: Instant, out: &mut Vec<RawSignal>) -> Result<(), InputError> {
        while event::poll(Duration::ZERO).map_err(|e| InputError::io("poll terminal", e))? {
            let ev = event::read().map_err(|e| InputError::io("read terminal event", e))?;
            let Event::Key(key) = ev else { continue };
            match translate_key_event(&key, Instant::now()) {
                KeyTranslation::Signal(raw) => out.push(raw),
                KeyTranslation::Interrupt => {
                    info!(target: "input.keyboard", "interrupt_requested");
                    self.shutdown.store(true, Ordering::SeqCst);
                }
                KeyTranslation::Ignored => {}
            }
        }
        Ok(())
    }

    fn discard(&mut self) {
        let mut scratch = Vec::new();
        let drained = self.drain(Instant::now(), &mut scratch);
        finish_discard(drained, scratch.len());
    }
}

fn finish_discard(drained: Result<(), InputError>, discarded: usize) {
    if let Err(e) = drained {
        SOURCE_READ_ERRORS.fetch_add(1, Ordering::Relaxed);
        warn!(target: "input.keyboard", error = %e, discarded, "pending_keys_discard_failed");
        return;
    }
    debug!(target: "input.keyboard", discarded, "pending_keys_discarded");
}

impl Drop for CrosstermKeyQueue {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = disable_raw_mode();
    }
}

/// Queue fed by hand. Clones share the same buffer so a test can keep a handle
/// after the source takes ownership.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    pending: Rc<RefCell<VecDeque<RawSignal>>>,
}

impl ScriptedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, raw: RawSignal) {
        self.pending.borrow_mut().push_back(raw);
    }

    pub fn press(&self, key: &str, at: Instant) {
        self.push(RawSignal::press(SignalId::key(key), at));
    }

    pub fn release(&self, key: &str, at: Instant) {
        self.push(RawSignal::release(SignalId::key(key), at));
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl KeyQueue for ScriptedKeys {
    /// Only events stamped at or before `now` are released.
    fn drain(&mut self, now: Instant, out: &mut Vec<RawSignal>) -> Result<(), InputError> {
        let mut pending = self.pending.borrow_mut();
        let mut later = VecDeque::with_capacity(pending.len());
        for raw in pending.drain(..) {
            if raw.timestamp <= now {
                out.push(raw);
            } else {
                later.push_back(raw);
            }
        }
        *pending = later;
        Ok(())
    }

    fn discard(&mut self) {
        self.pending.borrow_mut().clear();
    }
}

/// Never yields anything. Used when no terminal is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeyQueue;

impl KeyQueue for NullKeyQueue {
    fn drain(&mut self, _now: Instant, _out: &mut Vec<RawSignal>) -> Result<(), InputError> {
        Ok(())
    }

    fn discard(&mut self) {}
}

pub struct KeyboardSource {
    queue: Box<dyn KeyQueue>,
    map: SignalMap,
    debouncer: Debouncer,
    batch: Vec<RawSignal>,
}

impl KeyboardSource {
    pub fn new(queue: Box<dyn KeyQueue>, map: SignalMap, debouncer: Debouncer) -> Self {
        Self {
            queue,
            map,
            debouncer,
            batch: Vec::new(),
        }
    }

    /// Mapping and debounce windows from `[input]` / `[input.keyboard]`.
    pub fn from_config(cfg: &InputConfig, queue: Box<dyn KeyQueue>) -> Self {
        let map = cfg
            .keyboard
            .map
            .bindings()
            .into_iter()
            .map(|(name, action)| (SignalId::key(name), action))
            .collect();
        let mut debouncer = Debouncer::new(cfg.debounce_window());
        for (name, ms) in &cfg.keyboard.debounce {
            debouncer.set_window(SignalId::key(name), Duration::from_millis(*ms));
        }
        Self::new(queue, map, debouncer)
    }

    pub fn map(&self) -> &SignalMap {
        &self.map
    }
}

impl InputSource for KeyboardSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Keyboard
    }

    fn poll(&mut self, now: Instant) -> Result<Option<LogicalAction>, InputError> {
        self.batch.clear();
        self.queue.drain(now, &mut self.batch)?;
        Ok(resolve_batch(&mut self.batch, &mut self.debouncer, &self.map))
    }

    fn reset(&mut self) {
        self.debouncer.reset();
        self.queue.discard();
        self.batch.clear();
    }

    fn remap(&mut self, map: SignalMap) {
        self.map = map;
        self.debouncer.reset();
    }

    fn debouncer_mut(&mut self) -> &mut Debouncer {
        &mut self.debouncer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn source(keys: &ScriptedKeys) -> KeyboardSource {
        KeyboardSource::from_config(&InputConfig::default(), Box::new(keys.clone()))
    }

    #[test]
    fn default_bindings_resolve() {
        let keys = ScriptedKeys::new();
        let mut src = source(&keys);
        let t0 = Instant::now();
        keys.press("j", t0);
        assert_eq!(src.poll(t0).unwrap(), Some(LogicalAction::Down));
        keys.press("enter", t0 + ms(10));
        assert_eq!(src.poll(t0 + ms(10)).unwrap(), Some(LogicalAction::Confirm));
        assert_eq!(src.poll(t0 + ms(20)).unwrap(), None);
    }

    #[test]
    fn future_events_wait_for_their_tick() {
        let keys = ScriptedKeys::new();
        let mut src = source(&keys);
        let t0 = Instant::now();
        keys.press("up", t0 + ms(50));
        assert_eq!(src.poll(t0).unwrap(), None);
        assert_eq!(keys.pending(), 1);
        assert_eq!(src.poll(t0 + ms(50)).unwrap(), Some(LogicalAction::Up));
    }

    #[test]
    fn per_key_override_from_config() {
        let mut cfg = InputConfig::default();
        cfg.keyboard.debounce.insert("enter".into(), 300);
        let keys = ScriptedKeys::new();
        let mut src = KeyboardSource::from_config(&cfg, Box::new(keys.clone()));
        let t0 = Instant::now();
        keys.press("enter", t0);
        keys.press("up", t0);
        src.poll(t0).unwrap();
        keys.press("enter", t0 + ms(200));
        assert_eq!(src.poll(t0 + ms(200)).unwrap(), None);
        keys.press("up", t0 + ms(200));
        assert_eq!(src.poll(t0 + ms(200)).unwrap(), Some(LogicalAction::Up));
    }

    #[test]
    fn reset_discards_pending_and_timers() {
        let keys = ScriptedKeys::new();
        let mut src = source(&keys);
        let t0 = Instant::now();
        keys.press("up", t0);
        src.poll(t0).unwrap();
        keys.press("down", t0 + ms(1));
        src.reset();
        assert_eq!(keys.pending(), 0);
        keys.press("up", t0 + ms(5));
        assert_eq!(src.poll(t0 + ms(5)).unwrap(), Some(LogicalAction::Up));
    }

    #[test]
    fn remap_changes_resolution() {
        let keys = ScriptedKeys::new();
        let mut src = source(&keys);
        src.remap(SignalMap::new().with(SignalId::key("x"), LogicalAction::Menu));
        let t0 = Instant::now();
        keys.press("up", t0);
        keys.press("x", t0 + ms(1));
        assert_eq!(src.poll(t0 + ms(1)).unwrap(), Some(LogicalAction::Menu));
    }

    #[test]
    fn failed_discard_is_logged_and_counted() {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let before = SOURCE_READ_ERRORS.load(Ordering::Relaxed);
        tracing::subscriber::with_default(subscriber, || {
            finish_discard(
                Err(InputError::io("read terminal event", io::Error::other("tty gone"))),
                2,
            );
        });
        let log = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("WARN input.keyboard: pending_keys_discard_failed"), "{log}");
        assert!(log.contains("failed to read terminal event"));
        assert!(SOURCE_READ_ERRORS.load(Ordering::Relaxed) > before);
    }
}
