//! GPIO button source.
//!
//! Lines are sampled as levels once per poll; a press or release is the
//! change of a pin's logical level. A change inside the pin's debounce window
//! is not recorded, so a contact that is still bouncing is re-examined on the
//! next poll and accepted once it has been stable past the window.

use crate::{Debouncer, InputError, InputSource, SignalMap, pick_press};
use ahash::AHashMap;
use core_config::GpioConfig;
use core_events::{
    LogicalAction, RawSignal, SIGNALS_ACCEPTED, SIGNALS_DEBOUNCED, SignalId, SourceKind,
    Transition,
};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::Ordering::Relaxed;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Raw line access. `true` means the electrical level is high.
pub trait GpioLines {
    fn pins(&self) -> Vec<u32>;
    fn read(&mut self, pin: u32) -> Result<bool, InputError>;
}

/// Legacy sysfs interface (`/sys/class/gpio/gpioN/value`).
#[derive(Debug)]
pub struct SysfsGpioLines {
    values: Vec<(u32, PathBuf)>,
}

impl SysfsGpioLines {
    /// Export (when needed) and open every pin as an input.
    pub fn open(root: &Path, pins: &[u32]) -> Result<Self, InputError> {
        if !root.is_dir() {
            return Err(InputError::ControllerUnavailable {
                path: root.to_path_buf(),
            });
        }
        let mut values = Vec::with_capacity(pins.len());
        for &pin in pins {
            let line = root.join(format!("gpio{pin}"));
            if !line.exists() {
                fs::write(root.join("export"), pin.to_string())
                    .map_err(|e| InputError::io(format!("export gpio {pin}"), e))?;
            }
            let direction = line.join("direction");
            if direction.exists() {
                fs::write(&direction, "in")
                    .map_err(|e| InputError::io(format!("set gpio {pin} direction"), e))?;
            }
            values.push((pin, line.join("value")));
        }
        info!(target: "input.gpio", root = %root.display(), pins = values.len(), "gpio_lines_opened");
        Ok(Self { values })
    }
}

impl GpioLines for SysfsGpioLines {
    fn pins(&self) -> Vec<u32> {
        self.values.iter().map(|(pin, _)| *pin).collect()
    }

    fn read(&mut self, pin: u32) -> Result<bool, InputError> {
        let Some((_, path)) = self.values.iter().find(|(p, _)| *p == pin) else {
            return Err(InputError::io(
                format!("read gpio {pin}"),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        };
        let raw = fs::read_to_string(path)
            .map_err(|e| InputError::io(format!("read gpio {pin}"), e))?;
        Ok(raw.trim() == "1")
    }
}

/// Line levels set by hand. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLines {
    levels: Rc<RefCell<Vec<(u32, bool)>>>,
    failing: Rc<RefCell<bool>>,
    failing_pins: Rc<RefCell<Vec<u32>>>,
}

impl ScriptedLines {
    /// All `pins` start at `idle` level.
    pub fn new(pins: &[u32], idle: bool) -> Self {
        Self {
            levels: Rc::new(RefCell::new(pins.iter().map(|p| (*p, idle)).collect())),
            failing: Rc::default(),
            failing_pins: Rc::default(),
        }
    }

    pub fn set(&self, pin: u32, high: bool) {
        let mut levels = self.levels.borrow_mut();
        match levels.iter_mut().find(|(p, _)| *p == pin) {
            Some(slot) => slot.1 = high,
            None => levels.push((pin, high)),
        }
    }

    /// Make every subsequent read fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.borrow_mut() = failing;
    }

    /// Make reads of `pin` alone fail until cleared.
    pub fn set_pin_failing(&self, pin: u32, failing: bool) {
        let mut pins = self.failing_pins.borrow_mut();
        pins.retain(|p| *p != pin);
        if failing {
            pins.push(pin);
        }
    }
}

impl GpioLines for ScriptedLines {
    fn pins(&self) -> Vec<u32> {
        self.levels.borrow().iter().map(|(p, _)| *p).collect()
    }

    fn read(&mut self, pin: u32) -> Result<bool, InputError> {
        if *self.failing.borrow() || self.failing_pins.borrow().contains(&pin) {
            return Err(InputError::io(
                format!("read gpio {pin}"),
                std::io::Error::other("scripted failure"),
            ));
        }
        Ok(self
            .levels
            .borrow()
            .iter()
            .find(|(p, _)| *p == pin)
            .is_some_and(|(_, high)| *high))
    }
}

pub struct GpioSource {
    lines: Box<dyn GpioLines>,
    active_low: bool,
    map: SignalMap,
    debouncer: Debouncer,
    pressed: AHashMap<u32, bool>,
    batch: Vec<RawSignal>,
}

impl GpioSource {
    pub fn new(
        lines: Box<dyn GpioLines>,
        active_low: bool,
        map: SignalMap,
        debouncer: Debouncer,
    ) -> Self {
        Self {
            lines,
            active_low,
            map,
            debouncer,
            pressed: AHashMap::new(),
            batch: Vec::new(),
        }
    }

    /// Build from `[input]` / `[input.gpio]` over the given lines.
    pub fn from_config(
        cfg: &GpioConfig,
        default_window: Duration,
        lines: Box<dyn GpioLines>,
    ) -> Self {
        let mut debouncer = Debouncer::new(default_window);
        let mut map = SignalMap::new();
        for pin in &cfg.pins {
            map.bind(SignalId::pin(pin.pin), pin.action);
            if let Some(ms) = pin.debounce_ms {
                debouncer.set_window(SignalId::pin(pin.pin), Duration::from_millis(ms));
            }
        }
        Self::new(lines, cfg.active_low, map, debouncer)
    }

    /// Open the sysfs controller described by `cfg`.
    pub fn open(cfg: &GpioConfig, default_window: Duration) -> Result<Self, InputError> {
        let pins: Vec<u32> = cfg.pins.iter().map(|p| p.pin).collect();
        let lines = SysfsGpioLines::open(&cfg.root, &pins)?;
        Ok(Self::from_config(cfg, default_window, Box::new(lines)))
    }

    fn is_pressed(&self, high: bool) -> bool {
        high != self.active_low
    }
}

impl InputSource for GpioSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Gpio
    }

    fn poll(&mut self, now: Instant) -> Result<Option<LogicalAction>, InputError> {
        self.batch.clear();
        // A failed read must leave debounce and level state untouched.
        let mut levels = Vec::new();
        for pin in self.lines.pins() {
            levels.push((pin, self.lines.read(pin)?));
        }
        for (pin, high) in levels {
            let pressed = self.is_pressed(high);
            let was = self.pressed.get(&pin).copied().unwrap_or(false);
            if pressed == was {
                continue;
            }
            let signal = SignalId::pin(pin);
            if !self.debouncer.accept(&signal, now) {
                SIGNALS_DEBOUNCED.fetch_add(1, Relaxed);
                trace!(target: "input.gpio", pin, "edge_suppressed");
                continue;
            }
            SIGNALS_ACCEPTED.fetch_add(1, Relaxed);
            self.pressed.insert(pin, pressed);
            let transition = if pressed {
                Transition::Press
            } else {
                Transition::Release
            };
            self.batch.push(RawSignal::new(signal, transition, now));
        }
        Ok(pick_press(&mut self.batch, &self.map))
    }

    /// Pending edges on GPIO are the difference between the recorded and the
    /// live level, so discarding them means adopting the live levels.
    fn reset(&mut self) {
        self.debouncer.reset();
        self.batch.clear();
        for pin in self.lines.pins() {
            if let Ok(high) = self.lines.read(pin) {
                let pressed = self.is_pressed(high);
                self.pressed.insert(pin, pressed);
            }
        }
        debug!(target: "input.gpio", "gpio_state_resynced");
    }

    fn remap(&mut self, map: SignalMap) {
        self.map = map;
        self.debouncer.reset();
    }

    fn debouncer_mut(&mut self) -> &mut Debouncer {
        &mut self.debouncer
    }
}
