use crate::{GpioSource, InputError, InputSource, KeyQueue, KeyboardSource, SignalMap};
use core_config::InputConfig;
use core_events::{
    ACTIONS_EMITTED, ActionSource, LogicalAction, SOURCE_READ_ERRORS, SOURCE_SWITCHES, SourceKind,
};
use std::sync::atomic::Ordering::Relaxed;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Owns both physical sources and samples only the active one.
pub struct InputLayer {
    keyboard: KeyboardSource,
    gpio: Option<GpioSource>,
    active: SourceKind,
}

impl InputLayer {
    /// `gpio` carries the outcome of opening the controller. A failure never
    /// escapes: the layer runs on the keyboard instead.
    pub fn new(
        keyboard: KeyboardSource,
        gpio: Result<GpioSource, InputError>,
        preferred: SourceKind,
    ) -> Self {
        let gpio = match gpio {
            Ok(src) => Some(src),
            Err(e) if preferred == SourceKind::Gpio => {
                warn!(target: "input.layer", error = %e, "gpio_unavailable_falling_back_to_keyboard");
                None
            }
            Err(e) => {
                debug!(target: "input.layer", error = %e, "gpio_not_opened");
                None
            }
        };
        let active = if gpio.is_none() {
            SourceKind::Keyboard
        } else {
            preferred
        };
        info!(target: "input.layer", %active, gpio = gpio.is_some(), "input_layer_ready");
        Self {
            keyboard,
            gpio,
            active,
        }
    }

    /// Build both sources from `[input]`. The GPIO controller is only opened
    /// when it is the preferred source.
    pub fn from_config(cfg: &InputConfig, keys: Box<dyn KeyQueue>) -> Self {
        let keyboard = KeyboardSource::from_config(cfg, keys);
        let gpio = match cfg.source {
            SourceKind::Gpio => GpioSource::open(&cfg.gpio, cfg.debounce_window()),
            SourceKind::Keyboard => Err(InputError::SourceUnavailable(SourceKind::Gpio)),
        };
        Self::new(keyboard, gpio, cfg.source)
    }

    pub fn active(&self) -> SourceKind {
        self.active
    }

    pub fn is_available(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Keyboard => true,
            SourceKind::Gpio => self.gpio.is_some(),
        }
    }

    pub fn poll(&mut self) -> LogicalAction {
        self.poll_at(Instant::now())
    }

    /// Sample the active source as of `now`. Read failures are logged and
    /// yield `None` for this tick.
    pub fn poll_at(&mut self, now: Instant) -> LogicalAction {
        let active = self.active;
        let result = match self.source_mut(active) {
            Some(src) => src.poll(now),
            None => Err(InputError::SourceUnavailable(active)),
        };
        match result {
            Ok(Some(action)) => {
                ACTIONS_EMITTED.fetch_add(1, Relaxed);
                debug!(target: "input.layer", source = %active, %action, "action_emitted");
                action
            }
            Ok(None) => LogicalAction::None,
            Err(e) => {
                SOURCE_READ_ERRORS.fetch_add(1, Relaxed);
                warn!(target: "input.layer", source = %active, error = %e, "source_read_failed");
                LogicalAction::None
            }
        }
    }

    /// Make `kind` the active source. Debounce timers on both sources are
    /// cleared and events pending on the new source are dropped.
    pub fn switch_to(&mut self, kind: SourceKind) -> Result<(), InputError> {
        if !self.is_available(kind) {
            warn!(target: "input.layer", requested = %kind, active = %self.active, "source_switch_rejected");
            return Err(InputError::SourceUnavailable(kind));
        }
        let previous = self.active;
        self.keyboard.debouncer_mut().reset();
        if let Some(gpio) = self.gpio.as_mut() {
            gpio.debouncer_mut().reset();
        }
        if let Some(src) = self.source_mut(kind) {
            src.reset();
        }
        self.active = kind;
        if previous != kind {
            SOURCE_SWITCHES.fetch_add(1, Relaxed);
        }
        info!(target: "input.layer", from = %previous, to = %kind, "source_switched");
        Ok(())
    }

    pub fn remap(&mut self, kind: SourceKind, map: SignalMap) -> Result<(), InputError> {
        let src = self
            .source_mut(kind)
            .ok_or(InputError::SourceUnavailable(kind))?;
        src.remap(map);
        info!(target: "input.layer", source = %kind, "source_remapped");
        Ok(())
    }

    fn source_mut(&mut self, kind: SourceKind) -> Option<&mut dyn InputSource> {
        match kind {
            SourceKind::Keyboard => Some(&mut self.keyboard),
            SourceKind::Gpio => self.gpio.as_mut().map(|g| g as &mut dyn InputSource),
        }
    }
}

impl ActionSource for InputLayer {
    fn next_action(&mut self) -> LogicalAction {
        self.poll()
    }
}
