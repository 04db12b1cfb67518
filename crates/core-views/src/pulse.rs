//! Selection highlight animation.
//!
//! A triangle wave over `period`, quantized to `LEVELS` steps so a screen
//! repaints the highlight only when the visible color actually changes.

use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use std::time::Duration;

pub const LEVELS: u8 = 8;
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1600);

#[derive(Debug, Clone)]
pub struct Pulse {
    period: Duration,
    elapsed: Duration,
    level: u8,
}

impl Pulse {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            elapsed: Duration::ZERO,
            level: 0,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Restart from the low point.
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.level = 0;
    }

    /// Advance by `dt`. Returns true when the quantized level changed.
    pub fn advance(&mut self, dt: Duration) -> bool {
        let period = self.period.as_nanos();
        self.elapsed = Duration::from_nanos(((self.elapsed.as_nanos() + dt.as_nanos()) % period) as u64);
        let phase = self.elapsed.as_nanos() as f32 / period as f32;
        let tri = if phase < 0.5 { phase * 2.0 } else { (1.0 - phase) * 2.0 };
        let level = (tri * (LEVELS - 1) as f32).round() as u8;
        let changed = level != self.level;
        self.level = level;
        changed
    }

    pub fn color(&self, low: Rgb565, high: Rgb565) -> Rgb565 {
        lerp(low, high, self.level, LEVELS - 1)
    }
}

impl Default for Pulse {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD)
    }
}

/// Integer interpolation per RGB565 channel, `step` of `steps`.
pub fn lerp(from: Rgb565, to: Rgb565, step: u8, steps: u8) -> Rgb565 {
    if steps == 0 {
        return to;
    }
    let step = step.min(steps) as i32;
    let mix = |a: u8, b: u8| -> u8 {
        let (a, b) = (a as i32, b as i32);
        (a + (b - a) * step / steps as i32) as u8
    };
    Rgb565::new(
        mix(from.r(), to.r()),
        mix(from.g(), to.g()),
        mix(from.b(), to.b()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_rises_then_falls() {
        let mut p = Pulse::new(Duration::from_millis(1400));
        assert_eq!(p.level(), 0);
        assert!(p.advance(Duration::from_millis(700)));
        assert_eq!(p.level(), LEVELS - 1);
        p.advance(Duration::from_millis(700));
        assert_eq!(p.level(), 0);
    }

    #[test]
    fn small_steps_do_not_always_change_level() {
        let mut p = Pulse::new(Duration::from_millis(1600));
        assert!(!p.advance(Duration::from_millis(10)));
    }

    #[test]
    fn lerp_endpoints() {
        let a = Rgb565::new(0, 0, 0);
        let b = Rgb565::new(30, 60, 30);
        assert_eq!(lerp(a, b, 0, 7), a);
        assert_eq!(lerp(a, b, 7, 7), b);
        assert_eq!(lerp(a, b, 9, 7), b);
    }
}
