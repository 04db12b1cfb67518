//! Colors, fonts and layout metrics shared by every view.
//!
//! Fonts are named by `(source, size)` and resolved through the render
//! context's font cache at draw time.

use embedded_graphics::pixelcolor::Rgb565;

pub type FontSpec = (&'static str, u32);

pub const BACKGROUND: Rgb565 = Rgb565::new(1, 2, 3);
pub const HEADER_BG: Rgb565 = Rgb565::new(3, 10, 12);
pub const DIVIDER: Rgb565 = Rgb565::new(8, 20, 10);
pub const TEXT: Rgb565 = Rgb565::new(31, 63, 31);
pub const TEXT_DIM: Rgb565 = Rgb565::new(18, 38, 18);
pub const ACCENT: Rgb565 = Rgb565::new(31, 40, 0);
/// Selection bar at the low point of its pulse.
pub const SELECT_LOW: Rgb565 = Rgb565::new(8, 16, 6);
/// Selection bar at the peak of its pulse.
pub const SELECT_HIGH: Rgb565 = Rgb565::new(14, 30, 12);

pub const TITLE_FONT: FontSpec = ("profont", 14);
pub const ROW_FONT: FontSpec = ("profont", 12);
pub const BODY_FONT: FontSpec = ("mono", 10);
pub const SMALL_FONT: FontSpec = ("mono", 9);

pub const MARGIN: i32 = 6;
pub const HEADER_HEIGHT: u32 = 24;
pub const FOOTER_HEIGHT: u32 = 14;
pub const ROW_HEIGHT: u32 = 20;
pub const LINE_GAP: u32 = 2;
