//! Dirty-region rendering primitives and the render cache tier.
//!
//! Frame cost is kept proportional to what changed:
//! - `dirty`: screens report repainted rects; the tracker clips, coalesces and
//!   hands back a commit list (or one full-frame rect after `mark_full`).
//! - `surface`: owned RGB565 buffers implementing `embedded_graphics::DrawTarget`.
//! - `static_cache`: per-screen surfaces produced lazily, once per registration.
//! - `font_cache`: bitmap faces memoized by `(source, size)`, never evicted.
//! - `text_cache`: rendered strings keyed by `(content, font, color)` with LRU eviction.
//! - `context`: the process-scoped `RenderContext` bundling font and text caches.
//!
//! Everything here is single-threaded: caches hand out `Rc<Surface>` and take
//! `&mut self`.

pub mod context;
pub mod dirty;
pub mod font_cache;
pub mod static_cache;
pub mod surface;
pub mod text_cache;

pub use context::{RenderContext, RenderContextStats};
pub use dirty::{DirtyRect, DirtyRegionTracker, RectError};
pub use font_cache::{FontCache, FontFace, FontKey};
pub use static_cache::StaticSurfaceCache;
pub use surface::Surface;
pub use text_cache::{CacheStats, DEFAULT_TEXT_CAPACITY, TextCache, TextKey, rasterize};

pub use embedded_graphics::pixelcolor::Rgb565;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("no static surface registered under `{0}`")]
    NotRegistered(String),
    #[error("producer for `{name}` failed: {reason}")]
    ProducerFailed { name: String, reason: String },
    #[error("unknown font source `{0}`")]
    UnknownFont(String),
}
