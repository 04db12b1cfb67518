//! Rendered text surfaces with LRU eviction.
//!
//! Keyed by the exact `(content, font, color)` triple. Every hit refreshes
//! recency; inserting past capacity evicts exactly the least-recently-used
//! entry. Handed-out surfaces are `Rc`s, so an evicted surface stays valid
//! for whoever still holds it.

use crate::{FontFace, FontKey, Surface};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::rc::Rc;
use tracing::trace;

pub const DEFAULT_TEXT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextKey {
    pub content: String,
    pub font: FontKey,
    pub color: (u8, u8, u8),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
pub struct TextCache {
    cache: LruCache<TextKey, Rc<Surface>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Default for TextCache {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_CAPACITY)
    }
}

fn color_key(c: Rgb565) -> (u8, u8, u8) {
    (c.r(), c.g(), c.b())
}

/// Rasterize one line of text onto a transparent surface sized to fit it.
pub fn rasterize(content: &str, font: &FontFace, color: Rgb565) -> Surface {
    let mut surface = Surface::transparent(font.text_width(content), font.line_height());
    let style = MonoTextStyle::new(font.font(), color);
    let Ok(_) = Text::with_baseline(content, Point::zero(), style, Baseline::Top).draw(&mut surface);
    surface
}

impl TextCache {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn get_text(&mut self, content: &str, font: &FontFace, color: Rgb565) -> Rc<Surface> {
        let key = TextKey {
            content: content.to_string(),
            font: font.key().clone(),
            color: color_key(color),
        };
        if let Some(hit) = self.cache.get(&key) {
            self.hits += 1;
            return Rc::clone(hit);
        }
        self.misses += 1;
        let surface = Rc::new(rasterize(content, font, color));
        if let Some((evicted, _)) = self.cache.push(key, Rc::clone(&surface)) {
            self.evictions += 1;
            trace!(target: "render.cache", content = %evicted.content, "text_evicted");
        }
        surface
    }

    /// Presence check that does not count as a use.
    pub fn contains(&self, content: &str, font: &FontFace, color: Rgb565) -> bool {
        self.cache.contains(&TextKey {
            content: content.to_string(),
            font: font.key().clone(),
            color: color_key(color),
        })
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.cache.len(),
            capacity: self.capacity(),
        }
    }
}
