use crate::{CacheError, CacheStats, DirtyRect, FontCache, Surface, TextCache};
use core_config::CacheConfig;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::Point;

/// Process-scoped render caches. Built once by the binary and lent to every
/// render call; nothing here is global.
#[derive(Debug, Default)]
pub struct RenderContext {
    pub fonts: FontCache,
    pub text: TextCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderContextStats {
    pub fonts_loaded: usize,
    pub text: CacheStats,
}

impl RenderContext {
    pub fn new(text_capacity: usize) -> Self {
        Self {
            fonts: FontCache::new(),
            text: TextCache::new(text_capacity),
        }
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self::new(cfg.text_capacity)
    }

    /// Draw one line of cached text with its top-left at `origin`. Returns the
    /// rect covered by the text box, or `None` when it fell outside `target`.
    pub fn draw_text(
        &mut self,
        target: &mut Surface,
        content: &str,
        font: (&str, u32),
        color: Rgb565,
        origin: Point,
    ) -> Result<Option<DirtyRect>, CacheError> {
        let face = self.fonts.get_font(font.0, font.1)?;
        let text = self.text.get_text(content, &face, color);
        Ok(target.blit(&text, origin))
    }

    pub fn stats(&self) -> RenderContextStats {
        RenderContextStats {
            fonts_loaded: self.fonts.len(),
            text: self.text.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::RgbColor;

    #[test]
    fn draw_text_goes_through_both_caches() {
        let mut ctx = RenderContext::new(8);
        let mut target = Surface::new(64, 16, Rgb565::BLACK);
        let r1 = ctx
            .draw_text(&mut target, "ok", ("mono", 10), Rgb565::WHITE, Point::new(2, 3))
            .unwrap();
        assert_eq!(r1, DirtyRect::new(2, 3, 12, 10).ok());
        ctx.draw_text(&mut target, "ok", ("mono", 10), Rgb565::WHITE, Point::new(30, 3))
            .unwrap();
        let stats = ctx.stats();
        assert_eq!(stats.fonts_loaded, 1);
        assert_eq!(stats.text.hits, 1);
        assert_eq!(stats.text.misses, 1);
    }

    #[test]
    fn capacity_from_config() {
        let ctx = RenderContext::from_config(&CacheConfig { text_capacity: 7 });
        assert_eq!(ctx.text.capacity(), 7);
    }
}
