//! Owned RGB565 pixel buffers.
//!
//! A `Surface` is both the frame the screens draw into and the value type of
//! every render cache. Surfaces produced by the text cache carry a coverage
//! mask so only glyph pixels are copied when blitted.

use crate::DirtyRect;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use std::convert::Infallible;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
    /// `Some` for surfaces with transparent areas; `true` marks a drawn pixel.
    mask: Option<Vec<bool>>,
}

impl Surface {
    /// Opaque surface filled with `fill`.
    pub fn new(width: u32, height: u32, fill: Rgb565) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![fill; len],
            mask: None,
        }
    }

    /// Fully transparent surface; pixels become opaque as they are drawn.
    pub fn transparent(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; len],
            mask: Some(vec![false; len]),
        }
    }

    /// Wrap raw pixels. Returns `None` when the length does not match.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Rgb565>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            pixels,
            mask: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> DirtyRect {
        DirtyRect::full(Size::new(self.width, self.height))
    }

    pub fn is_transparent(&self) -> bool {
        self.mask.is_some()
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb565> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Whether `(x, y)` holds a drawn pixel. Opaque surfaces cover every pixel.
    pub fn is_covered(&self, x: i32, y: i32) -> bool {
        match (self.index(x, y), &self.mask) {
            (Some(i), Some(mask)) => mask[i],
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb565) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
            if let Some(mask) = self.mask.as_mut() {
                mask[i] = true;
            }
        }
    }

    /// One row of pixels, `[x0, x0 + len)`, clipped to the surface.
    pub fn row(&self, y: u32, x0: u32, len: u32) -> &[Rgb565] {
        if y >= self.height || x0 >= self.width {
            return &[];
        }
        let end = x0.saturating_add(len).min(self.width);
        let start = (y * self.width + x0) as usize;
        &self.pixels[start..start + (end - x0) as usize]
    }

    /// Little-endian RGB565 bytes of one clipped row, as Linux framebuffers expect.
    pub fn row_le_bytes(&self, y: u32, x0: u32, len: u32, out: &mut Vec<u8>) {
        out.clear();
        for px in self.row(y, x0, len) {
            let raw: RawU16 = (*px).into();
            out.extend_from_slice(&raw.into_inner().to_le_bytes());
        }
    }

    pub fn fill(&mut self, color: Rgb565) {
        self.pixels.fill(color);
        if let Some(mask) = self.mask.as_mut() {
            mask.fill(true);
        }
    }

    /// Fill `rect` (clipped) and report the painted area.
    pub fn fill_rect(&mut self, rect: DirtyRect, color: Rgb565) -> Option<DirtyRect> {
        let area = rect.intersection(&self.bounds())?;
        for y in area.y..area.y + area.height as i32 {
            for x in area.x..area.x + area.width as i32 {
                self.set_pixel(x, y, color);
            }
        }
        Some(area)
    }

    /// Copy `src` with its top-left at `origin`. Transparent pixels of `src`
    /// are skipped. Returns the clipped destination rect that was written.
    pub fn blit(&mut self, src: &Surface, origin: Point) -> Option<DirtyRect> {
        let placed = DirtyRect {
            x: origin.x,
            y: origin.y,
            width: src.width,
            height: src.height,
        };
        if placed.width == 0 || placed.height == 0 {
            return None;
        }
        let area = placed.intersection(&self.bounds())?;
        for y in area.y..area.y + area.height as i32 {
            for x in area.x..area.x + area.width as i32 {
                let (sx, sy) = (x - origin.x, y - origin.y);
                if !src.is_covered(sx, sy) {
                    continue;
                }
                if let Some(color) = src.pixel(sx, sy) {
                    self.set_pixel(x, y, color);
                }
            }
        }
        Some(area)
    }
}

impl OriginDimensions for Surface {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Surface {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color);
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        if let Some(rect) = DirtyRect::from_rectangle(area) {
            self.fill_rect(rect, color);
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }
}
