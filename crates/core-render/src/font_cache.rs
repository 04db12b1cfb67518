//! Font handles, memoized per `(source, size)` for the life of the process.

use crate::CacheError;
use ahash::AHashMap;
use embedded_graphics::mono_font::{MonoFont, ascii};
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontKey {
    pub source: String,
    pub size: u32,
}

impl FontKey {
    pub fn new(source: impl Into<String>, size: u32) -> Self {
        Self {
            source: source.into(),
            size,
        }
    }
}

/// A loaded bitmap face. `key` is the face actually chosen, which may be
/// smaller than what was asked for.
#[derive(Debug)]
pub struct FontFace {
    key: FontKey,
    font: &'static MonoFont<'static>,
}

impl FontFace {
    pub fn key(&self) -> &FontKey {
        &self.key
    }

    pub fn font(&self) -> &'static MonoFont<'static> {
        self.font
    }

    pub fn line_height(&self) -> u32 {
        self.font.character_size.height
    }

    pub fn advance(&self) -> u32 {
        self.font.character_size.width + self.font.character_spacing
    }

    /// Pixel width of `text` on a single line.
    pub fn text_width(&self, text: &str) -> u32 {
        let n = text.chars().count() as u32;
        if n == 0 {
            return 0;
        }
        n * self.advance() - self.font.character_spacing
    }

    /// Characters that fit in `width` pixels.
    pub fn columns(&self, width: u32) -> usize {
        let adv = self.advance().max(1);
        ((width + self.font.character_spacing) / adv) as usize
    }
}

const PROFONT: &[(u32, &MonoFont<'static>)] = &[
    (7, &profont::PROFONT_7_POINT),
    (9, &profont::PROFONT_9_POINT),
    (10, &profont::PROFONT_10_POINT),
    (12, &profont::PROFONT_12_POINT),
    (14, &profont::PROFONT_14_POINT),
    (18, &profont::PROFONT_18_POINT),
    (24, &profont::PROFONT_24_POINT),
];

// Sized by glyph cell height.
const MONO: &[(u32, &MonoFont<'static>)] = &[
    (6, &ascii::FONT_4X6),
    (7, &ascii::FONT_5X7),
    (8, &ascii::FONT_5X8),
    (9, &ascii::FONT_6X9),
    (10, &ascii::FONT_6X10),
    (12, &ascii::FONT_6X12),
    (13, &ascii::FONT_6X13),
    (14, &ascii::FONT_7X14),
    (15, &ascii::FONT_9X15),
    (18, &ascii::FONT_9X18),
    (20, &ascii::FONT_10X20),
];

fn table(source: &str) -> Option<&'static [(u32, &'static MonoFont<'static>)]> {
    match source {
        "profont" => Some(PROFONT),
        "mono" => Some(MONO),
        _ => None,
    }
}

/// Largest available size not above `requested`; the smallest size otherwise.
fn pick(
    sizes: &'static [(u32, &'static MonoFont<'static>)],
    requested: u32,
) -> Option<(u32, &'static MonoFont<'static>)> {
    sizes
        .iter()
        .rev()
        .find(|(s, _)| *s <= requested)
        .or_else(|| sizes.first())
        .copied()
}

#[derive(Debug, Default)]
pub struct FontCache {
    faces: AHashMap<FontKey, Rc<FontFace>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_font(&mut self, source: &str, size: u32) -> Result<Rc<FontFace>, CacheError> {
        let requested = FontKey::new(source, size);
        if let Some(face) = self.faces.get(&requested) {
            return Ok(Rc::clone(face));
        }
        let (chosen, font) = table(source)
            .and_then(|sizes| pick(sizes, size))
            .ok_or_else(|| CacheError::UnknownFont(source.to_string()))?;
        debug!(target: "render.cache", source, requested = size, chosen, "font_loaded");
        let face = Rc::new(FontFace {
            key: FontKey::new(source, chosen),
            font,
        });
        self.faces.insert(requested, Rc::clone(&face));
        Ok(face)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
