//! Pre-sized image assets.
//!
//! Assets arrive at their final logical size; nothing here scales. On disk an
//! asset is a raw little-endian RGB565 dump named `<name>_<w>x<h>.rgb565`.

use crate::ContentError;
use ahash::AHashMap;
use core_render::{Rgb565, Surface};
use embedded_graphics::pixelcolor::raw::RawU16;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

pub trait AssetProvider {
    fn asset(&self, name: &str) -> Option<Rc<Surface>>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryAssets {
    assets: AHashMap<String, Rc<Surface>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, surface: Surface) {
        self.assets.insert(name.into(), Rc::new(surface));
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetProvider for MemoryAssets {
    fn asset(&self, name: &str) -> Option<Rc<Surface>> {
        self.assets.get(name).cloned()
    }
}

/// Every `*.rgb565` file of a directory, decoded once at open.
#[derive(Debug, Clone)]
pub struct RawAssetDir {
    root: PathBuf,
    assets: MemoryAssets,
}

/// Split `logo_32x16` into `("logo", 32, 16)`.
fn parse_stem(stem: &str) -> Option<(&str, u32, u32)> {
    let (name, dims) = stem.rsplit_once('_')?;
    let (w, h) = dims.split_once('x')?;
    let (w, h) = (w.parse().ok()?, h.parse().ok()?);
    (!name.is_empty() && w > 0 && h > 0).then_some((name, w, h))
}

fn decode(path: &Path, width: u32, height: u32) -> Result<Surface, ContentError> {
    let bytes = fs::read(path).map_err(|source| ContentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let expected = width as usize * height as usize * 2;
    if bytes.len() != expected {
        return Err(ContentError::Asset {
            path: path.to_path_buf(),
            reason: format!("expected {expected} bytes, found {}", bytes.len()),
        });
    }
    let pixels = bytes
        .chunks_exact(2)
        .map(|px| Rgb565::from(RawU16::new(u16::from_le_bytes([px[0], px[1]]))))
        .collect();
    Surface::from_pixels(width, height, pixels).ok_or_else(|| ContentError::Asset {
        path: path.to_path_buf(),
        reason: "pixel count mismatch".to_string(),
    })
}

impl RawAssetDir {
    pub fn open(root: &Path) -> Result<Self, ContentError> {
        let read_err = |source| ContentError::Read {
            path: root.to_path_buf(),
            source,
        };
        let mut assets = MemoryAssets::new();
        for entry in fs::read_dir(root).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("rgb565") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some((name, w, h)) = parse_stem(stem) else {
                debug!(target: "content", path = %path.display(), "asset_name_unrecognized");
                continue;
            };
            let name = name.to_string();
            assets.insert(name, decode(&path, w, h)?);
        }
        info!(target: "content", root = %root.display(), assets = assets.len(), "assets_loaded");
        Ok(Self {
            root: root.to_path_buf(),
            assets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetProvider for RawAssetDir {
    fn asset(&self, name: &str) -> Option<Rc<Surface>> {
        self.assets.asset(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::RgbColor;

    #[test]
    fn stem_parsing() {
        assert_eq!(parse_stem("logo_32x16"), Some(("logo", 32, 16)));
        assert_eq!(parse_stem("trail_icon_8x8"), Some(("trail_icon", 8, 8)));
        assert_eq!(parse_stem("logo"), None);
        assert_eq!(parse_stem("logo_0x4"), None);
        assert_eq!(parse_stem("_4x4"), None);
    }

    #[test]
    fn memory_assets_share_handles() {
        let mut a = MemoryAssets::new();
        a.insert("dot", Surface::new(1, 1, Rgb565::RED));
        let x = a.asset("dot").unwrap();
        let y = a.asset("dot").unwrap();
        assert!(Rc::ptr_eq(&x, &y));
        assert!(a.asset("nope").is_none());
    }
}
