//! Physical output. A commit copies only the given regions of the surface.

use anyhow::{Context, Result, bail};
use core_render::{DirtyRect, Surface};
use embedded_graphics::geometry::Size;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, trace};

pub static COMMITS: AtomicU64 = AtomicU64::new(0);
pub static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);

/// Commits kept by [`HeadlessDisplay`] for inspection.
pub const HEADLESS_HISTORY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayStats {
    pub commits: u64,
    pub bytes_written: u64,
}

pub fn display_stats() -> DisplayStats {
    DisplayStats {
        commits: COMMITS.load(Ordering::Relaxed),
        bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),
    }
}

pub trait Display {
    fn size(&self) -> Size;

    /// Push `regions` of `surface` to the device. Regions are already clipped
    /// to the frame.
    fn commit(&mut self, surface: &Surface, regions: &[DirtyRect]) -> Result<()>;
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn size(&self) -> Size {
        (**self).size()
    }

    fn commit(&mut self, surface: &Surface, regions: &[DirtyRect]) -> Result<()> {
        (**self).commit(surface, regions)
    }
}

/// Bytes per framebuffer line as reported by sysfs, if readable.
fn sysfs_stride(device: &Path) -> Option<u32> {
    let name = device.file_name()?.to_str()?;
    let text = std::fs::read_to_string(format!("/sys/class/graphics/{name}/stride")).ok()?;
    text.trim().parse().ok()
}

/// Linux framebuffer in RGB565, written region by region, row by row.
pub struct FramebufferDisplay {
    path: PathBuf,
    file: File,
    size: Size,
    stride: u32,
    row: Vec<u8>,
}

impl FramebufferDisplay {
    pub fn open(path: &Path, size: Size) -> Result<Self> {
        let stride = sysfs_stride(path).unwrap_or(size.width * 2);
        Self::open_with_stride(path, size, stride)
    }

    pub fn open_with_stride(path: &Path, size: Size, stride: u32) -> Result<Self> {
        if stride < size.width * 2 {
            bail!(
                "framebuffer stride {stride} is shorter than a {}-pixel row",
                size.width
            );
        }
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("opening framebuffer {}", path.display()))?;
        info!(target: "runtime.display", path = %path.display(), width = size.width, height = size.height, stride, "framebuffer_opened");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            stride,
            row: Vec::with_capacity(size.width as usize * 2),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Display for FramebufferDisplay {
    fn size(&self) -> Size {
        self.size
    }

    fn commit(&mut self, surface: &Surface, regions: &[DirtyRect]) -> Result<()> {
        let mut written = 0u64;
        for r in regions {
            let (x, y) = (r.x.max(0) as u32, r.y.max(0) as u32);
            for row in y..(y + r.height).min(surface.height()) {
                surface.row_le_bytes(row, x, r.width, &mut self.row);
                if self.row.is_empty() {
                    continue;
                }
                let offset = u64::from(row) * u64::from(self.stride) + u64::from(x) * 2;
                self.file
                    .seek(SeekFrom::Start(offset))
                    .and_then(|_| self.file.write_all(&self.row))
                    .with_context(|| format!("writing framebuffer row {row}"))?;
                written += self.row.len() as u64;
            }
        }
        self.file.flush().context("flushing framebuffer")?;
        COMMITS.fetch_add(1, Ordering::Relaxed);
        BYTES_WRITTEN.fetch_add(written, Ordering::Relaxed);
        trace!(target: "runtime.display", regions = regions.len(), bytes = written, "framebuffer_commit");
        Ok(())
    }
}

/// Output sink for running without a panel. Keeps the most recent
/// [`HEADLESS_HISTORY`] commits for inspection.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    size: Size,
    commits: VecDeque<Vec<DirtyRect>>,
    total: u64,
    pixels: u64,
}

impl HeadlessDisplay {
    pub fn new(size: Size) -> Self {
        debug!(target: "runtime.display", width = size.width, height = size.height, "headless_display");
        Self {
            size,
            commits: VecDeque::with_capacity(HEADLESS_HISTORY),
            total: 0,
            pixels: 0,
        }
    }

    /// Recent commits, oldest first.
    pub fn commits(&self) -> &VecDeque<Vec<DirtyRect>> {
        &self.commits
    }

    /// Commits since creation, including those no longer retained.
    pub fn commit_count(&self) -> u64 {
        self.total
    }

    pub fn pixels(&self) -> u64 {
        self.pixels
    }
}

impl Display for HeadlessDisplay {
    fn size(&self) -> Size {
        self.size
    }

    fn commit(&mut self, _surface: &Surface, regions: &[DirtyRect]) -> Result<()> {
        self.pixels += regions.iter().map(DirtyRect::area).sum::<u64>();
        if self.commits.len() == HEADLESS_HISTORY {
            self.commits.pop_front();
        }
        self.commits.push_back(regions.to_vec());
        self.total += 1;
        COMMITS.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
