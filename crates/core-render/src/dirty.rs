//! Dirty region tracking.
//!
//! Screens report the rectangles they repainted; the tracker clips them to the
//! frame, coalesces them and hands the frame driver a minimal commit list.
//!
//! Invariants:
//! * Every rect handed out by `consume` has positive area and lies inside the frame.
//! * Coalescing never changes the covered pixel set: a rect is only dropped
//!   when another contains it, and two rects are only merged when their union
//!   is exactly a rectangle.
//! * Once `mark_full` is called the next `consume` returns exactly the frame rect.
//! * `consume` is one-shot: state is cleared afterwards.

use embedded_graphics::geometry::{Point, Size};
use embedded_graphics::primitives::Rectangle;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RectError {
    #[error("dirty rect {width}x{height} at ({x}, {y}) has no area")]
    Empty { x: i32, y: i32, width: i32, height: i32 },
}

/// Screen-space rectangle with positive area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl DirtyRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self, RectError> {
        if width <= 0 || height <= 0 {
            return Err(RectError::Empty {
                x,
                y,
                width,
                height,
            });
        }
        Ok(Self {
            x,
            y,
            width: width as u32,
            height: height as u32,
        })
    }

    /// Rect anchored at the origin covering a whole frame of `size`. A zero
    /// dimension is clamped to one pixel.
    pub fn full(size: Size) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width.max(1),
            height: size.height.max(1),
        }
    }

    pub fn from_rectangle(r: &Rectangle) -> Option<Self> {
        if r.size.width == 0 || r.size.height == 0 {
            return None;
        }
        Some(Self {
            x: r.top_left.x,
            y: r.top_left.y,
            width: r.size.width,
            height: r.size.height,
        })
    }

    #[inline]
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    #[inline]
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn contains(&self, other: &DirtyRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && i64::from(x) < self.right() && i64::from(y) < self.bottom()
    }

    pub fn intersection(&self, other: &DirtyRect) -> Option<DirtyRect> {
        let x0 = i64::from(self.x.max(other.x));
        let y0 = i64::from(self.y.max(other.y));
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self::from_edges(x0, y0, x1, y1))
    }

    /// Union of two rects when that union is itself exactly a rectangle.
    pub fn exact_union(&self, other: &DirtyRect) -> Option<DirtyRect> {
        let same_columns = self.x == other.x && self.width == other.width;
        let vertical_touch =
            i64::from(self.y) <= other.bottom() && i64::from(other.y) <= self.bottom();
        let same_rows = self.y == other.y && self.height == other.height;
        let horizontal_touch =
            i64::from(self.x) <= other.right() && i64::from(other.x) <= self.right();
        if (same_columns && vertical_touch) || (same_rows && horizontal_touch) {
            let x0 = i64::from(self.x.min(other.x));
            let y0 = i64::from(self.y.min(other.y));
            let x1 = self.right().max(other.right());
            let y1 = self.bottom().max(other.bottom());
            return Some(Self::from_edges(x0, y0, x1, y1));
        }
        None
    }

    // Edges come from existing i32/u32 rects, so the casts cannot truncate.
    fn from_edges(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }
}

impl From<DirtyRect> for Rectangle {
    fn from(r: DirtyRect) -> Self {
        Rectangle::new(Point::new(r.x, r.y), Size::new(r.width, r.height))
    }
}

#[derive(Debug)]
pub struct DirtyRegionTracker {
    frame: DirtyRect,
    rects: SmallVec<[DirtyRect; 8]>,
    full: bool,
    rejected: u64,
}

impl DirtyRegionTracker {
    pub fn new(frame: Size) -> Self {
        Self {
            frame: DirtyRect::full(frame),
            rects: SmallVec::new(),
            full: false,
            rejected: 0,
        }
    }

    pub fn frame(&self) -> DirtyRect {
        self.frame
    }

    /// Record a repainted rect. Parts outside the frame are clipped away.
    pub fn mark(&mut self, rect: DirtyRect) {
        if self.full {
            return;
        }
        match rect.intersection(&self.frame) {
            Some(clipped) => self.rects.push(clipped),
            None => trace!(target: "render.dirty", ?rect, "rect_outside_frame_dropped"),
        }
    }

    /// Record an unchecked rect. Non-positive sizes are rejected and counted.
    pub fn mark_raw(&mut self, x: i32, y: i32, width: i32, height: i32) -> bool {
        match DirtyRect::new(x, y, width, height) {
            Ok(rect) => {
                self.mark(rect);
                true
            }
            Err(e) => {
                self.rejected += 1;
                warn!(target: "render.dirty", error = %e, "dirty_rect_rejected");
                false
            }
        }
    }

    /// The whole frame is dirty. Idempotent; dominates any partial marks.
    pub fn mark_full(&mut self) {
        self.full = true;
        self.rects.clear();
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.rects.is_empty()
    }

    /// Rects rejected by `mark_raw` since construction.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Take the coalesced region list, sorted by `(y, x)`, and reset.
    pub fn consume(&mut self) -> Vec<DirtyRect> {
        if std::mem::take(&mut self.full) {
            self.rects.clear();
            return vec![self.frame];
        }
        let mut out: Vec<DirtyRect> = self.rects.drain(..).collect();
        coalesce(&mut out);
        out.sort_by_key(|r| (r.y, r.x));
        out
    }
}

fn coalesce(rects: &mut Vec<DirtyRect>) {
    loop {
        let mut changed = false;
        let mut i = 0;
        while i < rects.len() {
            let mut j = i + 1;
            while j < rects.len() {
                let (a, b) = (rects[i], rects[j]);
                if a.contains(&b) {
                    rects.swap_remove(j);
                    changed = true;
                } else if b.contains(&a) {
                    rects[i] = b;
                    rects.swap_remove(j);
                    changed = true;
                } else if let Some(u) = a.exact_union(&b) {
                    rects[i] = u;
                    rects.swap_remove(j);
                    changed = true;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !changed {
            break;
        }
    }
}
