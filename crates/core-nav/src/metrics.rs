//! Frame execution counters.
//!
//! Records what each tick actually committed, as opposed to what the input
//! layer resolved (see `core_events::telemetry_snapshot`).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct FrameMetrics {
    pub ticks: AtomicU64,
    /// Ticks that committed the whole frame (transitions, forced or screen-requested).
    pub full_frames: AtomicU64,
    /// Ticks that committed one or more partial regions.
    pub partial_frames: AtomicU64,
    /// Ticks with nothing to commit.
    pub idle_frames: AtomicU64,
    /// Ticks whose render failed; the display kept the previous frame.
    pub held_frames: AtomicU64,
    /// Applied push/pop/replace operations.
    pub transitions: AtomicU64,
    /// Root pops refused under the ignore policy.
    pub ignored_pops: AtomicU64,
    pub regions_committed: AtomicU64,
    pub pixels_committed: AtomicU64,
    /// Empty rect lists turned into full redraws.
    pub empty_damage_fallbacks: AtomicU64,
    pub last_render_ns: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMetricsSnapshot {
    pub ticks: u64,
    pub full_frames: u64,
    pub partial_frames: u64,
    pub idle_frames: u64,
    pub held_frames: u64,
    pub transitions: u64,
    pub ignored_pops: u64,
    pub regions_committed: u64,
    pub pixels_committed: u64,
    pub empty_damage_fallbacks: u64,
    pub last_render_ns: u64,
}

impl FrameMetrics {
    pub fn snapshot(&self) -> FrameMetricsSnapshot {
        FrameMetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            full_frames: self.full_frames.load(Ordering::Relaxed),
            partial_frames: self.partial_frames.load(Ordering::Relaxed),
            idle_frames: self.idle_frames.load(Ordering::Relaxed),
            held_frames: self.held_frames.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            ignored_pops: self.ignored_pops.load(Ordering::Relaxed),
            regions_committed: self.regions_committed.load(Ordering::Relaxed),
            pixels_committed: self.pixels_committed.load(Ordering::Relaxed),
            empty_damage_fallbacks: self.empty_damage_fallbacks.load(Ordering::Relaxed),
            last_render_ns: self.last_render_ns.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}
