//! Fixed-cadence frame loop: tick the navigator, commit what it dirtied.

use crate::display::{Display, display_stats};
use anyhow::Result;
use core_events::ActionSource;
use core_nav::Navigator;
use core_render::{RenderContext, Rgb565, Surface};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal,
    TickBudget,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Signal => "signal",
            ShutdownReason::TickBudget => "tick_budget",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct FrameDriver<D: Display> {
    nav: Navigator,
    surface: Surface,
    ctx: RenderContext,
    display: D,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    budget: Option<u64>,
    ticks: u64,
    commit_failures: u64,
}

impl<D: Display> FrameDriver<D> {
    pub fn new(nav: Navigator, ctx: RenderContext, display: D, interval: Duration) -> Self {
        let size = display.size();
        Self {
            nav,
            surface: Surface::new(size.width, size.height, Rgb565::new(0, 0, 0)),
            ctx,
            display,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            budget: None,
            ticks: 0,
            commit_failures: 0,
        }
    }

    /// Stop once `flag` is raised.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// Stop after `ticks` ticks.
    pub fn with_budget(mut self, ticks: Option<u64>) -> Self {
        self.budget = ticks;
        self
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn commit_failures(&self) -> u64 {
        self.commit_failures
    }

    /// Run until shutdown or the tick budget is spent. A navigation error
    /// (root pop under the fatal policy) ends the run.
    pub fn run(&mut self, source: &mut dyn ActionSource) -> Result<ShutdownReason> {
        let span = tracing::debug_span!(target: "runtime", "frame_loop");
        let _enter = span.enter();

        let mut last = Instant::now();
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(ShutdownReason::Signal);
            }
            if self.budget.is_some_and(|b| self.ticks >= b) {
                return Ok(ShutdownReason::TickBudget);
            }
            let started = Instant::now();
            let dt = started - last;
            last = started;

            self.step(source, dt)?;

            let spent = started.elapsed();
            if let Some(rest) = self.interval.checked_sub(spent) {
                thread::sleep(rest);
            } else {
                trace!(target: "runtime", spent_us = spent.as_micros() as u64, "tick_overran");
            }
        }
    }

    /// One tick without pacing.
    pub fn step(&mut self, source: &mut dyn ActionSource, dt: Duration) -> Result<()> {
        self.ticks += 1;
        let outcome = self.nav.tick(source, dt, &mut self.surface, &mut self.ctx)?;
        if outcome.held || outcome.regions.is_empty() {
            return Ok(());
        }
        // The panel still shows the previous frame after a failed commit.
        if let Err(e) = self.display.commit(&self.surface, &outcome.regions) {
            self.commit_failures += 1;
            error!(target: "runtime.display", error = %format!("{e:#}"), "commit_failed");
            self.nav.request_full_redraw();
        }
        Ok(())
    }

    pub fn log_summary(&self, reason: ShutdownReason) {
        let frames = self.nav.metrics().snapshot();
        let input = core_events::telemetry_snapshot();
        let render = self.ctx.stats();
        let output = display_stats();
        info!(
            target: "runtime.shutdown",
            reason = reason.as_str(),
            ticks = self.ticks,
            full_frames = frames.full_frames,
            partial_frames = frames.partial_frames,
            idle_frames = frames.idle_frames,
            held_frames = frames.held_frames,
            transitions = frames.transitions,
            pixels_committed = frames.pixels_committed,
            commit_failures = self.commit_failures,
            "frame_summary"
        );
        info!(
            target: "runtime.shutdown",
            commits = output.commits,
            bytes_written = output.bytes_written,
            "display_summary"
        );
        info!(
            target: "runtime.shutdown",
            accepted = input.accepted,
            debounced = input.debounced,
            dropped = input.dropped,
            unmapped = input.unmapped,
            read_errors = input.read_errors,
            "input_summary"
        );
        info!(
            target: "runtime.shutdown",
            fonts = render.fonts_loaded,
            text_entries = render.text.size,
            text_hits = render.text.hits,
            text_misses = render.text.misses,
            text_evictions = render.text.evictions,
            "cache_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::HeadlessDisplay;
    use core_content::{MemoryContent, ROOT_ID};
    use core_events::LogicalAction;
    use core_nav::PopPolicy;
    use core_views::{Library, ListScreen};
    use embedded_graphics::geometry::Size;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::rc::Rc;

    fn driver(policy: PopPolicy) -> FrameDriver<HeadlessDisplay> {
        let size = Size::new(160, 120);
        let lib = Library::without_assets(Rc::new(MemoryContent::sample()), size);
        let root = ListScreen::new(lib, ROOT_ID).unwrap();
        let nav = Navigator::new(Box::new(root), size, policy);
        FrameDriver::new(nav, RenderContext::new(32), HeadlessDisplay::new(size), Duration::ZERO)
    }

    #[test]
    fn budget_ends_the_run() {
        let mut d = driver(PopPolicy::Ignore).with_budget(Some(5));
        let mut input: VecDeque<LogicalAction> = [LogicalAction::Down, LogicalAction::Confirm].into();
        let reason = d.run(&mut input).unwrap();
        assert_eq!(reason, ShutdownReason::TickBudget);
        assert_eq!(d.ticks(), 5);
        let commits = d.display().commits();
        // Initial frame and the push are full; the selection move is partial.
        assert_eq!(commits[0], vec![d.navigator().frame()]);
        assert_ne!(commits[1], vec![d.navigator().frame()]);
        assert_eq!(commits[2], vec![d.navigator().frame()]);
        assert_eq!(d.navigator().depth(), 2);
    }

    #[test]
    fn raised_flag_stops_before_the_first_tick() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut d = driver(PopPolicy::Ignore).with_shutdown(flag);
        let mut input: VecDeque<LogicalAction> = VecDeque::new();
        assert_eq!(d.run(&mut input).unwrap(), ShutdownReason::Signal);
        assert_eq!(d.ticks(), 0);
        assert!(d.display().commits().is_empty());
    }

    #[test]
    fn fatal_root_pop_ends_the_run_with_an_error() {
        let mut d = driver(PopPolicy::Fatal).with_budget(Some(10));
        let mut input: VecDeque<LogicalAction> = [LogicalAction::Cancel].into();
        let err = d.run(&mut input).unwrap_err();
        assert!(err.to_string().contains("root screen"));
    }
}
