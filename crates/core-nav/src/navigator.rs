use crate::{Damage, FrameMetrics, NavOp, NavRequest, RenderFrame, Screen};
use core_config::PopLast;
use core_events::{ActionSource, LogicalAction};
use core_render::{DirtyRect, DirtyRegionTracker, RenderContext, Surface};
use embedded_graphics::geometry::Size;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("attempted to pop the root screen `{0}`")]
    RootPop(String),
}

/// What popping the only remaining screen does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopPolicy {
    /// Log and leave the stack as is.
    #[default]
    Ignore,
    Fatal,
}

impl From<PopLast> for PopPolicy {
    fn from(p: PopLast) -> Self {
        match p {
            PopLast::Ignore => PopPolicy::Ignore,
            PopLast::Fatal => PopPolicy::Fatal,
        }
    }
}

/// Result of one tick, ready for the frame driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    pub action: LogicalAction,
    /// Regions to commit, sorted by `(y, x)`. A full frame is one rect.
    pub regions: Vec<DirtyRect>,
    pub full: bool,
    /// The stack changed this tick.
    pub transitioned: bool,
    /// Rendering failed; commit nothing and keep showing the last frame.
    pub held: bool,
}

impl FrameOutcome {
    pub fn is_idle(&self) -> bool {
        self.regions.is_empty()
    }
}

pub struct Navigator {
    stack: Vec<Box<dyn Screen>>,
    tracker: DirtyRegionTracker,
    policy: PopPolicy,
    force_full: bool,
    metrics: FrameMetrics,
}

impl Navigator {
    /// Start with `root` entered and a full redraw armed.
    pub fn new(mut root: Box<dyn Screen>, frame: Size, policy: PopPolicy) -> Self {
        root.on_enter();
        info!(target: "nav", root = root.name(), width = frame.width, height = frame.height, "navigator_started");
        Self {
            stack: vec![root],
            tracker: DirtyRegionTracker::new(frame),
            policy,
            force_full: true,
            metrics: FrameMetrics::default(),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn top_name(&self) -> &str {
        self.stack.last().map_or("", |s| s.name())
    }

    /// Screen names from root to top.
    pub fn names(&self) -> Vec<&str> {
        self.stack.iter().map(|s| s.name()).collect()
    }

    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    pub fn frame(&self) -> DirtyRect {
        self.tracker.frame()
    }

    /// Make the next tick commit the whole frame, e.g. after the display
    /// dropped a commit.
    pub fn request_full_redraw(&mut self) {
        self.force_full = true;
    }

    fn transitioned(&mut self) {
        self.force_full = true;
        FrameMetrics::bump(&self.metrics.transitions, 1);
    }

    pub fn push(&mut self, mut screen: Box<dyn Screen>) {
        if let Some(top) = self.stack.last_mut() {
            top.on_exit();
        }
        screen.on_enter();
        info!(target: "nav", from = self.top_name(), to = screen.name(), "screen_pushed");
        self.stack.push(screen);
        self.transitioned();
    }

    /// Pop the top screen. Returns `Ok(false)` when the root pop was ignored.
    pub fn pop(&mut self) -> Result<bool, NavError> {
        if self.stack.len() <= 1 {
            let root = self.top_name().to_string();
            return match self.policy {
                PopPolicy::Ignore => {
                    FrameMetrics::bump(&self.metrics.ignored_pops, 1);
                    warn!(target: "nav", root = %root, "root_pop_ignored");
                    Ok(false)
                }
                PopPolicy::Fatal => {
                    error!(target: "nav", root = %root, "root_pop_rejected");
                    Err(NavError::RootPop(root))
                }
            };
        }
        if let Some(mut old) = self.stack.pop() {
            old.on_exit();
            info!(target: "nav", from = old.name(), "screen_popped");
        }
        if let Some(top) = self.stack.last_mut() {
            top.on_enter();
        }
        self.transitioned();
        Ok(true)
    }

    pub fn replace(&mut self, mut screen: Box<dyn Screen>) {
        if let Some(mut old) = self.stack.pop() {
            old.on_exit();
            info!(target: "nav", from = old.name(), to = screen.name(), "screen_replaced");
        }
        screen.on_enter();
        self.stack.push(screen);
        self.transitioned();
    }

    fn apply(&mut self, op: NavOp) -> Result<bool, NavError> {
        match op {
            NavOp::Push(s) => {
                self.push(s);
                Ok(true)
            }
            NavOp::Pop => self.pop(),
            NavOp::Replace(s) => {
                self.replace(s);
                Ok(true)
            }
        }
    }

    /// Run one tick: input, navigation, update, render, dirty-region collect.
    pub fn tick(
        &mut self,
        source: &mut dyn ActionSource,
        dt: Duration,
        surface: &mut Surface,
        ctx: &mut RenderContext,
    ) -> Result<FrameOutcome, NavError> {
        FrameMetrics::bump(&self.metrics.ticks, 1);
        let action = source.next_action();

        let mut transitioned = false;
        if !action.is_none() {
            let mut request = NavRequest::new();
            if let Some(top) = self.stack.last_mut() {
                top.handle_input(action, &mut request);
            }
            if let Some(op) = request.take() {
                debug!(target: "nav", %action, ?op, "navigation_requested");
                transitioned = self.apply(op)?;
            }
        }

        let Some(top) = self.stack.last_mut() else {
            // Unreachable: the stack is non-empty from construction on.
            return Ok(self.held(action, transitioned));
        };
        top.update(dt);

        let full_redraw = self.force_full;
        let started = Instant::now();
        let rendered = {
            let mut frame = RenderFrame {
                surface,
                ctx,
                full_redraw,
            };
            top.render(&mut frame)
        };
        self.metrics
            .last_render_ns
            .store(started.elapsed().as_nanos() as u64, Ordering::Relaxed);

        let damage = match rendered {
            Ok(d) => d,
            Err(e) => {
                error!(target: "nav", screen = top.name(), error = %format!("{e:#}"), "render_failed_frame_held");
                self.force_full = true;
                return Ok(self.held(action, transitioned));
            }
        };

        if full_redraw {
            self.tracker.mark_full();
        } else {
            match damage {
                Damage::Full => self.tracker.mark_full(),
                Damage::Rects(rects) if rects.is_empty() => {
                    FrameMetrics::bump(&self.metrics.empty_damage_fallbacks, 1);
                    self.tracker.mark_full();
                }
                Damage::Rects(rects) => {
                    for r in rects {
                        self.tracker.mark(r);
                    }
                }
                Damage::Unchanged => {}
            }
        }
        self.force_full = false;

        let full = self.tracker.is_full();
        let regions = self.tracker.consume();
        self.record(full, &regions);
        Ok(FrameOutcome {
            action,
            regions,
            full,
            transitioned,
            held: false,
        })
    }

    fn held(&mut self, action: LogicalAction, transitioned: bool) -> FrameOutcome {
        // Drop anything marked for the failed frame.
        let _ = self.tracker.consume();
        FrameMetrics::bump(&self.metrics.held_frames, 1);
        FrameOutcome {
            action,
            regions: Vec::new(),
            full: false,
            transitioned,
            held: true,
        }
    }

    fn record(&self, full: bool, regions: &[DirtyRect]) {
        let m = &self.metrics;
        if regions.is_empty() {
            FrameMetrics::bump(&m.idle_frames, 1);
            return;
        }
        if full {
            FrameMetrics::bump(&m.full_frames, 1);
        } else {
            FrameMetrics::bump(&m.partial_frames, 1);
        }
        FrameMetrics::bump(&m.regions_committed, regions.len() as u64);
        FrameMetrics::bump(&m.pixels_committed, regions.iter().map(DirtyRect::area).sum());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_render::Rgb565;
    use embedded_graphics::pixelcolor::RgbColor;
    use std::collections::VecDeque;

    struct Plain(&'static str);

    impl Screen for Plain {
        fn name(&self) -> &str {
            self.0
        }
        fn handle_input(&mut self, action: LogicalAction, nav: &mut NavRequest) {
            if action == LogicalAction::Cancel {
                nav.pop();
            }
        }
        fn render(&mut self, _frame: &mut RenderFrame<'_>) -> anyhow::Result<Damage> {
            Ok(Damage::Unchanged)
        }
    }

    fn size() -> Size {
        Size::new(32, 16)
    }

    #[test]
    fn first_tick_is_full_then_idle() {
        let mut nav = Navigator::new(Box::new(Plain("home")), size(), PopPolicy::Ignore);
        let mut surface = Surface::new(32, 16, Rgb565::BLACK);
        let mut ctx = RenderContext::default();
        let mut input: VecDeque<LogicalAction> = VecDeque::new();
        let first = nav
            .tick(&mut input, Duration::ZERO, &mut surface, &mut ctx)
            .unwrap();
        assert!(first.full);
        assert_eq!(first.regions, vec![DirtyRect::new(0, 0, 32, 16).unwrap()]);
        let second = nav
            .tick(&mut input, Duration::ZERO, &mut surface, &mut ctx)
            .unwrap();
        assert!(second.is_idle());
        assert!(!second.full);
    }

    #[test]
    fn root_pop_policies() {
        let mut nav = Navigator::new(Box::new(Plain("home")), size(), PopPolicy::Ignore);
        assert_eq!(nav.pop(), Ok(false));
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.metrics().snapshot().ignored_pops, 1);

        let mut strict = Navigator::new(Box::new(Plain("home")), size(), PopPolicy::Fatal);
        assert_eq!(strict.pop(), Err(NavError::RootPop("home".into())));
        assert_eq!(strict.depth(), 1);
    }

    #[test]
    fn fatal_root_pop_surfaces_from_tick() {
        let mut nav = Navigator::new(Box::new(Plain("home")), size(), PopPolicy::Fatal);
        let mut surface = Surface::new(32, 16, Rgb565::BLACK);
        let mut ctx = RenderContext::default();
        let mut input: VecDeque<LogicalAction> = [LogicalAction::Cancel].into();
        let err = nav
            .tick(&mut input, Duration::ZERO, &mut surface, &mut ctx)
            .unwrap_err();
        assert_eq!(err, NavError::RootPop("home".into()));
        assert_eq!(nav.names(), vec!["home"]);
    }

    #[test]
    fn policy_from_config() {
        assert_eq!(PopPolicy::from(PopLast::Fatal), PopPolicy::Fatal);
        assert_eq!(PopPolicy::from(PopLast::default()), PopPolicy::Ignore);
    }
}
