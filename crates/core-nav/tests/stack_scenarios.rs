//! Navigator lifecycle and per-tick damage through the public API.

use core_events::LogicalAction;
use core_nav::{Damage, NavRequest, Navigator, PopPolicy, RenderFrame, Screen};
use core_render::{DirtyRect, RenderContext, Rgb565, Surface};
use embedded_graphics::geometry::Size;
use embedded_graphics::pixelcolor::RgbColor;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl<'a> Write for LockedWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

const W: u32 = 48;
const H: u32 = 32;

type Journal = Rc<RefCell<Vec<String>>>;

/// What the probe screen returns from `render`.
#[derive(Clone)]
enum Paint {
    Nothing,
    Rects(Vec<DirtyRect>),
    Fail,
}

struct Probe {
    name: &'static str,
    journal: Journal,
    paint: Rc<RefCell<Paint>>,
    updates: Rc<RefCell<Vec<Duration>>>,
}

impl Probe {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            paint: Rc::new(RefCell::new(Paint::Nothing)),
            updates: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn log(&self, event: &str) {
        self.journal.borrow_mut().push(format!("{}.{event}", self.name));
    }
}

impl Screen for Probe {
    fn name(&self) -> &str {
        self.name
    }

    fn on_enter(&mut self) {
        self.log("enter");
    }

    fn on_exit(&mut self) {
        self.log("exit");
    }

    fn handle_input(&mut self, action: LogicalAction, nav: &mut NavRequest) {
        self.log(action.as_str());
        match action {
            LogicalAction::Confirm => nav.push(Probe::new("detail", &self.journal)),
            LogicalAction::Right => nav.replace(Probe::new("sibling", &self.journal)),
            LogicalAction::Cancel => nav.pop(),
            _ => {}
        }
    }

    fn update(&mut self, dt: Duration) {
        self.updates.borrow_mut().push(dt);
    }

    fn render(&mut self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Damage> {
        match self.paint.borrow().clone() {
            Paint::Nothing => Ok(Damage::Unchanged),
            Paint::Rects(rects) => {
                for r in &rects {
                    frame.surface.fill_rect(*r, Rgb565::WHITE);
                }
                Ok(Damage::Rects(rects))
            }
            Paint::Fail => anyhow::bail!("probe asked to fail"),
        }
    }
}

struct Rig {
    nav: Navigator,
    input: VecDeque<LogicalAction>,
    surface: Surface,
    ctx: RenderContext,
}

impl Rig {
    fn new(root: Probe, policy: PopPolicy) -> Self {
        Self {
            nav: Navigator::new(Box::new(root), Size::new(W, H), policy),
            input: VecDeque::new(),
            surface: Surface::new(W, H, Rgb565::BLACK),
            ctx: RenderContext::new(16),
        }
    }

    fn tick(&mut self, action: LogicalAction) -> core_nav::FrameOutcome {
        if !action.is_none() {
            self.input.push_back(action);
        }
        self.nav
            .tick(
                &mut self.input,
                Duration::from_millis(33),
                &mut self.surface,
                &mut self.ctx,
            )
            .expect("tick")
    }
}

fn full() -> Vec<DirtyRect> {
    vec![DirtyRect::new(0, 0, W as i32, H as i32).unwrap()]
}

fn rect(x: i32, y: i32, w: i32, h: i32) -> DirtyRect {
    DirtyRect::new(x, y, w, h).unwrap()
}

#[test]
fn home_detail_push_pop_lifecycle() {
    let journal: Journal = Rc::default();
    let mut rig = Rig::new(Probe::new("home", &journal), PopPolicy::Ignore);
    assert_eq!(rig.tick(LogicalAction::None).regions, full());
    assert_eq!(rig.tick(LogicalAction::None).regions, Vec::<DirtyRect>::new());
    journal.borrow_mut().clear();

    let pushed = rig.tick(LogicalAction::Confirm);
    assert_eq!(rig.nav.names(), vec!["home", "detail"]);
    assert!(pushed.transitioned);
    assert!(pushed.full);
    assert_eq!(pushed.regions, full());
    assert_eq!(
        *journal.borrow(),
        vec!["home.confirm", "home.exit", "detail.enter"]
    );
    journal.borrow_mut().clear();

    let popped = rig.tick(LogicalAction::Cancel);
    assert_eq!(rig.nav.names(), vec!["home"]);
    assert_eq!(popped.regions, full());
    assert_eq!(
        *journal.borrow(),
        vec!["detail.cancel", "detail.exit", "home.enter"]
    );
    assert_eq!(rig.nav.metrics().snapshot().transitions, 2);
}

#[test]
fn replace_discards_the_old_top() {
    let journal: Journal = Rc::default();
    let mut rig = Rig::new(Probe::new("home", &journal), PopPolicy::Ignore);
    rig.tick(LogicalAction::Confirm);
    journal.borrow_mut().clear();

    let out = rig.tick(LogicalAction::Right);
    assert_eq!(out.regions, full());
    assert_eq!(rig.nav.names(), vec!["home", "sibling"]);
    assert_eq!(
        *journal.borrow(),
        vec!["detail.right", "detail.exit", "sibling.enter"]
    );

    // Back goes to home, not to the replaced detail.
    rig.tick(LogicalAction::Cancel);
    assert_eq!(rig.nav.names(), vec!["home"]);
}

#[test]
fn update_runs_on_the_new_top_after_navigation() {
    let journal: Journal = Rc::default();
    let root = Probe::new("home", &journal);
    let root_updates = root.updates.clone();
    let mut rig = Rig::new(root, PopPolicy::Ignore);
    rig.tick(LogicalAction::None);
    assert_eq!(root_updates.borrow().len(), 1);
    rig.tick(LogicalAction::Confirm);
    // Home handled the action, but the pushed detail got the update.
    assert_eq!(root_updates.borrow().len(), 1);
}

#[test]
fn partial_damage_is_forwarded_and_coalesced() {
    let journal: Journal = Rc::default();
    let root = Probe::new("home", &journal);
    let paint = root.paint.clone();
    let mut rig = Rig::new(root, PopPolicy::Ignore);
    rig.tick(LogicalAction::None);

    *paint.borrow_mut() = Paint::Rects(vec![
        rect(0, 10, 8, 8),
        rect(2, 12, 2, 2),
        rect(20, 0, 4, 4),
    ]);
    let out = rig.tick(LogicalAction::None);
    assert!(!out.full);
    assert_eq!(out.regions, vec![rect(20, 0, 4, 4), rect(0, 10, 8, 8)]);
    let snap = rig.nav.metrics().snapshot();
    assert_eq!(snap.partial_frames, 1);
    assert_eq!(snap.pixels_committed, (W * H) as u64 + 16 + 64);
}

#[test]
fn empty_rect_list_means_full_redraw() {
    let journal: Journal = Rc::default();
    let root = Probe::new("home", &journal);
    let paint = root.paint.clone();
    let mut rig = Rig::new(root, PopPolicy::Ignore);
    rig.tick(LogicalAction::None);

    *paint.borrow_mut() = Paint::Rects(Vec::new());
    let out = rig.tick(LogicalAction::None);
    assert!(out.full);
    assert_eq!(out.regions, full());
    assert_eq!(rig.nav.metrics().snapshot().empty_damage_fallbacks, 1);
}

#[test]
fn unchanged_commits_nothing() {
    let journal: Journal = Rc::default();
    let mut rig = Rig::new(Probe::new("home", &journal), PopPolicy::Ignore);
    rig.tick(LogicalAction::None);
    let out = rig.tick(LogicalAction::Up);
    assert!(out.is_idle());
    assert_eq!(out.action, LogicalAction::Up);
    assert_eq!(rig.nav.metrics().snapshot().idle_frames, 1);
}

#[test]
fn render_failure_holds_frame_and_forces_full_next() {
    let journal: Journal = Rc::default();
    let root = Probe::new("home", &journal);
    let paint = root.paint.clone();
    let mut rig = Rig::new(root, PopPolicy::Ignore);
    rig.tick(LogicalAction::None);

    *paint.borrow_mut() = Paint::Fail;
    let buf = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter { inner: buf.clone() })
        .finish();
    let held = with_default(subscriber, || rig.tick(LogicalAction::None));
    assert!(held.held);
    assert!(held.regions.is_empty());
    let log = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    assert!(log.contains("ERROR nav:"));
    assert!(log.contains("render_failed_frame_held"));
    assert!(log.contains("probe asked to fail"));

    *paint.borrow_mut() = Paint::Rects(vec![rect(0, 0, 2, 2)]);
    let recovered = rig.tick(LogicalAction::None);
    assert!(recovered.full);
    assert_eq!(recovered.regions, full());
    assert_eq!(rig.nav.metrics().snapshot().held_frames, 1);
}

#[test]
fn root_pop_is_ignored_and_logged() {
    let journal: Journal = Rc::default();
    let mut rig = Rig::new(Probe::new("home", &journal), PopPolicy::Ignore);
    rig.tick(LogicalAction::None);
    journal.borrow_mut().clear();

    let buf = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter { inner: buf.clone() })
        .finish();
    let out = with_default(subscriber, || rig.tick(LogicalAction::Cancel));
    let log = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    assert!(log.contains("WARN nav:"));
    assert!(log.contains("root_pop_ignored"));

    assert!(!out.transitioned);
    assert!(out.is_idle());
    assert_eq!(rig.nav.depth(), 1);
    // No exit or enter hooks ran.
    assert_eq!(*journal.borrow(), vec!["home.cancel"]);
}

#[test]
fn fatal_root_pop_is_an_error() {
    let journal: Journal = Rc::default();
    let mut rig = Rig::new(Probe::new("home", &journal), PopPolicy::Fatal);
    rig.input.push_back(LogicalAction::Cancel);
    let err = rig
        .nav
        .tick(
            &mut rig.input,
            Duration::ZERO,
            &mut rig.surface,
            &mut rig.ctx,
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "attempted to pop the root screen `home`");
    assert_eq!(rig.nav.depth(), 1);
}
