use core_events::LogicalAction;
use core_render::{DirtyRect, RenderContext, Surface};
use embedded_graphics::geometry::Size;
use std::fmt;
use std::time::Duration;

/// One navigable view. Screens are owned by the navigator and only talk to
/// it through [`NavRequest`].
pub trait Screen {
    fn name(&self) -> &str;

    /// Runs every time the screen becomes the top of the stack, including
    /// when it is uncovered by a pop.
    fn on_enter(&mut self) {}

    /// Runs every time the screen stops being the top of the stack.
    fn on_exit(&mut self) {}

    /// Pure state transition. Navigation is requested, not performed.
    fn handle_input(&mut self, action: LogicalAction, nav: &mut NavRequest);

    fn update(&mut self, _dt: Duration) {}

    /// Draw into `frame.surface` and report exactly what was modified.
    fn render(&mut self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Damage>;
}

/// What a render call modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Damage {
    Rects(Vec<DirtyRect>),
    Full,
    /// Nothing was drawn this call.
    Unchanged,
}

impl Damage {
    /// An empty list means "redraw everything", never "nothing changed".
    /// Screens that drew nothing return [`Damage::Unchanged`].
    pub fn from_rects(rects: Vec<DirtyRect>) -> Self {
        if rects.is_empty() {
            Damage::Full
        } else {
            Damage::Rects(rects)
        }
    }
}

impl From<Vec<DirtyRect>> for Damage {
    fn from(rects: Vec<DirtyRect>) -> Self {
        Damage::from_rects(rects)
    }
}

impl From<DirtyRect> for Damage {
    fn from(rect: DirtyRect) -> Self {
        Damage::Rects(vec![rect])
    }
}

/// Everything a screen may touch while rendering.
pub struct RenderFrame<'a> {
    pub surface: &'a mut Surface,
    pub ctx: &'a mut RenderContext,
    /// The surface content is not the previous frame; repaint the whole area.
    pub full_redraw: bool,
}

impl RenderFrame<'_> {
    pub fn size(&self) -> Size {
        Size::new(self.surface.width(), self.surface.height())
    }

    pub fn bounds(&self) -> DirtyRect {
        self.surface.bounds()
    }
}

pub enum NavOp {
    Push(Box<dyn Screen>),
    Pop,
    Replace(Box<dyn Screen>),
}

impl fmt::Debug for NavOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavOp::Push(s) => write!(f, "Push({})", s.name()),
            NavOp::Pop => f.write_str("Pop"),
            NavOp::Replace(s) => write!(f, "Replace({})", s.name()),
        }
    }
}

/// Navigation sink handed to `handle_input`. The last request made during a
/// call wins; the navigator applies it right after the call returns.
#[derive(Debug, Default)]
pub struct NavRequest {
    op: Option<NavOp>,
}

impl NavRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, screen: impl Screen + 'static) {
        self.op = Some(NavOp::Push(Box::new(screen)));
    }

    pub fn pop(&mut self) {
        self.op = Some(NavOp::Pop);
    }

    pub fn replace(&mut self, screen: impl Screen + 'static) {
        self.op = Some(NavOp::Replace(Box::new(screen)));
    }

    pub fn is_empty(&self) -> bool {
        self.op.is_none()
    }

    pub fn take(&mut self) -> Option<NavOp> {
        self.op.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl Screen for Blank {
        fn name(&self) -> &str {
            "blank"
        }
        fn handle_input(&mut self, _: LogicalAction, _: &mut NavRequest) {}
        fn render(&mut self, _: &mut RenderFrame<'_>) -> anyhow::Result<Damage> {
            Ok(Damage::Unchanged)
        }
    }

    #[test]
    fn empty_rect_list_means_full_redraw() {
        assert_eq!(Damage::from_rects(Vec::new()), Damage::Full);
        assert_eq!(Damage::from(Vec::new()), Damage::Full);
        let r = DirtyRect::new(0, 0, 4, 4).unwrap();
        assert_eq!(Damage::from(vec![r]), Damage::Rects(vec![r]));
    }

    #[test]
    fn last_request_wins() {
        let mut req = NavRequest::new();
        assert!(req.is_empty());
        req.push(Blank);
        req.pop();
        assert!(matches!(req.take(), Some(NavOp::Pop)));
        assert!(req.take().is_none());
        req.replace(Blank);
        assert_eq!(format!("{:?}", req.take()), "Some(Replace(blank))");
    }
}
