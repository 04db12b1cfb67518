use crate::pulse::Pulse;
use crate::text::fit;
use crate::theme::{self, FontSpec};
use crate::{InfoScreen, Library, push_record};
use core_content::{ContentError, Record, RecordId};
use core_events::LogicalAction;
use core_nav::{Damage, NavRequest, RenderFrame, Screen};
use core_render::{DirtyRect, Rgb565, StaticSurfaceCache, Surface};
use embedded_graphics::geometry::{Point, Size};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

const CHROME: &str = "chrome";

/// Chrome shared by list-style screens: background, header band, footer rule
/// and the optional `logo` asset at the right of the header.
pub(crate) fn chrome(size: Size, logo: Option<Rc<Surface>>) -> Surface {
    let mut s = Surface::new(size.width, size.height, theme::BACKGROUND);
    let header = DirtyRect::full(Size::new(size.width, theme::HEADER_HEIGHT));
    s.fill_rect(header, theme::HEADER_BG);
    let rule = |y: u32| DirtyRect {
        x: 0,
        y: y as i32,
        width: size.width,
        height: 1,
    };
    s.fill_rect(rule(theme::HEADER_HEIGHT - 1), theme::DIVIDER);
    s.fill_rect(rule(size.height.saturating_sub(theme::FOOTER_HEIGHT)), theme::DIVIDER);
    if let Some(logo) = logo {
        let x = size.width as i32 - logo.width() as i32 - theme::MARGIN;
        let y = (theme::HEADER_HEIGHT as i32 - logo.height() as i32) / 2;
        s.blit(&logo, Point::new(x, y.max(0)));
    }
    s
}

/// Draw `text` clipped to the columns that fit in `width`.
pub(crate) fn label(
    frame: &mut RenderFrame<'_>,
    text: &str,
    font: FontSpec,
    color: Rgb565,
    at: Point,
    width: u32,
) -> anyhow::Result<Option<DirtyRect>> {
    let face = frame.ctx.fonts.get_font(font.0, font.1)?;
    let shown = fit(text, face.columns(width));
    Ok(frame.ctx.draw_text(frame.surface, &shown, font, color, at)?)
}

pub(crate) fn footer_rect(size: Size) -> DirtyRect {
    let top = size.height.saturating_sub(theme::FOOTER_HEIGHT) + 1;
    DirtyRect {
        x: 0,
        y: top as i32,
        width: size.width,
        height: theme::FOOTER_HEIGHT.saturating_sub(1).max(1),
    }
}

/// What is on the surface right now, so partial renders know what to repaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Painted {
    top: usize,
    selected: usize,
    level: u8,
}

/// Children of one record as a scrolling list.
pub struct ListScreen {
    lib: Library,
    record: Rc<Record>,
    items: Vec<Rc<Record>>,
    selected: usize,
    top: usize,
    pulse: Pulse,
    statics: StaticSurfaceCache,
    painted: Option<Painted>,
}

impl ListScreen {
    pub fn new(lib: Library, id: RecordId) -> Result<Self, ContentError> {
        let record = lib.content.lookup(id)?;
        let items = lib.content.lookup_batch(&record.children)?;
        let mut statics = StaticSurfaceCache::new();
        let (size, logo) = (lib.frame, lib.assets.asset("logo"));
        statics.register(CHROME, move || Ok(chrome(size, logo.clone())));
        Ok(Self {
            lib,
            record,
            items,
            selected: 0,
            top: 0,
            pulse: Pulse::default(),
            statics,
            painted: None,
        })
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn selected(&self) -> Option<&Record> {
        self.items.get(self.selected).map(|r| r.as_ref())
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Rows that fit between header and footer.
    pub fn visible_rows(&self) -> usize {
        let h = self.lib.frame.height;
        let body = h.saturating_sub(theme::HEADER_HEIGHT + theme::FOOTER_HEIGHT);
        ((body / theme::ROW_HEIGHT) as usize).max(1)
    }

    fn select(&mut self, index: usize) {
        let index = index.min(self.items.len().saturating_sub(1));
        if index == self.selected {
            return;
        }
        self.selected = index;
        let rows = self.visible_rows();
        if self.selected < self.top {
            self.top = self.selected;
        } else if self.selected >= self.top + rows {
            self.top = self.selected + 1 - rows;
        }
        self.pulse.reset();
    }

    fn row_rect(&self, slot: usize) -> DirtyRect {
        DirtyRect {
            x: 0,
            y: (theme::HEADER_HEIGHT + slot as u32 * theme::ROW_HEIGHT) as i32,
            width: self.lib.frame.width,
            height: theme::ROW_HEIGHT,
        }
    }

    fn list_rect(&self) -> DirtyRect {
        DirtyRect {
            x: 0,
            y: theme::HEADER_HEIGHT as i32,
            width: self.lib.frame.width,
            height: self.visible_rows() as u32 * theme::ROW_HEIGHT,
        }
    }

    fn paint_row(&self, frame: &mut RenderFrame<'_>, slot: usize) -> anyhow::Result<Option<DirtyRect>> {
        let index = self.top + slot;
        let rect = self.row_rect(slot);
        let selected = index == self.selected && !self.items.is_empty();
        let bg = if selected {
            self.pulse.color(theme::SELECT_LOW, theme::SELECT_HIGH)
        } else {
            theme::BACKGROUND
        };
        let painted = frame.surface.fill_rect(rect, bg);
        let Some(item) = self.items.get(index) else {
            if index == 0 {
                let at = Point::new(theme::MARGIN, rect.y + 4);
                label(frame, "(empty)", theme::ROW_FONT, theme::TEXT_DIM, at, rect.width)?;
            }
            return Ok(painted);
        };
        let marker_w = if item.is_leaf() { 0 } else { 12 };
        let text_w = rect.width.saturating_sub(2 * theme::MARGIN as u32 + marker_w);
        let color = if selected { theme::TEXT } else { theme::TEXT_DIM };
        let at = Point::new(theme::MARGIN, rect.y + 4);
        label(frame, &item.title, theme::ROW_FONT, color, at, text_w)?;
        if !item.is_leaf() {
            let at = Point::new(rect.width as i32 - theme::MARGIN - 8, rect.y + 4);
            frame
                .ctx
                .draw_text(frame.surface, ">", theme::ROW_FONT, theme::ACCENT, at)?;
        }
        Ok(painted)
    }

    fn paint_footer(&self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Option<DirtyRect>> {
        let rect = footer_rect(frame.size());
        let painted = frame.surface.fill_rect(rect, theme::BACKGROUND);
        let position = if self.items.is_empty() {
            "0/0".to_string()
        } else {
            format!("{}/{}", self.selected + 1, self.items.len())
        };
        label(
            frame,
            &position,
            theme::SMALL_FONT,
            theme::TEXT_DIM,
            Point::new(theme::MARGIN, rect.y + 2),
            rect.width,
        )?;
        Ok(painted)
    }

    fn paint_all(&mut self, frame: &mut RenderFrame<'_>) -> anyhow::Result<()> {
        let chrome = self.statics.get(CHROME)?;
        frame.surface.blit(&chrome, Point::zero());
        let width = frame.size().width.saturating_sub(2 * theme::MARGIN as u32 + 40);
        label(
            frame,
            &self.record.title,
            theme::TITLE_FONT,
            theme::ACCENT,
            Point::new(theme::MARGIN, 5),
            width,
        )?;
        for slot in 0..self.visible_rows() {
            self.paint_row(frame, slot)?;
        }
        self.paint_footer(frame)?;
        Ok(())
    }
}

impl Screen for ListScreen {
    fn name(&self) -> &str {
        "list"
    }

    fn on_enter(&mut self) {
        self.pulse.reset();
        self.painted = None;
        debug!(target: "views", record = self.record.id, items = self.items.len(), "list_entered");
    }

    fn handle_input(&mut self, action: LogicalAction, nav: &mut NavRequest) {
        let page = self.visible_rows();
        match action {
            LogicalAction::Up => self.select(self.selected.saturating_sub(1)),
            LogicalAction::Down => self.select(self.selected + 1),
            LogicalAction::Left => self.select(self.selected.saturating_sub(page)),
            LogicalAction::Right => self.select(self.selected + page),
            LogicalAction::Confirm => {
                let Some(item) = self.items.get(self.selected) else {
                    return;
                };
                if let Err(e) = push_record(&self.lib, item.id, nav) {
                    warn!(target: "views", record = item.id, error = %e, "record_open_failed");
                }
            }
            LogicalAction::Cancel => nav.pop(),
            LogicalAction::Menu => nav.push(InfoScreen::new(self.lib.clone())),
            LogicalAction::None => {}
        }
    }

    fn update(&mut self, dt: Duration) {
        self.pulse.advance(dt);
    }

    fn render(&mut self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Damage> {
        let now = Painted {
            top: self.top,
            selected: self.selected,
            level: self.pulse.level(),
        };
        let Some(before) = self.painted.filter(|_| !frame.full_redraw) else {
            self.paint_all(frame)?;
            self.painted = Some(now);
            return Ok(Damage::Full);
        };
        if before == now {
            return Ok(Damage::Unchanged);
        }

        let mut rects = Vec::new();
        if before.top != now.top {
            for slot in 0..self.visible_rows() {
                self.paint_row(frame, slot)?;
            }
            rects.push(self.list_rect());
            rects.extend(self.paint_footer(frame)?);
        } else if before.selected != now.selected {
            for index in [before.selected, now.selected] {
                rects.extend(self.paint_row(frame, index - now.top)?);
            }
            rects.extend(self.paint_footer(frame)?);
        } else {
            rects.extend(self.paint_row(frame, now.selected - now.top)?);
        }
        self.painted = Some(now);
        Ok(Damage::from_rects(rects))
    }
}
