use crate::list::{chrome, footer_rect, label};
use crate::text::wrap;
use crate::{InfoScreen, Library, replace_record, theme};
use core_content::{ContentError, Record, RecordId};
use core_events::LogicalAction;
use core_nav::{Damage, NavRequest, RenderFrame, Screen};
use core_render::{DirtyRect, StaticSurfaceCache};
use embedded_graphics::geometry::Point;
use std::rc::Rc;
use tracing::{debug, warn};

const CHROME: &str = "chrome";

/// One record's body, word-wrapped to the frame and scrolled a line at a time.
/// Left and right step to the previous and next sibling in place.
pub struct DetailScreen {
    lib: Library,
    record: Rc<Record>,
    siblings: Vec<RecordId>,
    position: usize,
    // Wrapped on first render, once the body font is known.
    lines: Option<Vec<String>>,
    page: usize,
    scroll: usize,
    painted_scroll: Option<usize>,
    statics: StaticSurfaceCache,
}

impl DetailScreen {
    pub fn new(lib: Library, id: RecordId) -> Result<Self, ContentError> {
        let record = lib.content.lookup(id)?;
        let siblings = match record.parent {
            Some(parent) => lib.content.lookup(parent)?.children.clone(),
            None => vec![id],
        };
        let position = siblings.iter().position(|s| *s == id).unwrap_or(0);
        let mut statics = StaticSurfaceCache::new();
        let (size, logo) = (lib.frame, lib.assets.asset("logo"));
        statics.register(CHROME, move || Ok(chrome(size, logo.clone())));
        Ok(Self {
            lib,
            record,
            siblings,
            position,
            lines: None,
            page: 1,
            scroll: 0,
            painted_scroll: None,
            statics,
        })
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Wrapped body lines, once the screen has rendered.
    pub fn lines(&self) -> Option<&[String]> {
        self.lines.as_deref()
    }

    fn max_scroll(&self) -> usize {
        self.lines
            .as_ref()
            .map_or(0, |l| l.len().saturating_sub(self.page))
    }

    fn sibling(&self, step: isize) -> Option<RecordId> {
        let next = self.position.checked_add_signed(step)?;
        self.siblings.get(next).copied()
    }

    fn body_rect(&self) -> DirtyRect {
        let top = theme::HEADER_HEIGHT + theme::LINE_GAP;
        let bottom = self.lib.frame.height.saturating_sub(theme::FOOTER_HEIGHT);
        DirtyRect {
            x: 0,
            y: top as i32,
            width: self.lib.frame.width,
            height: bottom.saturating_sub(top).max(1),
        }
    }

    fn paint_body(&mut self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Option<DirtyRect>> {
        let rect = self.body_rect();
        let face = frame.ctx.fonts.get_font(theme::BODY_FONT.0, theme::BODY_FONT.1)?;
        let step = face.line_height() + theme::LINE_GAP;
        let text_w = rect.width.saturating_sub(2 * theme::MARGIN as u32);
        let lines = self
            .lines
            .get_or_insert_with(|| wrap(&self.record.body, face.columns(text_w)));
        self.page = ((rect.height / step.max(1)) as usize).max(1);
        self.scroll = self.scroll.min(lines.len().saturating_sub(self.page));

        let painted = frame.surface.fill_rect(rect, theme::BACKGROUND);
        for (row, line) in lines.iter().skip(self.scroll).take(self.page).enumerate() {
            let at = Point::new(theme::MARGIN, rect.y + (row as u32 * step) as i32);
            frame
                .ctx
                .draw_text(frame.surface, line, theme::BODY_FONT, theme::TEXT, at)?;
        }
        Ok(painted)
    }

    fn paint_footer(&self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Option<DirtyRect>> {
        let rect = footer_rect(frame.size());
        let painted = frame.surface.fill_rect(rect, theme::BACKGROUND);
        let total = self.lines.as_ref().map_or(0, Vec::len);
        let mut text = format!("{}/{}", self.position + 1, self.siblings.len());
        if total > self.page {
            let last = (self.scroll + self.page).min(total);
            text.push_str(&format!("  lines {}-{} of {total}", self.scroll + 1, last));
        }
        label(
            frame,
            &text,
            theme::SMALL_FONT,
            theme::TEXT_DIM,
            Point::new(theme::MARGIN, rect.y + 2),
            rect.width,
        )?;
        Ok(painted)
    }
}

impl Screen for DetailScreen {
    fn name(&self) -> &str {
        "detail"
    }

    fn on_enter(&mut self) {
        self.painted_scroll = None;
        debug!(target: "views", record = self.record.id, "detail_entered");
    }

    fn handle_input(&mut self, action: LogicalAction, nav: &mut NavRequest) {
        match action {
            LogicalAction::Up => self.scroll = self.scroll.saturating_sub(1),
            LogicalAction::Down => self.scroll = (self.scroll + 1).min(self.max_scroll()),
            LogicalAction::Left | LogicalAction::Right => {
                let step = if action == LogicalAction::Left { -1 } else { 1 };
                let Some(id) = self.sibling(step) else {
                    return;
                };
                if let Err(e) = replace_record(&self.lib, id, nav) {
                    warn!(target: "views", record = id, error = %e, "record_open_failed");
                }
            }
            LogicalAction::Cancel => nav.pop(),
            LogicalAction::Menu => nav.push(InfoScreen::new(self.lib.clone())),
            LogicalAction::Confirm | LogicalAction::None => {}
        }
    }

    fn render(&mut self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Damage> {
        if frame.full_redraw || self.painted_scroll.is_none() {
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
            self.paint_body(frame)?;
            self.paint_footer(frame)?;
            self.painted_scroll = Some(self.scroll);
            return Ok(Damage::Full);
        }
        if self.painted_scroll == Some(self.scroll) {
            return Ok(Damage::Unchanged);
        }
        let mut rects = Vec::new();
        rects.extend(self.paint_body(frame)?);
        rects.extend(self.paint_footer(frame)?);
        self.painted_scroll = Some(self.scroll);
        Ok(Damage::from_rects(rects))
    }
}
