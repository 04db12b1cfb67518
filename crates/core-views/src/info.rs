use crate::list::{chrome, label};
use crate::{Library, theme};
use core_events::{LogicalAction, telemetry_snapshot};
use core_nav::{Damage, NavRequest, RenderFrame, Screen};
use core_render::{DirtyRect, RenderContextStats, StaticSurfaceCache};
use embedded_graphics::geometry::Point;
use std::time::Duration;

const CHROME: &str = "chrome";
const REFRESH: Duration = Duration::from_millis(500);

fn stat_lines(records: usize, render: &RenderContextStats) -> Vec<String> {
    let input = telemetry_snapshot();
    let text = render.text;
    vec![
        format!("records      {records}"),
        format!("inputs       {} accepted", input.accepted),
        format!("debounced    {}", input.debounced),
        format!("dropped      {}", input.dropped),
        format!("read errors  {}", input.read_errors),
        format!("fonts        {}", render.fonts_loaded),
        format!("text cache   {}/{}", text.size, text.capacity),
        format!("hit rate     {:.0}%", text.hit_rate() * 100.0),
        format!("evictions    {}", text.evictions),
    ]
}

/// Runtime statistics, refreshed twice a second. Only lines whose text
/// changed are repainted.
pub struct InfoScreen {
    lib: Library,
    since_refresh: Duration,
    stale: bool,
    painted: Vec<String>,
    statics: StaticSurfaceCache,
}

impl InfoScreen {
    pub fn new(lib: Library) -> Self {
        let mut statics = StaticSurfaceCache::new();
        let size = lib.frame;
        statics.register(CHROME, move || Ok(chrome(size, None)));
        Self {
            lib,
            since_refresh: Duration::ZERO,
            stale: true,
            painted: Vec::new(),
            statics,
        }
    }

    /// Lines as last painted.
    pub fn lines(&self) -> &[String] {
        &self.painted
    }

    fn line_rect(&self, row: usize) -> DirtyRect {
        DirtyRect {
            x: 0,
            y: (theme::HEADER_HEIGHT + 4 + row as u32 * (theme::ROW_HEIGHT - 4)) as i32,
            width: self.lib.frame.width,
            height: theme::ROW_HEIGHT - 4,
        }
    }

    fn paint_line(&self, frame: &mut RenderFrame<'_>, row: usize, text: &str) -> anyhow::Result<Option<DirtyRect>> {
        let rect = self.line_rect(row);
        let painted = frame.surface.fill_rect(rect, theme::BACKGROUND);
        let at = Point::new(theme::MARGIN, rect.y + 2);
        label(frame, text, theme::BODY_FONT, theme::TEXT, at, rect.width)?;
        Ok(painted)
    }
}

impl Screen for InfoScreen {
    fn name(&self) -> &str {
        "info"
    }

    fn on_enter(&mut self) {
        self.stale = true;
        self.painted.clear();
    }

    fn handle_input(&mut self, action: LogicalAction, nav: &mut NavRequest) {
        if matches!(action, LogicalAction::Cancel | LogicalAction::Menu) {
            nav.pop();
        }
    }

    fn update(&mut self, dt: Duration) {
        self.since_refresh += dt;
        if self.since_refresh >= REFRESH {
            self.since_refresh = Duration::ZERO;
            self.stale = true;
        }
    }

    fn render(&mut self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Damage> {
        if !frame.full_redraw && !self.stale {
            return Ok(Damage::Unchanged);
        }
        let lines = stat_lines(self.lib.content.len(), &frame.ctx.stats());
        self.stale = false;

        if frame.full_redraw || self.painted.is_empty() {
            let chrome = self.statics.get(CHROME)?;
            frame.surface.blit(&chrome, Point::zero());
            let width = frame.size().width;
            label(
                frame,
                "Status",
                theme::TITLE_FONT,
                theme::ACCENT,
                Point::new(theme::MARGIN, 5),
                width,
            )?;
            for (row, line) in lines.iter().enumerate() {
                self.paint_line(frame, row, line)?;
            }
            self.painted = lines;
            return Ok(Damage::Full);
        }

        let mut rects = Vec::new();
        for (row, line) in lines.iter().enumerate() {
            if self.painted.get(row) != Some(line) {
                rects.extend(self.paint_line(frame, row, line)?);
            }
        }
        self.painted = lines;
        if rects.is_empty() {
            return Ok(Damage::Unchanged);
        }
        Ok(Damage::Rects(rects))
    }
}
