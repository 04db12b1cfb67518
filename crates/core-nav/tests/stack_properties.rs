//! Property tests over arbitrary navigation sequences.

use core_events::LogicalAction;
use core_nav::{Damage, NavRequest, Navigator, PopPolicy, RenderFrame, Screen};
use core_render::{DirtyRect, RenderContext, Rgb565, Surface};
use embedded_graphics::geometry::Size;
use embedded_graphics::pixelcolor::RgbColor;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::time::Duration;

/// Confirm pushes, Cancel pops, Right replaces. Every other action repaints
/// a small corner so non-transition ticks are partial.
struct Node(u32);

impl Screen for Node {
    fn name(&self) -> &str {
        "node"
    }

    fn handle_input(&mut self, action: LogicalAction, nav: &mut NavRequest) {
        match action {
            LogicalAction::Confirm => nav.push(Node(self.0 + 1)),
            LogicalAction::Cancel => nav.pop(),
            LogicalAction::Right => nav.replace(Node(self.0)),
            _ => {}
        }
    }

    fn render(&mut self, frame: &mut RenderFrame<'_>) -> anyhow::Result<Damage> {
        let r = DirtyRect::new(0, 0, 4, 4)?;
        frame.surface.fill_rect(r, Rgb565::GREEN);
        Ok(Damage::from(r))
    }
}

fn action() -> impl Strategy<Value = LogicalAction> {
    prop::sample::select(vec![
        LogicalAction::Confirm,
        LogicalAction::Cancel,
        LogicalAction::Right,
        LogicalAction::Up,
        LogicalAction::None,
    ])
}

proptest! {
    #[test]
    fn stack_never_empty_and_transitions_commit_full_frame(
        actions in prop::collection::vec(action(), 1..64)
    ) {
        let size = Size::new(20, 10);
        let frame = DirtyRect::full(size);
        let mut nav = Navigator::new(Box::new(Node(0)), size, PopPolicy::Ignore);
        let mut surface = Surface::new(20, 10, Rgb565::BLACK);
        let mut ctx = RenderContext::new(4);
        let mut input = VecDeque::new();
        let mut expected_depth = 1usize;

        // Settle the initial full frame.
        nav.tick(&mut input, Duration::ZERO, &mut surface, &mut ctx).unwrap();

        for a in actions {
            input.push_back(a);
            let out = nav.tick(&mut input, Duration::ZERO, &mut surface, &mut ctx).unwrap();
            match a {
                LogicalAction::Confirm => expected_depth += 1,
                LogicalAction::Cancel if expected_depth > 1 => expected_depth -= 1,
                _ => {}
            }
            prop_assert!(nav.depth() >= 1);
            prop_assert_eq!(nav.depth(), expected_depth);
            if out.transitioned {
                prop_assert_eq!(out.regions, vec![frame]);
            } else {
                prop_assert_eq!(out.regions, vec![DirtyRect::new(0, 0, 4, 4).unwrap()]);
            }
        }
    }
}
