//! Screen stack navigation and the per-tick frame sequence.
//!
//! The [`Navigator`] owns every live [`Screen`] and drives one tick at a
//! time in a fixed order: pull one action, let the top screen handle it,
//! apply any navigation it requested, advance time, render, and collect the
//! dirty regions the frame driver must commit. Any tick that changed the
//! stack commits exactly one full-frame region.

mod metrics;
mod navigator;
mod screen;

pub use metrics::{FrameMetrics, FrameMetricsSnapshot};
pub use navigator::{FrameOutcome, NavError, Navigator, PopPolicy};
pub use screen::{Damage, NavOp, NavRequest, RenderFrame, Screen};
