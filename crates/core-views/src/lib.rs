//! Screens for browsing the hierarchical dataset.
//!
//! - [`ListScreen`]: the children of one record, with a pulsing selection bar.
//! - [`DetailScreen`]: a leaf record's wrapped body, scrollable, with
//!   left/right stepping to siblings.
//! - [`InfoScreen`]: live input and cache statistics.
//!
//! Screens never reach into one another. Everything they share is the
//! read-only [`Library`] handed to their constructors.

mod detail;
mod info;
mod list;
mod pulse;
pub mod text;
pub mod theme;

pub use detail::DetailScreen;
pub use info::InfoScreen;
pub use list::ListScreen;
pub use pulse::{Pulse, lerp};

use core_content::{AssetProvider, ContentError, ContentProvider, MemoryAssets, RecordId};
use core_nav::NavRequest;
use embedded_graphics::geometry::Size;
use std::rc::Rc;

/// Read-only context shared by every screen.
#[derive(Clone)]
pub struct Library {
    pub content: Rc<dyn ContentProvider>,
    pub assets: Rc<dyn AssetProvider>,
    /// Logical size of the frame all screens draw into.
    pub frame: Size,
}

impl Library {
    pub fn new(content: Rc<dyn ContentProvider>, assets: Rc<dyn AssetProvider>, frame: Size) -> Self {
        Self {
            content,
            assets,
            frame,
        }
    }

    /// Content without any image assets.
    pub fn without_assets(content: Rc<dyn ContentProvider>, frame: Size) -> Self {
        Self::new(content, Rc::new(MemoryAssets::new()), frame)
    }
}

/// How a record opens: records with children as a list, leaves as a detail page.
enum Opened {
    List(ListScreen),
    Detail(DetailScreen),
}

fn open(lib: &Library, id: RecordId) -> Result<Opened, ContentError> {
    let record = lib.content.lookup(id)?;
    if record.is_leaf() {
        Ok(Opened::Detail(DetailScreen::new(lib.clone(), id)?))
    } else {
        Ok(Opened::List(ListScreen::new(lib.clone(), id)?))
    }
}

/// Push the screen for `id` onto the stack.
pub(crate) fn push_record(lib: &Library, id: RecordId, nav: &mut NavRequest) -> Result<(), ContentError> {
    match open(lib, id)? {
        Opened::List(s) => nav.push(s),
        Opened::Detail(s) => nav.push(s),
    }
    Ok(())
}

/// Replace the top of the stack with the screen for `id`.
pub(crate) fn replace_record(
    lib: &Library,
    id: RecordId,
    nav: &mut NavRequest,
) -> Result<(), ContentError> {
    match open(lib, id)? {
        Opened::List(s) => nav.replace(s),
        Opened::Detail(s) => nav.replace(s),
    }
    Ok(())
}
