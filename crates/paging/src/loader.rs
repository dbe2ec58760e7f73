use verdure_common::Cell2D;

use crate::error::LoadError;
use crate::page::{Page, PageLayout};

/// Work that builds a page's content on the paging worker.
///
/// `Ok(Some(content))` means the page has content and becomes loaded,
/// `Ok(None)` means there is nothing here and the page goes idle. An error
/// also leaves the page idle and is logged.
pub type LoadTask<C> = Box<dyn FnOnce() -> Result<Option<C>, LoadError> + Send + 'static>;

/// Supplies pages to a [`PagingManager`](crate::PagingManager) and knows how
/// to fill them.
///
/// The loader itself stays on the driver thread. A [`LoadTask`] must capture
/// everything it needs by value (typically `Arc`s of the generators) and must
/// not reach back into pages or grids.
pub trait PageLoader {
    type Page: Page;

    /// Create an empty page for `cell`.
    fn create_page(&self, cell: Cell2D, layout: PageLayout) -> Self::Page;

    /// Build the load task for `page`, or `None` if there is nothing to load.
    fn load_page(&self, page: &Self::Page) -> Option<LoadTask<<Self::Page as Page>::Content>>;

    /// Called once per manager tick before any paging work.
    fn update(&mut self, _dt: f32) {}

    fn name(&self) -> &str;
}
