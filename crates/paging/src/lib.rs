//! Paging: grid-scrolling page streaming with a retention cache, background
//! loading and per-detail-level visibility.
//!
//! # Invariants
//! - After every tick the live grid is a `grid_size x grid_size` square of
//!   pages centered on the observer's cell.
//! - A page is in exactly one [`PageState`] at a time.
//! - Only the driver thread touches grids, pages and blocks. Load tasks build
//!   content in isolation and hand it over through their [`TaskHandle`].
//! - Detail levels are contiguous: each level starts where the previous ends.

mod block;
mod config;
mod detail;
mod error;
mod executor;
mod grid;
mod loader;
mod manager;
mod page;
mod stats;
mod visibility;

#[cfg(test)]
mod testutil;

pub use block::{Block, BlockCore};
pub use config::{DetailLevelConfig, MIN_PAGE_SIZE, PagingConfig};
pub use detail::DetailLevel;
pub use error::{LoadError, PagingError};
pub use executor::{TaskExecutor, TaskHandle};
pub use grid::{Grid2D, GridCell};
pub use loader::{LoadTask, PageLoader};
pub use manager::{PagingDriver, PagingManager};
pub use page::{MIN_BLOCK_SIZE, Page, PageCore, PageLayout, PageState};
pub use stats::PagingStats;
pub use visibility::{level_visibility, process_block};

pub use verdure_common::{Cell2D, ContentBound, ContentHandle, FadeWindow, RectBounds};

pub fn crate_info() -> &'static str {
    "verdure-paging v0.1.0"
}
