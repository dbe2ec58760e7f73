//! Shared types for the verdure workspace.
//!
//! Cell addressing and bounds are used by both the paging core and the
//! vegetation loaders. [`ContentHandle`] is the seam between the paging core
//! and whatever host scene the content ends up in.

mod content;
mod types;

pub use content::{ContentBound, ContentHandle, FadeWindow};
pub use types::{Cell2D, RectBounds};
