//! Rendering Adapter: the host side of content attachment.
//!
//! # Invariants
//! - Paging never touches the scene directly; it attaches and detaches
//!   [`SceneNode`]s through the `ContentHandle` interface.
//! - A node is registered in its [`SceneGraph`] exactly while it is attached.
//!
//! # Workaround
//! Provides a trait-based renderer interface with a debug text renderer in
//! place of a GPU backend. The trait is stable; swap in a real renderer
//! without changing consumers.

mod renderer;
mod scene;

pub use renderer::{DebugTextRenderer, RenderView, Renderer};
pub use scene::{NodeId, SceneGraph, SceneNode, SceneNodeInfo};

pub fn crate_info() -> &'static str {
    "verdure-render v0.1.0"
}
