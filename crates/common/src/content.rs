use glam::Vec3;
use serde::{Deserialize, Serialize};

/// World-space bounding volume of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ContentBound {
    Sphere { center: Vec3, radius: f32 },
    Box { center: Vec3, half_extents: Vec3 },
}

impl ContentBound {
    pub fn center(&self) -> Vec3 {
        match self {
            Self::Sphere { center, .. } | Self::Box { center, .. } => *center,
        }
    }
}

/// Distance window over which a detail level's content is faded.
///
/// A fade-out window is ascending (`start < end`): content is opaque at
/// `start` and gone at `end`. A fade-in window is descending (`start > end`):
/// content is gone at `end` and opaque at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FadeWindow {
    pub start: f32,
    pub end: f32,
    pub enabled: bool,
}

impl FadeWindow {
    pub fn new(start: f32, end: f32) -> Self {
        Self {
            start,
            end,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn range(&self) -> f32 {
        self.end - self.start
    }

    /// Opacity at planar distance `dist`, in `[0, 1]`.
    pub fn alpha(&self, dist: f32) -> f32 {
        let range = self.range();
        if !self.enabled || range == 0.0 {
            return 1.0;
        }
        ((self.end - dist) / range).clamp(0.0, 1.0)
    }
}

/// Renderable content owned by a block for one detail level.
///
/// Handles are built off the driver thread by load tasks, then handed to the
/// driver which attaches and detaches them as visibility changes. The host
/// rendering layer implements this; the paging core never looks inside.
pub trait ContentHandle: Send + 'static {
    /// True when the handle carries no geometry at all.
    fn is_empty(&self) -> bool;

    /// World bound of the content, if it has been computed.
    fn bound(&self) -> Option<ContentBound>;

    /// Move the handle to the block it belongs to.
    fn place(&mut self, _center: Vec3) {}

    /// Make the content part of the active scene.
    fn attach(&mut self);

    /// Remove the content from the active scene.
    fn detach(&mut self);

    fn set_fade_window(&mut self, window: FadeWindow);
}
