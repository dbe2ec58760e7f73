use serde::{Deserialize, Serialize};

use crate::error::PagingError;

/// A distance band in which one slot of block content is shown.
///
/// Content is visible for planar distances in `[near_dist, far_dist)`. With a
/// transition, it keeps fading out until `far_trans_dist`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetailLevel {
    near_dist: f32,
    far_dist: f32,
    far_trans_dist: f32,
    fade_enabled: bool,
}

impl DetailLevel {
    /// Check a level appended after one ending at `near_dist`: it must end
    /// strictly farther out and fade over a non-negative range.
    pub fn check(near_dist: f32, far_dist: f32, transition: f32) -> Result<(), PagingError> {
        if !(far_dist > near_dist) || !far_dist.is_finite() {
            return Err(PagingError::InvalidDetailLevel {
                near: near_dist,
                far: far_dist,
            });
        }
        if !(transition >= 0.0) || !transition.is_finite() {
            return Err(PagingError::InvalidFadeRange(transition));
        }
        Ok(())
    }

    pub fn new(near_dist: f32, far_dist: f32, transition: f32) -> Self {
        Self {
            near_dist,
            far_dist,
            far_trans_dist: far_dist + transition,
            fade_enabled: transition > 0.0,
        }
    }

    pub fn near_dist(&self) -> f32 {
        self.near_dist
    }

    pub fn far_dist(&self) -> f32 {
        self.far_dist
    }

    /// Far distance plus the fade transition length.
    pub fn far_trans_dist(&self) -> f32 {
        self.far_trans_dist
    }

    pub fn transition(&self) -> f32 {
        self.far_trans_dist - self.far_dist
    }

    /// Whether this level fades out past its far edge.
    pub fn fades(&self) -> bool {
        self.fade_enabled
    }

    pub fn contains(&self, dist: f32) -> bool {
        dist >= self.near_dist && dist < self.far_dist
    }
}
