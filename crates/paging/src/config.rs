use serde::{Deserialize, Serialize};

use crate::detail::DetailLevel;
use crate::error::PagingError;

/// Smallest page edge accepted by [`PagingManager::set_page_size`](crate::PagingManager::set_page_size).
pub const MIN_PAGE_SIZE: u32 = 64;

/// Cache times above this are almost certainly a unit mistake.
pub const SUSPICIOUS_CACHE_TIME: f32 = 60.0;

/// Paging configuration: page geometry, grid radius, cache policy and detail levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Edge length of a page in world units.
    pub page_size: u32,
    /// Blocks per page edge.
    pub resolution: u32,
    /// Distance the grid must cover around the observer. Grows to the
    /// farthest detail level.
    pub radius: f32,
    /// Keep evicted pages around for cheap recycling.
    pub use_cache: bool,
    /// Seconds an evicted page survives in the cache (before bump scaling).
    pub cache_time: f32,
    /// Run the per-page update hook on loaded pages every tick.
    pub update_pages: bool,
    /// Detail levels, nearest first.
    pub detail_levels: Vec<DetailLevelConfig>,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: 512,
            resolution: 4,
            radius: 512.0,
            use_cache: true,
            cache_time: 6.0,
            update_pages: false,
            detail_levels: Vec::new(),
        }
    }
}

/// One detail level: its far distance and the fade range past it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetailLevelConfig {
    pub far_dist: f32,
    #[serde(default)]
    pub fade_range: f32,
}

impl PagingConfig {
    /// Check the geometry, the cache settings and that the detail levels
    /// are contiguous, strictly increasing bands.
    pub fn validate(&self) -> Result<(), PagingError> {
        if self.page_size == 0 {
            return Err(PagingError::InvalidConfig("page_size must be positive".into()));
        }
        if self.resolution == 0 {
            return Err(PagingError::InvalidConfig("resolution must be positive".into()));
        }
        if !(self.radius >= 0.0) || !self.radius.is_finite() {
            return Err(PagingError::InvalidConfig(format!(
                "radius must be a non-negative number, got {}",
                self.radius
            )));
        }
        if !(self.cache_time >= 0.0) {
            return Err(PagingError::InvalidConfig(format!(
                "cache_time must be a non-negative number, got {}",
                self.cache_time
            )));
        }
        let mut near = 0.0;
        for level in &self.detail_levels {
            DetailLevel::check(near, level.far_dist, level.fade_range)?;
            near = level.far_dist;
        }
        Ok(())
    }
}
