use std::time::Duration;

/// Per-tick paging statistics for instrumentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagingStats {
    /// Pages built by the loader this tick (grid setup, scroll, reload).
    pub pages_created: usize,
    /// Pages pulled back out of the cache instead of being created.
    pub pages_recycled: usize,
    /// Pages evicted from the live grid into the cache.
    pub pages_cached: usize,
    /// Cached pages whose retention timer ran out.
    pub pages_expired: usize,
    /// Pages unloaded and discarded for any other reason.
    pub pages_unloaded: usize,
    pub loads_dispatched: usize,
    pub loads_completed: usize,
    /// Loads that finished without content, or had nothing to load.
    pub loads_idle: usize,
    pub loads_failed: usize,
    /// Block/detail-level pairs visible after this tick's processing.
    pub visible_blocks: usize,
    pub live_pages: usize,
    pub cached_pages: usize,
    pub tick_time: Duration,
}

impl PagingStats {
    /// Pages that entered the live grid this tick.
    pub fn pages_swapped_in(&self) -> usize {
        self.pages_created + self.pages_recycled
    }
}
