use std::time::Instant;

use glam::Vec3;
use verdure_common::Cell2D;

use crate::block::Block;
use crate::config::{MIN_PAGE_SIZE, PagingConfig, SUSPICIOUS_CACHE_TIME};
use crate::detail::DetailLevel;
use crate::error::PagingError;
use crate::executor::TaskExecutor;
use crate::grid::Grid2D;
use crate::loader::PageLoader;
use crate::page::{Page, PageLayout, PageState};
use crate::stats::PagingStats;
use crate::visibility::{hide_page, process_page};

const WORKER_NAME: &str = "paging-worker";

/// Object-safe view of a [`PagingManager`], so one owner can drive managers
/// with different loaders side by side.
pub trait PagingDriver {
    fn name(&self) -> &str;
    fn update(&mut self, dt: f32, observer: Vec3) -> Result<(), PagingError>;
    fn set_visible(&mut self, visible: bool);
    fn is_visible(&self) -> bool;
    fn stats(&self) -> &PagingStats;
    /// Pages currently in the live grid.
    fn page_count(&self) -> usize;
}

/// Keeps a square grid of pages centered on the observer, loads them in the
/// background, parks evicted pages in a retention cache and decides per
/// block and detail level what is visible.
pub struct PagingManager<L: PageLoader> {
    loader: L,
    page_size: u32,
    resolution: u32,
    layout: PageLayout,
    radius: f32,
    use_cache: bool,
    cache_time: f32,
    update_pages: bool,
    grid_size: i32,
    half_grid_size: i32,
    grid: Grid2D<L::Page>,
    cache: Grid2D<L::Page>,
    levels: Vec<DetailLevel>,
    fade_enabled: bool,
    visible: bool,
    initialized: bool,
    center: Cell2D,
    observer: Vec3,
    executor: TaskExecutor,
    /// Counters for the tick in progress; moved into `stats` when it ends.
    tally: PagingStats,
    stats: PagingStats,
}

impl<L: PageLoader> PagingManager<L> {
    /// Build a manager and start its worker thread.
    ///
    /// The grid itself is built on the first [`update`](Self::update), when
    /// the observer position is known, or by [`init_grid`](Self::init_grid).
    pub fn new(config: PagingConfig, loader: L) -> Result<Self, PagingError> {
        config.validate()?;
        if config.cache_time > SUSPICIOUS_CACHE_TIME {
            tracing::warn!(
                cache_time = config.cache_time,
                "cache time is very high; it is measured in seconds"
            );
        }
        let page_size = clamp_page_size(config.page_size);
        let mut manager = Self {
            loader,
            page_size,
            resolution: config.resolution,
            layout: PageLayout::new(page_size as f32, config.resolution),
            radius: config.radius,
            use_cache: config.use_cache,
            cache_time: config.cache_time,
            update_pages: config.update_pages,
            grid_size: 0,
            half_grid_size: 0,
            grid: Grid2D::new(),
            cache: Grid2D::new(),
            levels: Vec::with_capacity(config.detail_levels.len()),
            fade_enabled: false,
            visible: true,
            initialized: false,
            center: Cell2D::default(),
            observer: Vec3::ZERO,
            executor: TaskExecutor::new(WORKER_NAME)?,
            tally: PagingStats::default(),
            stats: PagingStats::default(),
        };
        for level in &config.detail_levels {
            manager.add_detail_level(level.far_dist, level.fade_range)?;
        }
        manager.resize_grid();
        let side = manager.grid_size as usize;
        manager.grid = Grid2D::with_capacity(side, side);
        manager.cache = Grid2D::with_capacity(side, side);
        Ok(manager)
    }

    /// Advance paging by one tick.
    ///
    /// Scrolls the grid to the observer, dispatches and harvests loads,
    /// processes visibility of loaded pages and ages the cache, in that
    /// order. Load failures are logged, never returned; an error means the
    /// live grid is corrupt.
    pub fn update(&mut self, dt: f32, observer: Vec3) -> Result<(), PagingError> {
        let _span = tracing::info_span!("paging_update", loader = self.loader.name()).entered();
        let tick_start = Instant::now();

        self.loader.update(dt);
        self.observer = observer;
        if self.initialized {
            self.scroll_to(self.grid_cell(observer))?;
        } else {
            self.init_grid(observer);
        }

        let expected = (self.grid_size * self.grid_size) as usize;
        if self.grid.len() != expected {
            return Err(PagingError::GridCoverage {
                expected,
                actual: self.grid.len(),
            });
        }

        self.process_pages(dt, observer);
        if self.use_cache {
            self.age_cache(dt);
        }

        let mut stats = std::mem::take(&mut self.tally);
        stats.live_pages = self.grid.len();
        stats.cached_pages = self.cache.len();
        stats.tick_time = tick_start.elapsed();
        self.stats = stats;
        Ok(())
    }

    /// Throw away every page and build a fresh grid centered on `observer`.
    pub fn init_grid(&mut self, observer: Vec3) {
        self.discard_all();
        self.observer = observer;
        self.center = self.grid_cell(observer);

        let half = self.half_grid_size;
        for z in -half..=half {
            for x in -half..=half {
                let cell = self.center.offset(x, z);
                let page = self.loader.create_page(cell, self.layout);
                if let Some(mut stale) = self.grid.add(page) {
                    stale.unload();
                }
                self.tally.pages_created += 1;
            }
        }
        self.initialized = true;
        tracing::info!(
            center = %self.center,
            grid_size = self.grid_size,
            pages = self.grid.len(),
            "paging grid built"
        );
    }

    fn process_pages(&mut self, dt: f32, observer: Vec3) {
        let level_count = self.levels.len();
        for page in self.grid.iter_mut() {
            let cell = page.core().cell();
            match page.core().state() {
                PageState::Unloaded => match self.loader.load_page(page) {
                    Some(task) => {
                        let handle = self.executor.submit(task);
                        page.core_mut().begin_load(handle);
                        self.tally.loads_dispatched += 1;
                        tracing::debug!(cell = %cell, "page load dispatched");
                    }
                    None => {
                        page.core_mut().set_state(PageState::Idle);
                        self.tally.loads_idle += 1;
                    }
                },
                PageState::Pending => {
                    let Some(result) = page.core_mut().poll_task() else {
                        continue;
                    };
                    match result {
                        Ok(Some(content)) => {
                            if page.attach_content(content) && levels_match(&*page, level_count) {
                                page.core_mut().set_state(PageState::Loaded);
                                self.tally.loads_completed += 1;
                            } else {
                                tracing::warn!(
                                    cell = %cell,
                                    detail_levels = level_count,
                                    "loaded content does not fit the page; leaving it idle"
                                );
                                page.unload();
                                page.core_mut().set_state(PageState::Idle);
                                self.tally.loads_idle += 1;
                            }
                        }
                        Ok(None) => {
                            page.core_mut().set_state(PageState::Idle);
                            self.tally.loads_idle += 1;
                        }
                        Err(e) => {
                            tracing::error!(cell = %cell, error = %e, "page load failed");
                            page.core_mut().set_state(PageState::Idle);
                            self.tally.loads_failed += 1;
                        }
                    }
                }
                PageState::Loaded => {
                    if self.update_pages {
                        page.update(dt);
                    }
                    if self.visible {
                        self.tally.visible_blocks +=
                            process_page(page, observer, &self.levels, self.fade_enabled);
                    }
                }
                PageState::Idle => {}
            }
        }
    }

    /// Age cached pages and unload the ones whose time is up.
    fn age_cache(&mut self, dt: f32) {
        let cache_time = self.cache_time;
        let expired: Vec<Cell2D> = self
            .cache
            .iter_mut()
            .filter_map(|page| {
                let core = page.core_mut();
                core.increase_cache_timer(dt);
                (core.cache_timer() >= cache_time).then(|| core.cell())
            })
            .collect();

        for cell in expired {
            if let Some(mut page) = self.cache.remove(cell) {
                page.unload();
                self.tally.pages_expired += 1;
                tracing::debug!(cell = %cell, "cached page expired");
            }
        }
    }

    fn scroll_to(&mut self, target: Cell2D) -> Result<(), PagingError> {
        let dx = target.x - self.center.x;
        let dz = target.z - self.center.z;
        if dx == 0 && dz == 0 {
            return Ok(());
        }
        if dx.abs() > 1 || dz.abs() > 1 {
            tracing::warn!(
                from = %self.center,
                to = %target,
                "observer jumped more than one page; rebuilding grid"
            );
            self.init_grid(self.observer);
            return Ok(());
        }

        let half = self.half_grid_size;
        if dx != 0 {
            for z in self.center.z - half..=self.center.z + half {
                let leaving = Cell2D::new(self.center.x - half * dx, z);
                let entering = Cell2D::new(self.center.x + (half + 1) * dx, z);
                self.swap_in(leaving, entering)?;
            }
            self.center.x += dx;
        }
        if dz != 0 {
            for x in self.center.x - half..=self.center.x + half {
                let leaving = Cell2D::new(x, self.center.z - half * dz);
                let entering = Cell2D::new(x, self.center.z + (half + 1) * dz);
                self.swap_in(leaving, entering)?;
            }
            self.center.z += dz;
        }
        Ok(())
    }

    /// Replace the live page at `leaving` with a page for `entering`,
    /// recycled from the cache when possible.
    fn swap_in(&mut self, leaving: Cell2D, entering: Cell2D) -> Result<(), PagingError> {
        let recycled = if self.use_cache {
            self.cache.remove(entering)
        } else {
            None
        };
        let page = match recycled {
            Some(mut page) => {
                page.core_mut().reset_cache_timer();
                self.tally.pages_recycled += 1;
                tracing::info!(cell = %entering, "page recycled from cache");
                page
            }
            None => {
                self.tally.pages_created += 1;
                tracing::debug!(cell = %entering, "page created");
                self.loader.create_page(entering, self.layout)
            }
        };

        let displaced = self
            .grid
            .set_cell(leaving, page)
            .ok_or(PagingError::EmptyGridSlot { cell: leaving })?;
        self.retire(displaced);
        Ok(())
    }

    /// Move a page out of the live grid: into the cache, or gone.
    fn retire(&mut self, mut page: L::Page) {
        if !self.use_cache {
            page.unload();
            self.tally.pages_unloaded += 1;
            return;
        }
        hide_page(&mut page);
        page.core_mut().reset_cache_timer();
        if let Some(mut stale) = self.cache.add(page) {
            stale.unload();
            self.tally.pages_unloaded += 1;
        }
        self.tally.pages_cached += 1;
    }

    fn discard_all(&mut self) {
        for mut page in self.grid.drain().chain(self.cache.drain()) {
            page.unload();
            self.tally.pages_unloaded += 1;
        }
    }

    fn resize_grid(&mut self) {
        self.grid_size = 2 * ((self.radius / self.page_size as f32).floor() as i32 + 1) + 1;
        self.half_grid_size = (self.grid_size - 1) / 2;
    }

    /// The page cell containing `pos`. Page (0, 0) is centered on the origin.
    pub fn grid_cell(&self, pos: Vec3) -> Cell2D {
        Cell2D::containing(pos.x, pos.z, self.page_size as f32)
    }

    /// Append a detail level starting where the farthest existing one ends.
    ///
    /// A `fade_range` above zero turns on fading. A far distance beyond the
    /// current radius grows the radius and rebuilds the grid.
    pub fn add_detail_level(&mut self, far_dist: f32, fade_range: f32) -> Result<(), PagingError> {
        let near_dist = self.farthest_level();
        DetailLevel::check(near_dist, far_dist, fade_range)?;

        self.levels.push(DetailLevel::new(near_dist, far_dist, fade_range));
        if fade_range > 0.0 {
            self.fade_enabled = true;
        }
        if far_dist > self.radius {
            self.radius = far_dist;
            self.reload_pages();
        }
        Ok(())
    }

    /// Drop every detail level. Fading and visibility switch off until
    /// re-enabled.
    pub fn remove_detail_levels(&mut self) {
        self.set_visible(false);
        self.levels.clear();
        self.fade_enabled = false;
    }

    pub fn detail_levels(&self) -> &[DetailLevel] {
        &self.levels
    }

    pub fn is_fade_enabled(&self) -> bool {
        self.fade_enabled
    }

    fn farthest_level(&self) -> f32 {
        self.levels.last().map_or(0.0, DetailLevel::far_dist)
    }

    /// Show or hide all content. Hiding detaches every visible block level
    /// right away.
    pub fn set_visible(&mut self, visible: bool) {
        if !visible {
            for page in self.grid.iter_mut() {
                hide_page(page);
            }
        }
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Turning the cache off unloads everything in it.
    pub fn set_use_cache(&mut self, use_cache: bool) {
        if !use_cache {
            for mut page in self.cache.drain() {
                page.unload();
                self.tally.pages_unloaded += 1;
            }
        }
        self.use_cache = use_cache;
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    pub fn set_cache_time(&mut self, cache_time: f32) -> Result<(), PagingError> {
        if !(cache_time >= 0.0) {
            return Err(PagingError::InvalidConfig(format!(
                "cache_time must be a non-negative number, got {cache_time}"
            )));
        }
        if cache_time > SUSPICIOUS_CACHE_TIME {
            tracing::warn!(cache_time, "cache time is very high; it is measured in seconds");
        }
        self.cache_time = cache_time;
        Ok(())
    }

    pub fn cache_time(&self) -> f32 {
        self.cache_time
    }

    pub fn set_update_pages(&mut self, update_pages: bool) {
        self.update_pages = update_pages;
    }

    /// Grid coverage radius. Never smaller than the farthest detail level.
    pub fn set_radius(&mut self, radius: f32) -> Result<(), PagingError> {
        if !(radius >= 0.0) || !radius.is_finite() {
            return Err(PagingError::InvalidConfig(format!(
                "radius must be a non-negative number, got {radius}"
            )));
        }
        self.radius = radius.max(self.farthest_level());
        self.reload_pages();
        Ok(())
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Change the page edge length (at least 64) and rebuild everything.
    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = clamp_page_size(page_size);
        self.layout = PageLayout::new(self.page_size as f32, self.resolution);
        self.reload_pages();
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn set_resolution(&mut self, resolution: u32) -> Result<(), PagingError> {
        if resolution == 0 {
            return Err(PagingError::InvalidConfig("resolution must be positive".into()));
        }
        self.resolution = resolution;
        self.layout = PageLayout::new(self.page_size as f32, resolution);
        self.reload_pages();
        Ok(())
    }

    /// Swap the loader and rebuild every page with it. Returns the old one.
    pub fn set_page_loader(&mut self, loader: L) -> L {
        let old = std::mem::replace(&mut self.loader, loader);
        self.reload_pages();
        old
    }

    /// Unload every live and cached page, recompute the grid size and, if
    /// the grid was already built, rebuild it around the last observer
    /// position.
    pub fn reload_pages(&mut self) {
        self.resize_grid();
        if self.initialized {
            self.init_grid(self.observer);
        } else {
            self.discard_all();
        }
    }

    /// Unload the page at `cell`, dropping any cached copy. A live page is
    /// replaced with a fresh one that loads on the next tick.
    pub fn reload_page(&mut self, cell: Cell2D) {
        if let Some(mut cached) = self.cache.remove(cell) {
            cached.unload();
            self.tally.pages_unloaded += 1;
        }
        if let Some(mut live) = self.grid.remove(cell) {
            live.unload();
            self.tally.pages_unloaded += 1;
            let page = self.loader.create_page(cell, self.layout);
            self.grid.add(page);
            self.tally.pages_created += 1;
            tracing::debug!(cell = %cell, "page reloaded");
        }
    }

    pub fn reload_page_at(&mut self, pos: Vec3) {
        self.reload_page(self.grid_cell(pos));
    }

    /// Reload every page whose cell lies in the world rectangle spanned by
    /// `left..right` along x and `top..bottom` along z.
    pub fn reload_pages_in(&mut self, left: f32, right: f32, top: f32, bottom: f32) {
        let a = self.grid_cell(Vec3::new(left, 0.0, top));
        let b = self.grid_cell(Vec3::new(right, 0.0, bottom));
        for z in a.z.min(b.z)..=a.z.max(b.z) {
            for x in a.x.min(b.x)..=a.x.max(b.x) {
                self.reload_page(Cell2D::new(x, z));
            }
        }
    }

    /// Reload every page whose square intersects the circle around `center`.
    pub fn reload_pages_around(&mut self, center: Vec3, radius: f32) {
        let reach = Vec3::new(radius, 0.0, radius);
        let lo = self.grid_cell(center - reach);
        let hi = self.grid_cell(center + reach);
        let half = self.page_size as f32 * 0.5;
        for z in lo.z..=hi.z {
            for x in lo.x..=hi.x {
                let cell = Cell2D::new(x, z);
                let page_center = self.layout.page_center(cell);
                let dx = ((center.x - page_center.x).abs() - half).max(0.0);
                let dz = ((center.z - page_center.z).abs() - half).max(0.0);
                if dx * dx + dz * dz <= radius * radius {
                    self.reload_page(cell);
                }
            }
        }
    }

    pub fn current_cell(&self) -> Cell2D {
        self.center
    }

    pub fn grid(&self) -> &Grid2D<L::Page> {
        &self.grid
    }

    pub fn cache(&self) -> &Grid2D<L::Page> {
        &self.cache
    }

    pub fn page(&self, cell: Cell2D) -> Option<&L::Page> {
        self.grid.get_cell(cell)
    }

    /// Pages per grid edge.
    pub fn grid_size(&self) -> usize {
        self.grid_size as usize
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Counters from the last completed tick.
    pub fn stats(&self) -> &PagingStats {
        &self.stats
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }
}

impl<L: PageLoader> PagingDriver for PagingManager<L> {
    fn name(&self) -> &str {
        self.loader.name()
    }

    fn update(&mut self, dt: f32, observer: Vec3) -> Result<(), PagingError> {
        PagingManager::update(self, dt, observer)
    }

    fn set_visible(&mut self, visible: bool) {
        PagingManager::set_visible(self, visible);
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn stats(&self) -> &PagingStats {
        &self.stats
    }

    fn page_count(&self) -> usize {
        self.grid.len()
    }
}

impl<L: PageLoader> Drop for PagingManager<L> {
    fn drop(&mut self) {
        self.discard_all();
    }
}

impl<L: PageLoader> std::fmt::Debug for PagingManager<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagingManager")
            .field("loader", &self.loader.name())
            .field("layout", &self.layout)
            .field("grid_size", &self.grid_size)
            .field("center", &self.center)
            .field("live", &self.grid.len())
            .field("cached", &self.cache.len())
            .field("levels", &self.levels)
            .finish()
    }
}

/// Every block that received content has one handle per detail level.
fn levels_match<P: Page>(page: &P, levels: usize) -> bool {
    page.core()
        .blocks()
        .iter()
        .all(|block| !block.core().has_nodes() || block.core().node_count() == levels)
}

fn clamp_page_size(page_size: u32) -> u32 {
    if page_size < MIN_PAGE_SIZE {
        tracing::warn!(page_size, min = MIN_PAGE_SIZE, "page size too small; clamping");
        MIN_PAGE_SIZE
    } else {
        page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetailLevelConfig;
    use crate::grid::GridCell;
    use crate::testutil::{Outcome, TestLoader, drive_until, settle};

    const ORIGIN: Vec3 = Vec3::ZERO;

    fn config(levels: &[(f32, f32)]) -> PagingConfig {
        PagingConfig {
            page_size: 100,
            resolution: 2,
            radius: 0.0,
            detail_levels: levels
                .iter()
                .map(|&(far_dist, fade_range)| DetailLevelConfig {
                    far_dist,
                    fade_range,
                })
                .collect(),
            ..PagingConfig::default()
        }
    }

    fn manager(loader: TestLoader) -> PagingManager<TestLoader> {
        PagingManager::new(config(&[(300.0, 0.0)]), loader).unwrap()
    }

    fn serial(m: &PagingManager<TestLoader>, x: i32, z: i32) -> Option<usize> {
        m.page(Cell2D::new(x, z)).map(|p| p.serial)
    }

    fn assert_square(m: &PagingManager<TestLoader>) {
        let half = (m.grid_size() as i32 - 1) / 2;
        let center = m.current_cell();
        assert_eq!(m.grid().len(), m.grid_size() * m.grid_size());
        for z in -half..=half {
            for x in -half..=half {
                let cell = center.offset(x, z);
                assert_eq!(m.page(cell).map(GridCell::cell), Some(cell));
            }
        }
    }

    #[test]
    fn grid_covers_radius_with_origin_centered_page() {
        let mut m = manager(TestLoader::new(1));
        assert_eq!(m.grid_size(), 9);

        m.update(0.0, ORIGIN).unwrap();
        assert_eq!(m.grid().len(), 81);
        assert_eq!(m.current_cell(), Cell2D::new(0, 0));
        assert_eq!(m.page(Cell2D::new(0, 0)).map(|p| p.core().center()), Some(ORIGIN));
        assert_square(&m);
        assert_eq!(m.stats().pages_created, 81);
        assert_eq!(m.stats().loads_dispatched, 81);
    }

    #[test]
    fn grid_cell_rounds_half_away_from_zero() {
        let m = manager(TestLoader::new(1));
        let cell = |x: f32, z: f32| m.grid_cell(Vec3::new(x, 7.0, z));
        assert_eq!(cell(49.0, -49.0), Cell2D::new(0, 0));
        assert_eq!(cell(50.0, -50.0), Cell2D::new(1, -1));
        assert_eq!(cell(149.0, -151.0), Cell2D::new(1, -2));
    }

    #[test]
    fn far_observer_lands_on_edge_cell() {
        let mut m = manager(TestLoader::new(1));
        m.update(0.0, ORIGIN).unwrap();
        m.update(0.0, Vec3::new(1.0e12, 0.0, 0.0)).unwrap();
        assert_eq!(m.current_cell(), Cell2D::new(Cell2D::MAX_COORD, 0));
        assert_square(&m);

        m.update(0.0, Vec3::new(1.0e12, 0.0, -1.0e12)).unwrap();
        assert_eq!(m.current_cell(), Cell2D::new(Cell2D::MAX_COORD, Cell2D::MIN_COORD));
        assert_square(&m);
    }

    #[test]
    fn new_rejects_out_of_order_config_levels() {
        assert!(matches!(
            PagingManager::new(config(&[(300.0, 0.0), (100.0, 0.0)]), TestLoader::new(2)),
            Err(PagingError::InvalidDetailLevel { .. })
        ));
    }

    #[test]
    fn detail_levels_are_contiguous() {
        let m = PagingManager::new(config(&[(100.0, 10.0), (250.0, 0.0), (400.0, 0.0)]), TestLoader::new(3))
            .unwrap();
        let levels = m.detail_levels();
        assert_eq!(levels[0].near_dist(), 0.0);
        for pair in levels.windows(2) {
            assert_eq!(pair[1].near_dist(), pair[0].far_dist());
        }
        assert!(m.is_fade_enabled());
        assert_eq!(m.radius(), 400.0);
    }

    #[test]
    fn rejects_out_of_order_detail_level() {
        let mut m = manager(TestLoader::new(1));
        assert!(matches!(
            m.add_detail_level(200.0, 0.0),
            Err(PagingError::InvalidDetailLevel { .. })
        ));
        assert!(matches!(
            m.add_detail_level(300.0, 0.0),
            Err(PagingError::InvalidDetailLevel { .. })
        ));
        assert!(matches!(
            m.add_detail_level(400.0, -1.0),
            Err(PagingError::InvalidFadeRange(_))
        ));
        assert_eq!(m.detail_levels().len(), 1);
        assert!(!m.is_fade_enabled());
    }

    #[test]
    fn far_detail_level_grows_grid() {
        let mut m = manager(TestLoader::new(1));
        m.update(0.0, ORIGIN).unwrap();
        m.add_detail_level(520.0, 0.0).unwrap();
        assert_eq!(m.radius(), 520.0);
        assert_eq!(m.grid_size(), 13);
        assert_eq!(m.grid().len(), 169);
    }

    #[test]
    fn pages_load_and_become_visible() {
        let loader = TestLoader::new(1);
        let recorder = loader.recorder.clone();
        let mut m = manager(loader);
        assert!(settle(&mut m, ORIGIN));
        assert!(m.grid().iter().all(|p| p.core().is_loaded()));

        m.update(0.0, ORIGIN).unwrap();
        let visible = m.stats().visible_blocks;
        assert!(visible > 0);
        assert_eq!(recorder.attached(), visible);
    }

    #[test]
    fn idle_pages_are_never_redispatched() {
        let mut loader = TestLoader::new(1);
        loader.outcomes.insert(Cell2D::new(0, 0), Outcome::Empty);
        let mut m = manager(loader);
        assert!(settle(&mut m, ORIGIN));
        assert!(m.page(Cell2D::new(0, 0)).unwrap().core().is_idle());

        let dispatched = m.loader().dispatched.get();
        for _ in 0..5 {
            m.update(0.1, ORIGIN).unwrap();
        }
        assert_eq!(m.loader().dispatched.get(), dispatched);
        assert_eq!(m.stats().loads_dispatched, 0);
    }

    #[test]
    fn failed_loads_leave_pages_idle() {
        let mut loader = TestLoader::new(1);
        loader.outcomes.insert(Cell2D::new(0, 0), Outcome::Fail);
        loader.outcomes.insert(Cell2D::new(1, 0), Outcome::Panic);
        loader.outcomes.insert(Cell2D::new(2, 0), Outcome::NoTask);
        loader.outcomes.insert(Cell2D::new(-1, 0), Outcome::Mismatched);
        let recorder = loader.recorder.clone();
        let mut m = manager(loader);

        m.update(0.0, ORIGIN).unwrap();
        assert!(m.page(Cell2D::new(2, 0)).unwrap().core().is_idle());
        assert_eq!(m.loader().dispatched.get(), 80);

        assert!(settle(&mut m, ORIGIN));
        for x in -1..=2 {
            let page = m.page(Cell2D::new(x, 0)).unwrap();
            assert!(page.core().is_idle(), "page {x} not idle");
        }
        let mismatched = m.page(Cell2D::new(-1, 0)).unwrap();
        assert!(mismatched.core().blocks().iter().all(|b| !b.core().has_nodes()));

        m.update(0.0, ORIGIN).unwrap();
        let loaded = m.grid().iter().filter(|p| p.core().is_loaded()).count();
        assert_eq!(loaded, 77);
        assert_eq!(recorder.attached(), m.stats().visible_blocks);
    }

    #[test]
    fn one_page_step_replaces_one_column() {
        let mut m = manager(TestLoader::new(1));
        assert!(settle(&mut m, ORIGIN));
        let kept = serial(&m, 0, 0);

        m.update(0.0, Vec3::new(100.0, 0.0, 0.0)).unwrap();
        assert_eq!(m.current_cell(), Cell2D::new(1, 0));
        assert_eq!(m.stats().pages_swapped_in(), 9);
        assert_eq!(m.stats().pages_cached, 9);
        assert_eq!(m.cache().len(), 9);
        assert_eq!(serial(&m, 0, 0), kept);
        assert!(m.page(Cell2D::new(-4, 0)).is_none());
        assert!(m.page(Cell2D::new(5, 0)).is_some());
        assert_square(&m);
    }

    #[test]
    fn diagonal_step_keeps_square() {
        let mut m = manager(TestLoader::new(1));
        m.update(0.0, ORIGIN).unwrap();
        m.update(0.0, Vec3::new(100.0, 0.0, -100.0)).unwrap();
        assert_eq!(m.current_cell(), Cell2D::new(1, -1));
        assert_eq!(m.stats().pages_swapped_in(), 18);
        assert!(m.page(Cell2D::new(5, -5)).is_some());
        assert_square(&m);
    }

    #[test]
    fn multi_page_jump_rebuilds_grid() {
        let mut m = manager(TestLoader::new(1));
        m.update(0.0, ORIGIN).unwrap();
        m.update(0.0, Vec3::new(500.0, 0.0, 0.0)).unwrap();
        assert_eq!(m.current_cell(), Cell2D::new(5, 0));
        assert_eq!(m.stats().pages_created, 81);
        assert!(m.cache().is_empty());
        assert_square(&m);
    }

    #[test]
    fn recycled_page_keeps_content() {
        let mut m = manager(TestLoader::new(1));
        assert!(settle(&mut m, ORIGIN));
        let before = serial(&m, -4, 0);

        m.update(0.0, Vec3::new(100.0, 0.0, 0.0)).unwrap();
        m.update(0.0, ORIGIN).unwrap();
        assert_eq!(m.stats().pages_recycled, 9);

        let page = m.page(Cell2D::new(-4, 0)).unwrap();
        assert_eq!(Some(page.serial), before);
        assert!(page.core().is_loaded());
        assert!(page.core().blocks().iter().all(|b| b.core().has_nodes()));
        assert_eq!(page.core().bumps(), 2);
    }

    #[test]
    fn cached_pages_expire_once() {
        let loader = TestLoader::new(1);
        let recorder = loader.recorder.clone();
        let mut m = manager(loader);
        assert!(settle(&mut m, ORIGIN));
        let east = Vec3::new(100.0, 0.0, 0.0);
        assert!(settle(&mut m, east));

        m.update(4.0, east).unwrap();
        assert_eq!(m.stats().pages_expired, 0);
        assert_eq!(m.cache().len(), 9);

        m.update(4.0, east).unwrap();
        assert_eq!(m.stats().pages_expired, 9);
        assert!(m.cache().is_empty());

        m.update(4.0, east).unwrap();
        assert_eq!(m.stats().pages_expired, 0);
        assert_eq!(recorder.attached(), m.stats().visible_blocks);
    }

    #[test]
    fn recycled_pages_age_slower() {
        let mut m = manager(TestLoader::new(1));
        let east = Vec3::new(100.0, 0.0, 0.0);
        m.update(0.0, ORIGIN).unwrap();
        m.update(0.0, east).unwrap();
        m.update(0.0, ORIGIN).unwrap();
        m.update(0.0, east).unwrap();

        m.update(3.0, east).unwrap();
        let page = m.cache().get_cell(Cell2D::new(-4, 0)).unwrap();
        assert_eq!(page.core().bumps(), 3);
        assert!((page.core().cache_timer() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn without_cache_evicted_pages_are_unloaded() {
        let mut m = manager(TestLoader::new(1));
        m.set_use_cache(false);
        m.update(0.0, ORIGIN).unwrap();
        m.update(0.0, Vec3::new(100.0, 0.0, 0.0)).unwrap();
        assert_eq!(m.stats().pages_unloaded, 9);
        assert!(m.cache().is_empty());
        assert_square(&m);
    }

    #[test]
    fn hiding_detaches_everything() {
        let loader = TestLoader::new(1);
        let recorder = loader.recorder.clone();
        let mut m = manager(loader);
        assert!(settle(&mut m, ORIGIN));
        m.update(0.0, ORIGIN).unwrap();
        assert!(recorder.attached() > 0);

        m.set_visible(false);
        assert_eq!(recorder.attached(), 0);
        m.update(0.0, ORIGIN).unwrap();
        assert_eq!(m.stats().visible_blocks, 0);

        m.set_visible(true);
        m.update(0.0, ORIGIN).unwrap();
        assert_eq!(recorder.attached(), m.stats().visible_blocks);
    }

    #[test]
    fn removing_detail_levels_hides_content() {
        let loader = TestLoader::new(1);
        let recorder = loader.recorder.clone();
        let mut m = PagingManager::new(config(&[(300.0, 20.0)]), loader).unwrap();
        assert!(settle(&mut m, ORIGIN));
        m.update(0.0, ORIGIN).unwrap();

        m.remove_detail_levels();
        assert!(m.detail_levels().is_empty());
        assert!(!m.is_fade_enabled());
        assert!(!m.is_visible());
        assert_eq!(recorder.attached(), 0);
    }

    #[test]
    fn reloading_pending_page_discards_its_result() {
        let (loader, gate) = TestLoader::new(1).gated();
        let mut m = manager(loader);
        m.update(0.0, ORIGIN).unwrap();
        assert!(m.grid().iter().all(|p| p.core().is_pending()));

        m.reload_page(Cell2D::new(0, 0));
        let page = m.page(Cell2D::new(0, 0)).unwrap();
        assert_eq!(page.core().state(), PageState::Unloaded);
        assert_eq!(page.serial, 82);

        gate.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(settle(&mut m, ORIGIN));
        let page = m.page(Cell2D::new(0, 0)).unwrap();
        assert!(page.core().is_loaded());
        assert_eq!(page.serial, 82);
    }

    #[test]
    fn windowed_and_circular_reloads() {
        let mut m = manager(TestLoader::new(1));
        m.update(0.0, ORIGIN).unwrap();

        m.reload_pages_around(Vec3::new(10.0, 0.0, 10.0), 20.0);
        assert_eq!(m.loader().created.get(), 82);
        assert_eq!(serial(&m, 0, 0), Some(82));

        m.reload_pages_in(140.0, -140.0, -40.0, 40.0);
        assert_eq!(m.loader().created.get(), 85);
        assert!(serial(&m, 1, 0) > Some(82));
        assert!(serial(&m, -1, 0) > Some(82));

        m.reload_page_at(Vec3::new(-1000.0, 0.0, 0.0));
        assert_eq!(m.loader().created.get(), 85);
    }

    #[test]
    fn page_size_is_clamped_and_rebuilds() {
        let mut m = manager(TestLoader::new(1));
        m.update(0.0, ORIGIN).unwrap();
        m.set_page_size(10);
        assert_eq!(m.page_size(), 64);
        assert_eq!(m.layout().resolution(), 2);
        assert_eq!(m.grid_size(), 2 * (4 + 1) + 1);
        assert_eq!(m.grid().len(), 121);
        assert!(m.set_resolution(0).is_err());
        assert!(m.set_radius(-1.0).is_err());
        assert!(m.set_cache_time(f32::NAN).is_err());
    }

    #[test]
    fn corrupt_grid_is_reported() {
        let mut m = manager(TestLoader::new(1));
        m.update(0.0, ORIGIN).unwrap();
        m.grid.remove(Cell2D::new(2, 2));
        assert!(matches!(
            m.update(0.0, ORIGIN),
            Err(PagingError::GridCoverage { expected: 81, actual: 80 })
        ));

        let mut m = manager(TestLoader::new(1));
        m.update(0.0, ORIGIN).unwrap();
        m.grid.remove(Cell2D::new(-4, 1));
        assert!(matches!(
            m.update(0.0, Vec3::new(100.0, 0.0, 0.0)),
            Err(PagingError::EmptyGridSlot { .. })
        ));
    }

    #[test]
    fn dropping_manager_unloads_pages() {
        let loader = TestLoader::new(1);
        let recorder = loader.recorder.clone();
        let mut m = manager(loader);
        assert!(settle(&mut m, ORIGIN));
        m.update(0.0, ORIGIN).unwrap();
        assert!(recorder.attached() > 0);
        drop(m);
        assert_eq!(recorder.attached(), 0);
    }

    #[test]
    fn drives_through_trait_object() {
        let mut driver: Box<dyn PagingDriver> = Box::new(manager(TestLoader::new(1)));
        assert_eq!(driver.name(), "test");
        driver.update(0.0, ORIGIN).unwrap();
        assert_eq!(driver.page_count(), 81);
        driver.set_visible(false);
        assert!(!driver.is_visible());
        assert_eq!(driver.stats().live_pages, 81);
    }

    #[test]
    fn pending_pages_finish_after_gate_opens() {
        let (loader, gate) = TestLoader::new(1).gated();
        let mut m = manager(loader);
        m.update(0.0, ORIGIN).unwrap();
        m.update(0.0, ORIGIN).unwrap();
        assert_eq!(m.stats().loads_completed, 0);

        gate.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut completed = 0;
        assert!(drive_until(&mut m, ORIGIN, |m| {
            completed += m.stats().loads_completed;
            completed == 81
        }));
    }
}
