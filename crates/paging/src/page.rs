use glam::Vec3;
use verdure_common::Cell2D;

use crate::block::Block;
use crate::error::LoadError;
use crate::executor::TaskHandle;
use crate::grid::GridCell;

/// Smallest block edge the layout will produce, in world units.
pub const MIN_BLOCK_SIZE: f32 = 32.0;

/// Page and block dimensions shared by every page of one manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    page_size: f32,
    resolution: u32,
    block_size: f32,
}

impl PageLayout {
    /// Lay out pages of `page_size` split into `resolution x resolution`
    /// blocks. The resolution is lowered when blocks would come out
    /// narrower than [`MIN_BLOCK_SIZE`].
    pub fn new(page_size: f32, resolution: u32) -> Self {
        let mut resolution = resolution.max(1);
        if page_size / (resolution as f32) < MIN_BLOCK_SIZE {
            let clamped = ((page_size / MIN_BLOCK_SIZE) as u32).max(1);
            tracing::info!(
                page_size,
                requested = resolution,
                resolution = clamped,
                "block size below minimum; lowering page resolution"
            );
            resolution = clamped;
        }
        Self {
            page_size,
            resolution,
            block_size: page_size / resolution as f32,
        }
    }

    pub fn page_size(&self) -> f32 {
        self.page_size
    }

    /// Blocks per page edge.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    pub fn blocks_per_page(&self) -> usize {
        (self.resolution * self.resolution) as usize
    }

    /// World center of the page at `cell`. Page (0, 0) is centered on the origin.
    pub fn page_center(&self, cell: Cell2D) -> Vec3 {
        Vec3::new(
            cell.x as f32 * self.page_size,
            0.0,
            cell.z as f32 * self.page_size,
        )
    }

    /// `(i, j, center)` of every block of the page at `cell`, row by row.
    pub fn block_centers(self, cell: Cell2D) -> impl Iterator<Item = (i32, i32, Vec3)> {
        let res = self.resolution as i32;
        (0..res).flat_map(move |j| {
            (0..res).map(move |i| {
                let x = (i as f32 + 0.5) * self.block_size + (cell.x as f32 - 0.5) * self.page_size;
                let z = (j as f32 + 0.5) * self.block_size + (cell.z as f32 - 0.5) * self.page_size;
                (i, j, Vec3::new(x, 0.0, z))
            })
        })
    }
}

/// Load lifecycle of a page. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageState {
    /// Nothing requested yet.
    #[default]
    Unloaded,
    /// A load task is in flight.
    Pending,
    /// Content arrived and is attached to the blocks.
    Loaded,
    /// Loading finished without content; never retried.
    Idle,
}

/// A cell of the paging grid: the unit of loading, caching and eviction.
///
/// Concrete page types wrap a [`PageCore`] and decide what their blocks look
/// like and how finished load output is attached.
pub trait Page: 'static {
    type Block: Block;
    /// What a load task produces for this page type.
    type Content: Send + 'static;

    fn core(&self) -> &PageCore<Self::Block, Self::Content>;

    fn core_mut(&mut self) -> &mut PageCore<Self::Block, Self::Content>;

    /// Build the block at sub-coordinates (x, z) centered at `center`.
    fn create_block(&self, x: i32, z: i32, center: Vec3) -> Self::Block;

    /// Attach finished load output. Runs on the driver thread.
    ///
    /// Returns `false` if the content could not be used; the page then
    /// becomes idle.
    fn attach_content(&mut self, content: Self::Content) -> bool;

    fn update(&mut self, dt: f32) {
        for block in self.core_mut().blocks_mut() {
            block.update(dt);
        }
    }

    /// Cancel any pending load and drop all content.
    fn unload(&mut self) {
        self.core_mut().unload();
    }

    /// Replace the block list with fresh, empty blocks.
    fn create_blocks(&mut self) {
        let core = self.core();
        let blocks: Vec<Self::Block> = core
            .layout()
            .block_centers(core.cell())
            .map(|(x, z, center)| self.create_block(x, z, center))
            .collect();
        self.core_mut().set_blocks(blocks);
    }
}

impl<P: Page> GridCell for P {
    fn cell(&self) -> Cell2D {
        self.core().cell()
    }
}

/// State shared by every page: identity, layout, load state, blocks and the
/// cache retention timer.
pub struct PageCore<B, C> {
    cell: Cell2D,
    layout: PageLayout,
    center: Vec3,
    state: PageState,
    task: Option<TaskHandle<Option<C>>>,
    blocks: Vec<B>,
    cache_timer: f32,
    bumps: u32,
}

impl<B: Block, C: Send + 'static> PageCore<B, C> {
    pub fn new(cell: Cell2D, layout: PageLayout) -> Self {
        Self {
            cell,
            layout,
            center: layout.page_center(cell),
            state: PageState::Unloaded,
            task: None,
            blocks: Vec::new(),
            cache_timer: 0.0,
            bumps: 0,
        }
    }

    pub fn cell(&self) -> Cell2D {
        self.cell
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == PageState::Loaded
    }

    pub fn is_pending(&self) -> bool {
        self.state == PageState::Pending
    }

    pub fn is_idle(&self) -> bool {
        self.state == PageState::Idle
    }

    pub(crate) fn set_state(&mut self, state: PageState) {
        self.state = state;
    }

    /// Track an in-flight load and move to [`PageState::Pending`].
    pub(crate) fn begin_load(&mut self, task: TaskHandle<Option<C>>) {
        self.task = Some(task);
        self.state = PageState::Pending;
    }

    /// Poll the in-flight load. Yields the result once, then forgets the task.
    pub(crate) fn poll_task(&mut self) -> Option<Result<Option<C>, LoadError>> {
        let result = self.task.as_mut()?.poll()?;
        self.task = None;
        Some(result)
    }

    pub fn blocks(&self) -> &[B] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [B] {
        &mut self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&B> {
        self.blocks.get(index)
    }

    /// Replace the blocks, unloading the old ones.
    pub fn set_blocks(&mut self, blocks: Vec<B>) {
        for block in &mut self.blocks {
            block.unload();
        }
        self.blocks = blocks;
    }

    pub fn cache_timer(&self) -> f32 {
        self.cache_timer
    }

    /// How many times the cache timer has been reset.
    pub fn bumps(&self) -> u32 {
        self.bumps
    }

    /// Age the page while it sits in the cache.
    ///
    /// The timer advances by `dt / bumps`, so a page that keeps getting
    /// recycled ages more slowly each time.
    pub fn increase_cache_timer(&mut self, dt: f32) {
        self.cache_timer += dt / self.bumps.max(1) as f32;
    }

    pub fn reset_cache_timer(&mut self) {
        self.cache_timer = 0.0;
        self.bumps += 1;
    }

    /// Cancel any in-flight load, unload all blocks and return to
    /// [`PageState::Unloaded`].
    pub fn unload(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        for block in &mut self.blocks {
            block.unload();
        }
        self.blocks.clear();
        self.state = PageState::Unloaded;
    }
}

impl<B, C> std::fmt::Debug for PageCore<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCore")
            .field("cell", &self.cell)
            .field("state", &self.state)
            .field("blocks", &self.blocks.len())
            .field("cache_timer", &self.cache_timer)
            .field("bumps", &self.bumps)
            .finish()
    }
}
