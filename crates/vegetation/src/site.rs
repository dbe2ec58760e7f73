use glam::Vec3;
use verdure_paging::{Cell2D, PageLayout, RectBounds};

/// Where a block sits: everything a generator needs to fill it, without
/// touching the page or block objects themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSite {
    pub page: Cell2D,
    pub page_center: Vec3,
    pub page_size: f32,
    /// Row-major index of the block within its page.
    pub index: usize,
    /// Sub-coordinates of the block within its page.
    pub block: Cell2D,
    pub bounds: RectBounds,
}

impl BlockSite {
    /// Every block site of the page at `page`, in block order.
    pub fn of_page(page: Cell2D, layout: PageLayout) -> impl Iterator<Item = BlockSite> {
        let page_center = layout.page_center(page);
        layout
            .block_centers(page)
            .enumerate()
            .map(move |(index, (i, j, center))| BlockSite {
                page,
                page_center,
                page_size: layout.page_size(),
                index,
                block: Cell2D::new(i, j),
                bounds: RectBounds::new(center, layout.block_size()),
            })
    }

    pub fn center(&self) -> Vec3 {
        self.bounds.center
    }

    /// Offset of the block's minimum corner from the page's minimum corner.
    pub fn page_offset(&self) -> (f32, f32) {
        let half_page = self.page_size * 0.5;
        (
            self.bounds.min_x() - self.page_center.x + half_page,
            self.bounds.min_z() - self.page_center.z + half_page,
        )
    }

    /// Stable per-block seed so regenerated content comes out identical.
    pub fn seed(&self, base: u64) -> u64 {
        let page = u64::from(self.page.packed());
        base ^ (page << 16) ^ self.index as u64
    }
}
