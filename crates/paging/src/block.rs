use glam::Vec3;
use verdure_common::{Cell2D, ContentBound, ContentHandle, FadeWindow, RectBounds};

/// A sub-cell of a page: the unit of per-detail-level visibility.
///
/// Concrete block types (grass, trees, ...) wrap a [`BlockCore`] and may add
/// their own data. The paging core only talks to the core.
pub trait Block: 'static {
    type Handle: ContentHandle;

    fn core(&self) -> &BlockCore<Self::Handle>;

    fn core_mut(&mut self) -> &mut BlockCore<Self::Handle>;

    fn update(&mut self, _dt: f32) {}

    /// Detach and drop all content.
    fn unload(&mut self) {
        self.core_mut().unload();
    }
}

/// Shared state of every block: bounds, per-level content and visibility.
///
/// Once content is set, `nodes` and the visibility flags have one entry per
/// detail level, index-aligned.
#[derive(Debug)]
pub struct BlockCore<H> {
    cell: Cell2D,
    bounds: RectBounds,
    nodes: Option<Vec<H>>,
    state: Vec<bool>,
    real_max: f32,
}

impl<H: ContentHandle> BlockCore<H> {
    /// A block at sub-coordinates (x, z) of its page, centered at `center`.
    pub fn new(x: i32, z: i32, center: Vec3, block_size: f32) -> Self {
        let bounds = RectBounds::new(center, block_size);
        Self {
            cell: Cell2D::new(x, z),
            bounds,
            nodes: None,
            state: Vec::new(),
            real_max: bounds.corner_radius(),
        }
    }

    /// Sub-coordinates within the owning page.
    pub fn cell(&self) -> Cell2D {
        self.cell
    }

    pub fn bounds(&self) -> &RectBounds {
        &self.bounds
    }

    pub fn center(&self) -> Vec3 {
        self.bounds.center
    }

    /// Hand the block its content, one handle per detail level.
    ///
    /// Any previous content is detached first. All levels start hidden.
    pub fn set_nodes(&mut self, mut nodes: Vec<H>) {
        self.unload();
        for node in &mut nodes {
            node.place(self.bounds.center);
        }
        self.state = vec![false; nodes.len()];
        self.nodes = Some(nodes);
    }

    pub fn has_nodes(&self) -> bool {
        self.nodes.is_some()
    }

    pub fn nodes(&self) -> Option<&[H]> {
        self.nodes.as_deref()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.as_ref().map_or(0, Vec::len)
    }

    pub fn node(&self, level: usize) -> Option<&H> {
        self.nodes.as_ref()?.get(level)
    }

    pub fn node_mut(&mut self, level: usize) -> Option<&mut H> {
        self.nodes.as_mut()?.get_mut(level)
    }

    pub fn is_visible(&self, level: usize) -> bool {
        self.state.get(level).copied().unwrap_or(false)
    }

    /// Show or hide the content of one level.
    ///
    /// The handle is only attached or detached when the flag actually
    /// changes. Returns whether it changed.
    pub fn set_visible(&mut self, visible: bool, level: usize) -> bool {
        let Some(node) = self.nodes.as_mut().and_then(|n| n.get_mut(level)) else {
            return false;
        };
        if self.state[level] == visible {
            return false;
        }
        if visible {
            node.attach();
        } else {
            node.detach();
        }
        self.state[level] = visible;
        true
    }

    pub fn set_fade(&mut self, window: FadeWindow, level: usize) {
        if let Some(node) = self.node_mut(level) {
            node.set_fade_window(window);
        }
    }

    /// Conservative XZ radius around the block center enclosing its content.
    pub fn real_max(&self) -> f32 {
        self.real_max
    }

    /// Recompute [`real_max`](Self::real_max) from the bound of one level.
    ///
    /// Without a bound this is the distance from center to corner. A sphere
    /// adds its radius to the center offset on each axis, a box scales its
    /// offset extent by sqrt 2. The result never drops below the corner
    /// distance.
    pub fn calculate_real_max(&mut self, level: usize) {
        let corner = self.bounds.corner_radius();
        let Some(bound) = self.node(level).and_then(|node| node.bound()) else {
            self.real_max = corner;
            return;
        };

        let offset = bound.center() - self.bounds.center;
        let (dx, dz) = (offset.x.abs(), offset.z.abs());
        let reach = match bound {
            ContentBound::Sphere { radius, .. } => (dx + radius).max(dz + radius),
            ContentBound::Box { half_extents, .. } => {
                ((dx + half_extents.x) * std::f32::consts::SQRT_2)
                    .max((dz + half_extents.z) * std::f32::consts::SQRT_2)
            }
        };
        self.real_max = corner.max(reach);
    }

    /// Detach everything that is visible and drop the content.
    pub fn unload(&mut self) {
        if let Some(mut nodes) = self.nodes.take() {
            for (node, visible) in nodes.iter_mut().zip(&self.state) {
                if *visible {
                    node.detach();
                }
            }
        }
        self.state.clear();
    }
}
