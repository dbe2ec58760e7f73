use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use verdure_paging::{
    Block, BlockCore, Cell2D, ContentHandle, LoadError, LoadTask, Page, PageCore, PageLayout,
    PageLoader,
};

use crate::site::BlockSite;
use crate::terrain::HeightProvider;

/// Suffix counter for auto-named layers and loaders.
pub(crate) const FIRST_AUTO_ID: u32 = i16::MAX as u32;

/// A kind of tree: which model to instance and whether it collides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeLayer {
    pub name: String,
    /// Key of the model the generator instances.
    pub model: String,
    pub use_physics: bool,
    /// Trunk capsule of one unscaled tree.
    pub collision_radius: f32,
    pub collision_height: f32,
}

impl Default for TreeLayer {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: String::new(),
            use_physics: false,
            collision_radius: 0.5,
            collision_height: 6.0,
        }
    }
}

impl TreeLayer {
    pub fn new(model: impl Into<String>, use_physics: bool) -> Self {
        Self {
            model: model.into(),
            use_physics,
            ..Self::default()
        }
    }
}

/// One tree instance. Position is relative to its block's center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Yaw in radians.
    pub rot: f32,
    pub scale: f32,
}

impl TreeData {
    pub fn new(x: f32, y: f32, z: f32, rot: f32, scale: f32) -> Self {
        Self { x, y, z, rot, scale }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Tree instances of one page: per layer, one list per block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDataBlock {
    layers: Vec<Vec<Vec<TreeData>>>,
    blocks: usize,
}

impl TreeDataBlock {
    pub fn new(blocks: usize) -> Self {
        Self {
            layers: Vec::new(),
            blocks,
        }
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Add `data` to block `block` of layer `layer`. Out-of-range blocks are
    /// ignored.
    pub fn push(&mut self, layer: usize, block: usize, data: TreeData) -> bool {
        if block >= self.blocks {
            return false;
        }
        if self.layers.len() <= layer {
            self.layers.resize_with(layer + 1, Vec::new);
        }
        let lists = &mut self.layers[layer];
        if lists.is_empty() {
            lists.resize_with(self.blocks, Vec::new);
        }
        lists[block].push(data);
        true
    }

    /// Instances of `layer` in `block`; empty if the layer has none.
    pub fn instances(&self, layer: usize, block: usize) -> &[TreeData] {
        self.layers
            .get(layer)
            .and_then(|lists| lists.get(block))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn instance_count(&self) -> usize {
        self.layers.iter().flatten().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.instance_count() == 0
    }

    /// Stand every tree of the block at `site` on `terrain`. Trees off the
    /// terrain keep their height.
    pub fn settle_on(&mut self, site: &BlockSite, terrain: &dyn HeightProvider) {
        let center = site.center();
        for lists in &mut self.layers {
            let Some(trees) = lists.get_mut(site.index) else {
                continue;
            };
            for tree in trees {
                if let Some(height) = terrain.height(center.x + tree.x, center.z + tree.z) {
                    tree.y = height - center.y;
                }
            }
        }
    }
}

/// Supplies tree instances per page. Called from the paging worker thread.
pub trait TreeDataProvider: Send + Sync {
    /// Instances of the page at `page`. `None` or an empty block leaves the
    /// page without trees.
    fn data(&self, page: Cell2D, layout: PageLayout) -> Option<TreeDataBlock>;
}

/// In-memory [`TreeDataProvider`]: instances in world coordinates binned by
/// page and block as they are added.
#[derive(Debug)]
pub struct TreeDataGrid {
    layout: PageLayout,
    pages: HashMap<Cell2D, TreeDataBlock>,
}

impl TreeDataGrid {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            layout,
            pages: HashMap::new(),
        }
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Add a tree at world position `(data.x, data.y, data.z)`. Returns the
    /// page it landed in.
    pub fn add_tree(&mut self, layer: usize, data: TreeData) -> Cell2D {
        let page_size = self.layout.page_size();
        let page = Cell2D::containing(data.x, data.z, page_size);
        let res = self.layout.resolution() as i32;
        let block_size = self.layout.block_size();
        let center = self.layout.page_center(page);
        let min_x = center.x - page_size * 0.5;
        let min_z = center.z - page_size * 0.5;
        let xx = (((data.x - min_x) / block_size) as i32).clamp(0, res - 1);
        let zz = (((data.z - min_z) / block_size) as i32).clamp(0, res - 1);
        let block_center = Vec3::new(
            min_x + (xx as f32 + 0.5) * block_size,
            0.0,
            min_z + (zz as f32 + 0.5) * block_size,
        );

        let relative = TreeData {
            x: data.x - block_center.x,
            z: data.z - block_center.z,
            ..data
        };
        let blocks = self.layout.blocks_per_page();
        self.pages
            .entry(page)
            .or_insert_with(|| TreeDataBlock::new(blocks))
            .push(layer, (xx + res * zz) as usize, relative);
        page
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn instance_count(&self) -> usize {
        self.pages.values().map(TreeDataBlock::instance_count).sum()
    }
}

impl TreeDataProvider for TreeDataGrid {
    fn data(&self, page: Cell2D, layout: PageLayout) -> Option<TreeDataBlock> {
        if layout != self.layout {
            tracing::warn!(
                grid_page_size = self.layout.page_size(),
                page_size = layout.page_size(),
                "tree data grid layout differs from the pager's; no data served"
            );
            return None;
        }
        self.pages.get(&page).cloned()
    }
}

/// One collision primitive: an upright capsule, relative to its block center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeInstance {
    pub translation: Vec3,
    pub rotation: f32,
    pub radius: f32,
    pub height: f32,
}

/// Collision geometry of one block: every tree of its physics layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundShape {
    pub children: Vec<ShapeInstance>,
}

impl CompoundShape {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }
}

/// Builds the renderable content of one tree block. Runs on the paging
/// worker.
pub trait TreeGenerator: Send + Sync + 'static {
    type Handle: ContentHandle;

    /// One handle for the block at `site` from the instances of each layer.
    fn generate(
        &self,
        site: &BlockSite,
        layers: &[(&TreeLayer, &[TreeData])],
    ) -> Result<Self::Handle, LoadError>;

    /// Collision geometry for the physics layers among `layers`, or `None`
    /// when no layer uses physics.
    fn collision_shape(
        &self,
        _site: &BlockSite,
        layers: &[(&TreeLayer, &[TreeData])],
    ) -> Option<CompoundShape> {
        let mut shape: Option<CompoundShape> = None;
        for (layer, data) in layers.iter().filter(|(layer, _)| layer.use_physics) {
            let shape = shape.get_or_insert_with(CompoundShape::default);
            shape.children.extend(data.iter().map(|tree| ShapeInstance {
                translation: tree.position(),
                rotation: tree.rot,
                radius: layer.collision_radius * tree.scale,
                height: layer.collision_height * tree.scale,
            }));
        }
        shape
    }
}

#[derive(Debug)]
pub struct TreeBlock<H> {
    core: BlockCore<H>,
    shape: Option<CompoundShape>,
}

impl<H> TreeBlock<H> {
    pub fn collision_shape(&self) -> Option<&CompoundShape> {
        self.shape.as_ref()
    }
}

impl<H: ContentHandle> Block for TreeBlock<H> {
    type Handle = H;

    fn core(&self) -> &BlockCore<H> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BlockCore<H> {
        &mut self.core
    }

    fn unload(&mut self) {
        self.core.unload();
        self.shape = None;
    }
}

/// Load output of a tree page.
#[derive(Debug)]
pub struct TreeContent<H> {
    pub data: TreeDataBlock,
    /// Per block: its handle and optional collision shape.
    pub blocks: Vec<(H, Option<CompoundShape>)>,
}

/// A page of trees: one detail level, and the instance data it was built from.
#[derive(Debug)]
pub struct TreePage<H> {
    core: PageCore<TreeBlock<H>, TreeContent<H>>,
    data: Option<TreeDataBlock>,
}

impl<H: ContentHandle> TreePage<H> {
    pub fn new(cell: Cell2D, layout: PageLayout) -> Self {
        Self {
            core: PageCore::new(cell, layout),
            data: None,
        }
    }

    pub fn data(&self) -> Option<&TreeDataBlock> {
        self.data.as_ref()
    }
}

impl<H: ContentHandle> Page for TreePage<H> {
    type Block = TreeBlock<H>;
    type Content = TreeContent<H>;

    fn core(&self) -> &PageCore<TreeBlock<H>, TreeContent<H>> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PageCore<TreeBlock<H>, TreeContent<H>> {
        &mut self.core
    }

    fn create_block(&self, x: i32, z: i32, center: Vec3) -> TreeBlock<H> {
        TreeBlock {
            core: BlockCore::new(x, z, center, self.core.layout().block_size()),
            shape: None,
        }
    }

    fn attach_content(&mut self, content: TreeContent<H>) -> bool {
        self.create_blocks();
        if content.blocks.len() != self.core.blocks().len() {
            return false;
        }
        for (block, (handle, shape)) in self.core.blocks_mut().iter_mut().zip(content.blocks) {
            block.core.set_nodes(vec![handle]);
            block.core.calculate_real_max(0);
            block.shape = shape;
        }
        self.data = Some(content.data);
        true
    }

    fn unload(&mut self) {
        self.core.unload();
        self.data = None;
    }
}

/// Pages trees: asks the data provider for a page's instances, then has the
/// generator build each block.
pub struct TreeLoader<G: TreeGenerator> {
    generator: Arc<G>,
    provider: Option<Arc<dyn TreeDataProvider>>,
    terrain: Option<Arc<dyn HeightProvider>>,
    layers: Arc<Vec<TreeLayer>>,
    next_layer_id: u32,
}

impl<G: TreeGenerator> TreeLoader<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator: Arc::new(generator),
            provider: None,
            terrain: None,
            layers: Arc::new(Vec::new()),
            next_layer_id: FIRST_AUTO_ID,
        }
    }

    pub fn with_data_provider(mut self, provider: impl TreeDataProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub fn set_data_provider(&mut self, provider: Arc<dyn TreeDataProvider>) {
        self.provider = Some(provider);
    }

    pub fn data_provider(&self) -> Option<&Arc<dyn TreeDataProvider>> {
        self.provider.as_ref()
    }

    /// Stand trees on `terrain` when their page loads.
    pub fn with_terrain(mut self, terrain: impl HeightProvider + 'static) -> Self {
        self.terrain = Some(Arc::new(terrain));
        self
    }

    pub fn set_terrain(&mut self, terrain: Arc<dyn HeightProvider>) {
        self.terrain = Some(terrain);
    }

    pub fn terrain(&self) -> Option<&Arc<dyn HeightProvider>> {
        self.terrain.as_ref()
    }

    /// Add a layer instancing `model`. It is named `TreeLayer<n>`.
    pub fn add_tree_layer(&mut self, model: impl Into<String>, use_physics: bool) -> &mut TreeLayer {
        self.add_layer(TreeLayer::new(model, use_physics))
    }

    /// Add a layer, naming it if it has no name. Its index is its position
    /// in [`TreeLoader::layers`].
    pub fn add_layer(&mut self, mut layer: TreeLayer) -> &mut TreeLayer {
        if layer.name.is_empty() {
            layer.name = format!("TreeLayer{}", self.next_layer_id);
            self.next_layer_id += 1;
        }
        let layers = Arc::make_mut(&mut self.layers);
        layers.push(layer);
        let index = layers.len() - 1;
        &mut layers[index]
    }

    pub fn layers(&self) -> &[TreeLayer] {
        &self.layers
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }
}

impl<G: TreeGenerator> PageLoader for TreeLoader<G> {
    type Page = TreePage<G::Handle>;

    fn create_page(&self, cell: Cell2D, layout: PageLayout) -> Self::Page {
        tracing::debug!(cell = %cell, "tree page created");
        TreePage::new(cell, layout)
    }

    fn load_page(&self, page: &Self::Page) -> Option<LoadTask<TreeContent<G::Handle>>> {
        let Some(provider) = self.provider.clone() else {
            tracing::debug!(cell = %page.core().cell(), "no tree data provider; page stays empty");
            return None;
        };
        let generator = self.generator.clone();
        let terrain = self.terrain.clone();
        let layers = self.layers.clone();
        let cell = page.core().cell();
        let layout = page.core().layout();

        let task: LoadTask<TreeContent<G::Handle>> = Box::new(move || {
            let Some(mut data) = provider.data(cell, layout).filter(|data| !data.is_empty()) else {
                return Ok(None);
            };
            if let Some(terrain) = &terrain {
                for site in BlockSite::of_page(cell, layout) {
                    data.settle_on(&site, terrain.as_ref());
                }
            }
            let mut blocks = Vec::with_capacity(layout.blocks_per_page());
            for site in BlockSite::of_page(cell, layout) {
                let per_layer: Vec<(&TreeLayer, &[TreeData])> = layers
                    .iter()
                    .enumerate()
                    .map(|(i, layer)| (layer, data.instances(i, site.index)))
                    .filter(|(_, instances)| !instances.is_empty())
                    .collect();
                let handle = generator.generate(&site, &per_layer)?;
                let shape = generator.collision_shape(&site, &per_layer);
                blocks.push((handle, shape));
            }
            Ok(Some(TreeContent { data, blocks }))
        });
        Some(task)
    }

    fn name(&self) -> &str {
        "TreeLoader"
    }
}
