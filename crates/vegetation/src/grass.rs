use std::sync::Arc;

use glam::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use verdure_paging::{
    Block, BlockCore, Cell2D, ContentHandle, LoadError, LoadTask, Page, PageCore, PageLayout,
    PageLoader,
};

use crate::density::{Channel, DensityMap, MapProvider};
use crate::error::VegetationError;
use crate::site::BlockSite;
use crate::terrain::{Ground, HeightProvider};

/// How grass patches are turned into geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshType {
    /// One static quad per patch.
    #[default]
    Quads,
    /// Two crossed static quads per patch.
    CrossQuads,
    /// One camera-facing quad per patch.
    Billboards,
}

impl MeshType {
    pub fn quads_per_patch(self) -> usize {
        match self {
            MeshType::CrossQuads => 2,
            MeshType::Quads | MeshType::Billboards => 1,
        }
    }
}

/// How a density sample is shaped before the planting test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    #[default]
    Linear,
    Quadratic,
    LinearInverted,
    QuadraticInverted,
}

/// One planted patch, in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrassPatch {
    pub x: f32,
    /// Ground height under the patch; 0 without terrain.
    pub y: f32,
    pub z: f32,
    /// Size factor in `[0, 1)` between the layer's min and max dimensions.
    pub scale: f32,
    /// Yaw in `(-pi/2, pi/2]`.
    pub rotation: f32,
}

/// Scatters candidate patches uniformly over a block and keeps each with a
/// probability given by the density map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UniformPlanting {
    pub scaling: Scaling,
    /// Density needed on top of the random draw; clamped to `[0, 1]`.
    pub threshold: f32,
    /// Treat densities as 0 below the threshold and 1 at or above it.
    pub binary: bool,
}

impl UniformPlanting {
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    /// Plant up to `candidates` patches in the block at `site`. With
    /// `ground`, patches sit on the terrain and steep spots stay bare.
    pub fn plant<R: Rng + ?Sized>(
        &self,
        site: &BlockSite,
        channel: Channel,
        map: &DensityMap,
        candidates: usize,
        ground: Option<&Ground<'_>>,
        rng: &mut R,
    ) -> Vec<GrassPatch> {
        let width = site.bounds.width;
        let (offset_x, offset_z) = site.page_offset();
        let (min_x, min_z) = (site.bounds.min_x(), site.bounds.min_z());

        let mut patches = Vec::new();
        for _ in 0..candidates {
            let x = rng.random::<f32>() * width;
            let z = rng.random::<f32>() * width;
            let mut d = map.density(x + offset_x, z + offset_z, channel);
            d = match self.scaling {
                Scaling::Linear => d,
                Scaling::Quadratic => d * d,
                Scaling::LinearInverted => 1.0 - d,
                Scaling::QuadraticInverted => 1.0 - d * d,
            };
            if self.binary {
                d = if d < self.threshold { 0.0 } else { 1.0 };
            }
            if rng.random::<f32>() + self.threshold < d {
                let (x, z) = (x + min_x, z + min_z);
                let y = match ground {
                    Some(ground) => match ground.place(x, z) {
                        Some(y) => y,
                        None => continue,
                    },
                    None => 0.0,
                };
                patches.push(GrassPatch {
                    x,
                    y,
                    z,
                    scale: rng.random::<f32>(),
                    rotation: (rng.random::<f32>() - 0.5) * std::f32::consts::PI,
                });
            }
        }
        patches
    }
}

/// A kind of grass: dimensions, density and which density map drives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassLayer {
    name: String,
    mesh_type: MeshType,
    /// Index of the density map this layer reads.
    density_map: usize,
    channel: Channel,
    /// Candidate patches per square unit of block area.
    density_multiplier: f32,
    min_width: f32,
    max_width: f32,
    min_height: f32,
    max_height: f32,
    max_slope_degrees: f32,
    swaying: bool,
    wind: Vec2,
    planting: UniformPlanting,
}

impl Default for GrassLayer {
    fn default() -> Self {
        Self {
            name: String::new(),
            mesh_type: MeshType::default(),
            density_map: 0,
            channel: Channel::default(),
            density_multiplier: 1.0,
            min_width: 1.0,
            max_width: 1.2,
            min_height: 1.0,
            max_height: 1.2,
            max_slope_degrees: 30.0,
            swaying: false,
            wind: Vec2::ZERO,
            planting: UniformPlanting::default(),
        }
    }
}

impl GrassLayer {
    pub fn new(name: impl Into<String>, mesh_type: MeshType) -> Self {
        Self {
            name: name.into(),
            mesh_type,
            ..Self::default()
        }
    }

    /// Check every min/max pair and the density.
    pub fn validate(&self) -> Result<(), VegetationError> {
        check_range("grass width", self.min_width, self.max_width)?;
        check_range("grass height", self.min_height, self.max_height)?;
        if !(self.density_multiplier >= 0.0) {
            return Err(VegetationError::InvalidLayer {
                layer: self.name.clone(),
                reason: format!("density multiplier {} is negative", self.density_multiplier),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh_type(&self) -> MeshType {
        self.mesh_type
    }

    pub fn set_mesh_type(&mut self, mesh_type: MeshType) {
        self.mesh_type = mesh_type;
    }

    pub fn density_map(&self) -> usize {
        self.density_map
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Read density from channel `channel` of map `index`.
    pub fn set_density_map(&mut self, index: usize, channel: Channel) {
        self.density_map = index;
        self.channel = channel;
    }

    pub fn density_multiplier(&self) -> f32 {
        self.density_multiplier
    }

    pub fn set_density_multiplier(&mut self, density: f32) {
        self.density_multiplier = density.max(0.0);
    }

    pub fn min_width(&self) -> f32 {
        self.min_width
    }

    pub fn max_width(&self) -> f32 {
        self.max_width
    }

    pub fn min_height(&self) -> f32 {
        self.min_height
    }

    pub fn max_height(&self) -> f32 {
        self.max_height
    }

    pub fn set_min_width(&mut self, min_width: f32) -> Result<(), VegetationError> {
        check_range("grass width", min_width, self.max_width)?;
        self.min_width = min_width;
        Ok(())
    }

    pub fn set_max_width(&mut self, max_width: f32) -> Result<(), VegetationError> {
        check_range("grass width", self.min_width, max_width)?;
        self.max_width = max_width;
        Ok(())
    }

    pub fn set_min_height(&mut self, min_height: f32) -> Result<(), VegetationError> {
        check_range("grass height", min_height, self.max_height)?;
        self.min_height = min_height;
        Ok(())
    }

    pub fn set_max_height(&mut self, max_height: f32) -> Result<(), VegetationError> {
        check_range("grass height", self.min_height, max_height)?;
        self.max_height = max_height;
        Ok(())
    }

    /// Width and height at patch scale `t` in `[0, 1]`.
    pub fn dimensions(&self, t: f32) -> (f32, f32) {
        (
            self.min_width + (self.max_width - self.min_width) * t,
            self.min_height + (self.max_height - self.min_height) * t,
        )
    }

    pub fn max_slope_degrees(&self) -> f32 {
        self.max_slope_degrees
    }

    /// Steepest terrain, as the tangent of the slope angle.
    pub fn max_slope_tangent(&self) -> f32 {
        self.max_slope_degrees.to_radians().tan()
    }

    pub fn set_max_slope(&mut self, degrees: f32) {
        self.max_slope_degrees = degrees.clamp(0.0, 89.0);
    }

    /// `terrain` as this layer sees it: slopes are sampled half a full
    /// width apart and checked against the layer's maximum.
    pub fn ground<'a>(&self, terrain: &'a dyn HeightProvider) -> Ground<'a> {
        Ground::new(terrain, self.max_slope_tangent(), self.max_width * 0.5)
    }

    /// Plant this layer's patches in the block at `site`.
    pub fn plant<R: Rng + ?Sized>(
        &self,
        site: &BlockSite,
        map: &DensityMap,
        terrain: Option<&dyn HeightProvider>,
        rng: &mut R,
    ) -> Vec<GrassPatch> {
        let area = site.bounds.width * site.bounds.width;
        let candidates = (area * self.density_multiplier) as usize;
        let ground = terrain.map(|terrain| self.ground(terrain));
        self.planting
            .plant(site, self.channel, map, candidates, ground.as_ref(), rng)
    }

    pub fn is_swaying(&self) -> bool {
        self.swaying
    }

    pub fn set_swaying(&mut self, swaying: bool) {
        self.swaying = swaying;
    }

    pub fn wind(&self) -> Vec2 {
        self.wind
    }

    pub fn set_wind(&mut self, wind: Vec2) {
        self.wind = wind;
    }

    pub fn planting(&self) -> &UniformPlanting {
        &self.planting
    }

    pub fn planting_mut(&mut self) -> &mut UniformPlanting {
        &mut self.planting
    }
}

fn check_range(what: &'static str, min: f32, max: f32) -> Result<(), VegetationError> {
    if min > max {
        return Err(VegetationError::InvalidDimensions { what, min, max });
    }
    Ok(())
}

/// Builds the renderable content of one grass block. Runs on the paging
/// worker.
pub trait GrassGenerator: Send + Sync + 'static {
    type Handle: ContentHandle;

    /// One handle for the block at `site`, from every layer that has a
    /// density map on this page. May return an empty handle.
    fn generate(
        &self,
        site: &BlockSite,
        layers: &[(&GrassLayer, &DensityMap)],
        terrain: Option<&dyn HeightProvider>,
    ) -> Result<Self::Handle, LoadError>;
}

#[derive(Debug)]
pub struct GrassBlock<H> {
    core: BlockCore<H>,
}

impl<H: ContentHandle> Block for GrassBlock<H> {
    type Handle = H;

    fn core(&self) -> &BlockCore<H> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BlockCore<H> {
        &mut self.core
    }
}

/// A page of grass: one detail level, one handle per block.
#[derive(Debug)]
pub struct GrassPage<H> {
    core: PageCore<GrassBlock<H>, Vec<H>>,
}

impl<H: ContentHandle> GrassPage<H> {
    pub fn new(cell: Cell2D, layout: PageLayout) -> Self {
        Self {
            core: PageCore::new(cell, layout),
        }
    }
}

impl<H: ContentHandle> Page for GrassPage<H> {
    type Block = GrassBlock<H>;
    type Content = Vec<H>;

    fn core(&self) -> &PageCore<GrassBlock<H>, Vec<H>> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PageCore<GrassBlock<H>, Vec<H>> {
        &mut self.core
    }

    fn create_block(&self, x: i32, z: i32, center: Vec3) -> GrassBlock<H> {
        GrassBlock {
            core: BlockCore::new(x, z, center, self.core.layout().block_size()),
        }
    }

    fn attach_content(&mut self, content: Vec<H>) -> bool {
        self.create_blocks();
        if content.len() != self.core.blocks().len() {
            return false;
        }
        for (block, handle) in self.core.blocks_mut().iter_mut().zip(content) {
            let core = block.core_mut();
            core.set_nodes(vec![handle]);
            core.calculate_real_max(0);
        }
        true
    }
}

/// Pages grass: asks the map provider for density maps, then has the
/// generator build each block from the layers.
pub struct GrassLoader<G: GrassGenerator> {
    generator: Arc<G>,
    provider: Option<Arc<dyn MapProvider>>,
    terrain: Option<Arc<dyn HeightProvider>>,
    layers: Arc<Vec<GrassLayer>>,
    wind: Vec2,
}

impl<G: GrassGenerator> GrassLoader<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator: Arc::new(generator),
            provider: None,
            terrain: None,
            layers: Arc::new(Vec::new()),
            wind: Vec2::ZERO,
        }
    }

    pub fn with_map_provider(mut self, provider: impl MapProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub fn set_map_provider(&mut self, provider: Arc<dyn MapProvider>) {
        self.provider = Some(provider);
    }

    pub fn map_provider(&self) -> Option<&Arc<dyn MapProvider>> {
        self.provider.as_ref()
    }

    /// Plant on `terrain` instead of at height 0.
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

    /// Add a layer. It picks up the loader's current wind.
    pub fn add_layer(&mut self, mut layer: GrassLayer) -> Result<&mut GrassLayer, VegetationError> {
        layer.validate()?;
        layer.set_wind(self.wind);
        let layers = Arc::make_mut(&mut self.layers);
        layers.push(layer);
        let index = layers.len() - 1;
        Ok(&mut layers[index])
    }

    pub fn layers(&self) -> &[GrassLayer] {
        &self.layers
    }

    /// Mutable access to the layers. Pages already loaded keep their
    /// geometry until reloaded.
    pub fn layers_mut(&mut self) -> &mut [GrassLayer] {
        Arc::make_mut(&mut self.layers).as_mut_slice()
    }

    pub fn wind(&self) -> Vec2 {
        self.wind
    }

    /// Set the wind on the loader and every layer.
    pub fn set_wind(&mut self, wind: Vec2) {
        self.wind = wind;
        for layer in Arc::make_mut(&mut self.layers) {
            layer.set_wind(wind);
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }
}

impl<G: GrassGenerator> PageLoader for GrassLoader<G> {
    type Page = GrassPage<G::Handle>;

    fn create_page(&self, cell: Cell2D, layout: PageLayout) -> Self::Page {
        tracing::debug!(cell = %cell, "grass page created");
        GrassPage::new(cell, layout)
    }

    fn load_page(&self, page: &Self::Page) -> Option<LoadTask<Vec<G::Handle>>> {
        let Some(provider) = self.provider.clone() else {
            tracing::debug!(cell = %page.core().cell(), "no map provider; grass page stays empty");
            return None;
        };
        let generator = self.generator.clone();
        let terrain = self.terrain.clone();
        let layers = self.layers.clone();
        let cell = page.core().cell();
        let layout = page.core().layout();

        let task: LoadTask<Vec<G::Handle>> = Box::new(move || {
            let Some(maps) = provider.maps(cell).filter(|maps| !maps.is_empty()) else {
                return Ok(None);
            };
            let pairs: Vec<(&GrassLayer, &DensityMap)> = layers
                .iter()
                .filter_map(|layer| maps.get(&layer.density_map()).map(|map| (layer, map.as_ref())))
                .collect();

            BlockSite::of_page(cell, layout)
                .map(|site| generator.generate(&site, &pairs, terrain.as_deref()))
                .collect::<Result<Vec<_>, _>>()
                .map(Some)
        });
        Some(task)
    }

    fn name(&self) -> &str {
        "GrassLoader"
    }
}
