use std::sync::Arc;

use glam::Vec3;
use verdure_paging::{PagingConfig, PagingDriver, PagingManager, PagingStats};
use verdure_render::SceneGraph;

use crate::config::{GrassSection, TreeSection, check_single_level};
use crate::density::MapProvider;
use crate::error::VegetationError;
use crate::grass::{GrassGenerator, GrassLoader};
use crate::scene::{SceneGrassGenerator, SceneTreeGenerator};
use crate::terrain::HeightProvider;
use crate::trees::{FIRST_AUTO_ID, TreeDataProvider, TreeGenerator, TreeLoader};

/// Owns every vegetation pager of one scene and drives them together.
///
/// Pagers are kept in insertion order under unique names. Unnamed pagers are
/// named after their loader plus a running number, e.g. `GrassLoader32767`.
pub struct VegetationContext {
    scene: SceneGraph,
    terrain: Option<Arc<dyn HeightProvider>>,
    next_id: u32,
    drivers: Vec<(String, Box<dyn PagingDriver>)>,
}

impl VegetationContext {
    pub fn new(scene: SceneGraph) -> Self {
        Self {
            scene,
            terrain: None,
            next_id: FIRST_AUTO_ID,
            drivers: Vec::new(),
        }
    }

    /// The scene that pagers built from config sections attach to.
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Terrain that pagers added from config sections from now on stand on.
    pub fn set_terrain(&mut self, terrain: Arc<dyn HeightProvider>) {
        self.terrain = Some(terrain);
    }

    pub fn terrain(&self) -> Option<&Arc<dyn HeightProvider>> {
        self.terrain.as_ref()
    }

    /// Take ownership of `driver` and return the name it is kept under.
    /// A taken name gets a running number appended.
    pub fn add(&mut self, name: Option<&str>, driver: Box<dyn PagingDriver>) -> String {
        let mut name = match name {
            Some(name) if !self.contains(name) => name.to_owned(),
            Some(name) => self.auto_name(name),
            None => self.auto_name(driver.name()),
        };
        while self.contains(&name) {
            name = self.auto_name(driver.name());
        }
        tracing::info!(name = %name, loader = driver.name(), "vegetation pager added");
        self.drivers.push((name.clone(), driver));
        name
    }

    fn auto_name(&mut self, base: &str) -> String {
        let name = format!("{base}{}", self.next_id);
        self.next_id += 1;
        name
    }

    fn contains(&self, name: &str) -> bool {
        self.drivers.iter().any(|(n, _)| n == name)
    }

    /// Page grass with `loader`. The configuration must name exactly one
    /// detail level.
    pub fn create_grass_loader<G: GrassGenerator>(
        &mut self,
        config: PagingConfig,
        loader: GrassLoader<G>,
    ) -> Result<String, VegetationError> {
        check_single_level("GrassLoader", &config)?;
        let manager = PagingManager::new(config, loader)?;
        Ok(self.add(None, Box::new(manager)))
    }

    /// Page trees with `loader`. The configuration must name exactly one
    /// detail level.
    pub fn create_tree_loader<G: TreeGenerator>(
        &mut self,
        config: PagingConfig,
        loader: TreeLoader<G>,
    ) -> Result<String, VegetationError> {
        check_single_level("TreeLoader", &config)?;
        let manager = PagingManager::new(config, loader)?;
        Ok(self.add(None, Box::new(manager)))
    }

    /// Page grass as described by `section`, drawn into this context's scene.
    pub fn add_grass_section(
        &mut self,
        section: &GrassSection,
        provider: Arc<dyn MapProvider>,
        seed: u64,
    ) -> Result<String, VegetationError> {
        section.validate()?;
        let mut loader = GrassLoader::new(SceneGrassGenerator::new(self.scene.clone(), seed));
        loader.set_map_provider(provider);
        if let Some(terrain) = &self.terrain {
            loader.set_terrain(terrain.clone());
        }
        loader.set_wind(section.wind);
        for layer in &section.layers {
            loader.add_layer(layer.clone())?;
        }
        self.create_grass_loader(section.paging_config(), loader)
    }

    /// Page trees as described by `section`, drawn into this context's scene.
    pub fn add_tree_section(
        &mut self,
        section: &TreeSection,
        provider: Arc<dyn TreeDataProvider>,
    ) -> Result<String, VegetationError> {
        section.validate()?;
        let mut loader = TreeLoader::new(SceneTreeGenerator::new(self.scene.clone()));
        loader.set_data_provider(provider);
        if let Some(terrain) = &self.terrain {
            loader.set_terrain(terrain.clone());
        }
        for layer in &section.layers {
            loader.add_layer(layer.clone());
        }
        self.create_tree_loader(section.paging_config(), loader)
    }

    /// Drop the pager called `name`, detaching everything it shows.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(index) = self.drivers.iter().position(|(n, _)| n == name) else {
            tracing::info!(name, "no vegetation pager by that name");
            return false;
        };
        self.drivers.remove(index);
        tracing::info!(name, "vegetation pager removed");
        true
    }

    pub fn get(&self, name: &str) -> Option<&dyn PagingDriver> {
        self.drivers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn PagingDriver + 'static)> {
        self.drivers
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_mut())
    }

    /// Tick every pager with the observer's position.
    pub fn update(&mut self, dt: f32, observer: Vec3) -> Result<(), VegetationError> {
        for (_, driver) in &mut self.drivers {
            driver.update(dt, observer)?;
        }
        Ok(())
    }

    pub fn set_visible(&mut self, visible: bool) {
        for (_, driver) in &mut self.drivers {
            driver.set_visible(visible);
        }
    }

    /// Last tick's statistics of each pager, by name.
    pub fn stats(&self) -> impl Iterator<Item = (&str, &PagingStats)> {
        self.drivers.iter().map(|(n, d)| (n.as_str(), d.stats()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.drivers.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl Default for VegetationContext {
    fn default() -> Self {
        Self::new(SceneGraph::new())
    }
}

impl std::fmt::Debug for VegetationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VegetationContext")
            .field("pagers", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
