//! Vegetation on top of the paging core: grass planted from density maps,
//! trees from per-page instance data, both optionally standing on a
//! terrain, and a context that drives all pagers of a scene together.
//!
//! Loaders never touch the scene from the worker thread. Generators build
//! detached handles, and the paging manager attaches them on the driver
//! thread when they become visible.

mod config;
mod context;
mod density;
mod error;
mod grass;
mod scene;
mod site;
mod terrain;
mod trees;

pub use config::{GrassSection, TreeSection, VegetationConfig};
pub use context::VegetationContext;
pub use density::{Channel, DensityMap, DensityMaps, MapGrid, MapProvider};
pub use error::{ConfigError, VegetationError};
pub use grass::{
    GrassBlock, GrassGenerator, GrassLayer, GrassLoader, GrassPage, GrassPatch, MeshType, Scaling,
    UniformPlanting,
};
pub use scene::{SceneGrassGenerator, SceneTreeGenerator};
pub use site::BlockSite;
pub use terrain::{FlatTerrain, Ground, HeightFn, HeightProvider};
pub use trees::{
    CompoundShape, ShapeInstance, TreeBlock, TreeContent, TreeData, TreeDataBlock, TreeDataGrid,
    TreeDataProvider, TreeGenerator, TreeLayer, TreeLoader, TreePage,
};

pub fn crate_info() -> &'static str {
    "verdure-vegetation v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("vegetation"));
    }
}
