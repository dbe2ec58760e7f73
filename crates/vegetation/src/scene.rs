//! Generators that turn planted vegetation into [`SceneNode`]s.

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use verdure_paging::{ContentBound, LoadError};
use verdure_render::{SceneGraph, SceneNode};

use crate::density::DensityMap;
use crate::grass::{GrassGenerator, GrassLayer};
use crate::site::BlockSite;
use crate::terrain::HeightProvider;
use crate::trees::{TreeData, TreeGenerator, TreeLayer};

/// Plants grass with each layer's [`UniformPlanting`](crate::UniformPlanting)
/// and emits one scene node per block, counting quads as instances. The
/// node's bound spans the planted ground up to the tallest layer.
#[derive(Debug, Clone)]
pub struct SceneGrassGenerator {
    scene: SceneGraph,
    seed: u64,
}

impl SceneGrassGenerator {
    pub fn new(scene: SceneGraph, seed: u64) -> Self {
        Self { scene, seed }
    }
}

impl GrassGenerator for SceneGrassGenerator {
    type Handle = SceneNode;

    fn generate(
        &self,
        site: &BlockSite,
        layers: &[(&GrassLayer, &DensityMap)],
        terrain: Option<&dyn HeightProvider>,
    ) -> Result<SceneNode, LoadError> {
        let mut rng = ChaCha8Rng::seed_from_u64(site.seed(self.seed));
        let mut quads = 0;
        let (mut low, mut high) = (f32::INFINITY, f32::NEG_INFINITY);
        for (layer, map) in layers {
            let patches = layer.plant(site, map, terrain, &mut rng);
            for patch in &patches {
                low = low.min(patch.y);
                high = high.max(patch.y + layer.max_height());
            }
            quads += patches.len() * layer.mesh_type().quads_per_patch();
        }
        if quads == 0 {
            (low, high) = (0.0, 0.0);
        }

        let half = site.bounds.half_width();
        let center = site.center();
        let bound = ContentBound::Box {
            center: Vec3::new(center.x, (low + high) * 0.5, center.z),
            half_extents: Vec3::new(half, (high - low) * 0.5, half),
        };
        let label = format!("grass {}/{}", site.page, site.index);
        Ok(self.scene.node(label, quads).with_bound(bound))
    }
}

/// Batches each block's trees into one scene node.
#[derive(Debug, Clone)]
pub struct SceneTreeGenerator {
    scene: SceneGraph,
}

impl SceneTreeGenerator {
    pub fn new(scene: SceneGraph) -> Self {
        Self { scene }
    }
}

impl TreeGenerator for SceneTreeGenerator {
    type Handle = SceneNode;

    fn generate(
        &self,
        site: &BlockSite,
        layers: &[(&TreeLayer, &[TreeData])],
    ) -> Result<SceneNode, LoadError> {
        let trees: usize = layers.iter().map(|(_, data)| data.len()).sum();
        let mut reach = site.bounds.corner_radius();
        for (layer, data) in layers {
            for tree in data.iter() {
                reach = reach.max(tree.position().length() + layer.collision_height * tree.scale);
            }
        }
        let bound = ContentBound::Sphere {
            center: site.center(),
            radius: reach,
        };
        let label = format!("trees {}/{}", site.page, site.index);
        Ok(self.scene.node(label, trees).with_bound(bound))
    }
}
