use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use verdure_paging::Cell2D;

use crate::error::VegetationError;

/// Color channel of a density map to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Red,
    Green,
    Blue,
    Alpha,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
            Channel::Alpha => 3,
        }
    }
}

/// A square RGBA8 image stretched over one page, read as planting density.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityMap {
    size: usize,
    page_size: f32,
    texels: Vec<[u8; 4]>,
    flip_x: bool,
    flip_z: bool,
}

impl DensityMap {
    /// A `size x size` map covering a page of edge `page_size`, row-major
    /// with rows along z.
    pub fn new(size: usize, page_size: f32, texels: Vec<[u8; 4]>) -> Result<Self, VegetationError> {
        if size == 0 || texels.len() != size * size {
            return Err(VegetationError::DensityMapSize {
                expected: size * size,
                actual: texels.len(),
            });
        }
        Ok(Self {
            size,
            page_size,
            texels,
            flip_x: false,
            flip_z: false,
        })
    }

    /// The same density everywhere, on every channel.
    pub fn uniform(density: f32, page_size: f32) -> Self {
        let v = (density.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self {
            size: 1,
            page_size,
            texels: vec![[v; 4]],
            flip_x: false,
            flip_z: false,
        }
    }

    pub fn from_fn(size: usize, page_size: f32, f: impl Fn(usize, usize) -> [u8; 4]) -> Self {
        let size = size.max(1);
        let texels = (0..size * size).map(|i| f(i % size, i / size)).collect();
        Self {
            size,
            page_size,
            texels,
            flip_x: false,
            flip_z: false,
        }
    }

    pub fn flip_x(&mut self, flip: bool) {
        self.flip_x = flip;
    }

    pub fn flip_z(&mut self, flip: bool) {
        self.flip_z = flip;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn scale(&self) -> f32 {
        self.size as f32 / self.page_size
    }

    fn local(&self, x: f32, z: f32) -> (f32, f32) {
        let x = if self.flip_x { self.page_size - x } else { x };
        let z = if self.flip_z { self.page_size - z } else { z };
        (x, z)
    }

    fn value(&self, x: usize, z: usize, channel: Channel) -> f32 {
        let texel = self.texels[z * self.size + x];
        f32::from(texel[channel.index()]) / 255.0
    }

    /// Nearest-texel density at page-local `(x, z)`, both in `0..page_size`.
    pub fn density(&self, x: f32, z: f32, channel: Channel) -> f32 {
        let (x, z) = self.local(x, z);
        let max = self.size - 1;
        let scale = self.scale();
        let xx = ((x * scale).max(0.0) as usize).min(max);
        let zz = ((z * scale).max(0.0) as usize).min(max);
        self.value(xx, zz, channel)
    }

    /// Bilinearly filtered density at page-local `(x, z)`.
    pub fn density_bilinear(&self, x: f32, z: f32, channel: Channel) -> f32 {
        let (x, z) = self.local(x, z);
        let max = (self.size - 1) as f32;
        let scale = self.scale();
        let fx = (x * scale - 0.5).clamp(0.0, max);
        let fz = (z * scale - 0.5).clamp(0.0, max);
        let (x0, z0) = (fx.floor() as usize, fz.floor() as usize);
        let (x1, z1) = ((x0 + 1).min(self.size - 1), (z0 + 1).min(self.size - 1));
        let (tx, tz) = (fx.fract(), fz.fract());

        let top = self.value(x0, z0, channel) * (1.0 - tx) + self.value(x1, z0, channel) * tx;
        let bottom = self.value(x0, z1, channel) * (1.0 - tx) + self.value(x1, z1, channel) * tx;
        top * (1.0 - tz) + bottom * tz
    }
}

/// Density maps of one page, keyed by map index.
pub type DensityMaps = HashMap<usize, Arc<DensityMap>>;

/// Supplies density maps per page. Called from the paging worker thread.
pub trait MapProvider: Send + Sync {
    /// Maps for the page at `page`. `None` or an empty set leaves the page
    /// without grass.
    fn maps(&self, page: Cell2D) -> Option<DensityMaps>;
}

/// In-memory [`MapProvider`]: density maps registered per page cell.
#[derive(Debug, Default)]
pub struct MapGrid {
    cells: HashMap<Cell2D, DensityMaps>,
}

impl MapGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `map` as map `index` of the page at `page`.
    pub fn add_density_map(&mut self, page: Cell2D, index: usize, map: DensityMap) {
        self.cells.entry(page).or_default().insert(index, Arc::new(map));
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl MapProvider for MapGrid {
    fn maps(&self, page: Cell2D) -> Option<DensityMaps> {
        self.cells.get(&page).filter(|maps| !maps.is_empty()).cloned()
    }
}
