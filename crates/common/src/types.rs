use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer (x, z) address of a cell in a 2D paging grid.
///
/// Two cells are equal iff their coordinates are equal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Cell2D {
    pub x: i32,
    pub z: i32,
}

impl Cell2D {
    /// Cell coordinates are kept within the range [`packed`](Self::packed)
    /// can tell apart.
    pub const MIN_COORD: i32 = i16::MIN as i32;
    pub const MAX_COORD: i32 = i16::MAX as i32;

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The cell of `cell_size`-wide cells holding world point (x, z). Cell
    /// (0, 0) is centered on the origin.
    pub fn containing(x: f32, z: f32, cell_size: f32) -> Self {
        Self::new(Self::axis(x, cell_size), Self::axis(z, cell_size))
    }

    /// Round `v / cell_size` half away from zero, clamped to the coordinate
    /// range. NaN lands in cell 0.
    pub fn axis(v: f32, cell_size: f32) -> i32 {
        let t = v / cell_size;
        let biased = if t >= 0.0 { t + 0.5 } else { t - 0.5 };
        (biased as i32).clamp(Self::MIN_COORD, Self::MAX_COORD)
    }

    /// The cell `dx` columns and `dz` rows away from this one.
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// 32-bit identity key: x in the high 16 bits, z in the low 16 bits.
    pub const fn packed(self) -> u32 {
        ((self.x as u16 as u32) << 16) | (self.z as u16 as u32)
    }
}

impl fmt::Display for Cell2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Square bounds in the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectBounds {
    pub center: Vec3,
    /// Edge length of the square.
    pub width: f32,
}

impl RectBounds {
    pub fn new(center: Vec3, width: f32) -> Self {
        Self { center, width }
    }

    pub fn half_width(&self) -> f32 {
        self.width * 0.5
    }

    /// Distance from the center to a corner.
    pub fn corner_radius(&self) -> f32 {
        self.half_width() * std::f32::consts::SQRT_2
    }

    /// Whether the world point (x, z) lies inside, min edges inclusive.
    pub fn contains(&self, x: f32, z: f32) -> bool {
        let h = self.half_width();
        x >= self.center.x - h
            && x < self.center.x + h
            && z >= self.center.z - h
            && z < self.center.z + h
    }

    pub fn min_x(&self) -> f32 {
        self.center.x - self.half_width()
    }

    pub fn min_z(&self) -> f32 {
        self.center.z - self.half_width()
    }
}
