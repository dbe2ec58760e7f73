//! Ground height under vegetation.

/// Terrain height lookup. Called from the paging worker thread.
pub trait HeightProvider: Send + Sync {
    /// Ground height at world point (x, z), or `None` off the terrain.
    fn height(&self, x: f32, z: f32) -> Option<f32>;

    /// Steeper of the x and z slopes at (x, z) as a tangent, from central
    /// differences `step` either side. `None` if a sample is off the terrain.
    fn slope_tangent(&self, x: f32, z: f32, step: f32) -> Option<f32> {
        let dx = self.height(x + step, z)? - self.height(x - step, z)?;
        let dz = self.height(x, z + step)? - self.height(x, z - step)?;
        Some(dx.abs().max(dz.abs()) / (2.0 * step))
    }
}

/// Level ground at a fixed height.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlatTerrain {
    pub height: f32,
}

impl FlatTerrain {
    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl HeightProvider for FlatTerrain {
    fn height(&self, _x: f32, _z: f32) -> Option<f32> {
        Some(self.height)
    }

    fn slope_tangent(&self, _x: f32, _z: f32, _step: f32) -> Option<f32> {
        Some(0.0)
    }
}

/// Unbounded terrain whose height is a function of (x, z).
#[derive(Debug, Clone, Copy)]
pub struct HeightFn<F>(pub F);

impl<F> HeightProvider for HeightFn<F>
where
    F: Fn(f32, f32) -> f32 + Send + Sync,
{
    fn height(&self, x: f32, z: f32) -> Option<f32> {
        Some((self.0)(x, z))
    }
}

/// Terrain a layer grows on, and the steepest ground it accepts.
#[derive(Clone, Copy)]
pub struct Ground<'a> {
    terrain: &'a dyn HeightProvider,
    max_slope_tangent: f32,
    step: f32,
}

impl<'a> Ground<'a> {
    /// `step` is how far apart slope samples are taken; at least 0.01.
    pub fn new(terrain: &'a dyn HeightProvider, max_slope_tangent: f32, step: f32) -> Self {
        Self {
            terrain,
            max_slope_tangent,
            step: step.max(0.01),
        }
    }

    pub fn max_slope_tangent(&self) -> f32 {
        self.max_slope_tangent
    }

    /// Height to plant at, or `None` where the ground is too steep or
    /// missing.
    pub fn place(&self, x: f32, z: f32) -> Option<f32> {
        let slope = self.terrain.slope_tangent(x, z, self.step)?;
        if slope > self.max_slope_tangent {
            return None;
        }
        self.terrain.height(x, z)
    }
}

impl std::fmt::Debug for Ground<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ground")
            .field("max_slope_tangent", &self.max_slope_tangent)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}
