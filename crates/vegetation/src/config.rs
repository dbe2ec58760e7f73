use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use verdure_paging::{DetailLevelConfig, PagingConfig, PagingError};

use crate::error::{ConfigError, VegetationError};
use crate::grass::GrassLayer;
use crate::trees::TreeLayer;

/// Vegetation setup read from a file: an optional grass and an optional
/// tree section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    pub grass: Option<GrassSection>,
    pub trees: Option<TreeSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassSection {
    pub paging: PagingConfig,
    /// Where grass ends. Used when `paging` names no detail level.
    pub far_viewing_distance: f32,
    pub fading_range: f32,
    pub wind: Vec2,
    pub layers: Vec<GrassLayer>,
}

impl Default for GrassSection {
    fn default() -> Self {
        Self {
            paging: PagingConfig {
                page_size: 256,
                resolution: 4,
                radius: 128.0,
                ..PagingConfig::default()
            },
            far_viewing_distance: 128.0,
            fading_range: 16.0,
            wind: Vec2::ZERO,
            layers: Vec::new(),
        }
    }
}

impl GrassSection {
    /// The paging configuration with its single detail level filled in.
    pub fn paging_config(&self) -> PagingConfig {
        with_single_level(&self.paging, self.far_viewing_distance, self.fading_range)
    }

    /// Check the paging setup, which must come down to exactly one detail
    /// level, and every layer.
    pub fn validate(&self) -> Result<(), VegetationError> {
        let paging = self.paging_config();
        check_single_level("GrassLoader", &paging)?;
        paging.validate()?;
        self.layers.iter().try_for_each(GrassLayer::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSection {
    pub paging: PagingConfig,
    /// Where trees end. Used when `paging` names no detail level.
    pub far_viewing_distance: f32,
    pub layers: Vec<TreeLayer>,
}

impl Default for TreeSection {
    fn default() -> Self {
        Self {
            paging: PagingConfig::default(),
            far_viewing_distance: 512.0,
            layers: Vec::new(),
        }
    }
}

impl TreeSection {
    /// The paging configuration with its single detail level filled in.
    pub fn paging_config(&self) -> PagingConfig {
        with_single_level(&self.paging, self.far_viewing_distance, 0.0)
    }

    pub fn validate(&self) -> Result<(), VegetationError> {
        let paging = self.paging_config();
        check_single_level("TreeLoader", &paging)?;
        paging.validate()?;
        Ok(())
    }
}

/// Grass and tree pagers run with exactly one detail level.
pub(crate) fn check_single_level(
    loader: &'static str,
    config: &PagingConfig,
) -> Result<(), VegetationError> {
    if config.detail_levels.len() != 1 {
        return Err(VegetationError::DetailLevels {
            loader,
            expected: 1,
            found: config.detail_levels.len(),
        });
    }
    Ok(())
}

fn with_single_level(paging: &PagingConfig, far_dist: f32, fade_range: f32) -> PagingConfig {
    let mut config = paging.clone();
    if config.detail_levels.is_empty() {
        config.detail_levels.push(DetailLevelConfig {
            far_dist,
            fade_range,
        });
    }
    config
}

impl VegetationConfig {
    /// Read a configuration, choosing YAML (`.yaml`, `.yml`) or JSON
    /// (`.json`) by extension, and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let read = || {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        let config: Self = match extension.as_deref() {
            Some("yaml" | "yml") => serde_yaml::from_str(&read()?)?,
            Some("json") => serde_json::from_str(&read()?)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), "vegetation config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VegetationError> {
        if let Some(grass) = &self.grass {
            grass.validate()?;
        }
        if let Some(trees) = &self.trees {
            trees.validate()?;
        }
        Ok(())
    }
}
