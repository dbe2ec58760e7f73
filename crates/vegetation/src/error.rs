use std::path::PathBuf;

use verdure_paging::PagingError;

/// Errors from vegetation setup: layer configuration and loader wiring.
#[derive(Debug, thiserror::Error)]
pub enum VegetationError {
    #[error("{what}: minimum {min} exceeds maximum {max}")]
    InvalidDimensions { what: &'static str, min: f32, max: f32 },
    #[error("invalid layer '{layer}': {reason}")]
    InvalidLayer { layer: String, reason: String },
    #[error("density map is {actual} texels, expected {expected}")]
    DensityMapSize { expected: usize, actual: usize },
    #[error("{loader} needs exactly {expected} detail level(s), got {found}")]
    DetailLevels {
        loader: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("paging error: {0}")]
    Paging(#[from] PagingError),
}

/// Errors from reading a vegetation configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0:?} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(PathBuf),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] VegetationError),
}
