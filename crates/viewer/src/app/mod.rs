pub(crate) mod bootstrap;
pub(crate) mod demo;
pub(crate) mod loop_runner;

use std::path::PathBuf;

use mapview::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("demo position ({x}, {y}, {z}) is outside the map")]
    OffMap { x: i32, y: i32, z: i32 },
    #[error("surface of {width}x{height} does not hold a full RGBA image")]
    Surface { width: u32, height: u32 },
    #[error("failed to write {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode frame report: {0}")]
    Report(#[from] serde_json::Error),
}
