use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{ShaderId, TextureId};
use crate::view::{
    validate_visible_dimension, FloorLayout, FloorLayoutError, FloorViewMode, GeometryError, Size,
};
use crate::world::OverlayFlags;

pub const DEFAULT_SPRITE_SIZE: i32 = 32;
pub const DEFAULT_VISIBLE_DIMENSION: Size = Size::new(15, 11);
pub const DEFAULT_FLOOR_FADING_MS: u64 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntialiasingMode {
    Disabled,
    #[default]
    Enabled,
    /// Smooth filtering on a buffer rendered at twice the sprite size.
    SmoothRetro,
}

impl AntialiasingMode {
    pub fn is_smooth(self) -> bool {
        self != AntialiasingMode::Disabled
    }

    pub fn scale_factor(self) -> f32 {
        match self {
            AntialiasingMode::SmoothRetro => 2.0,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawFlags {
    pub names: bool,
    pub health_bars: bool,
    pub mana_bar: bool,
    pub texts: bool,
    pub lights: bool,
    pub highlight_target: bool,
    /// Effects get their own pass after surfaces instead of being drawn by
    /// the tile itself.
    pub effects_on_top: bool,
}

impl Default for DrawFlags {
    fn default() -> Self {
        Self {
            names: true,
            health_bars: true,
            mana_bar: true,
            texts: true,
            lights: false,
            highlight_target: false,
            effects_on_top: true,
        }
    }
}

impl DrawFlags {
    pub fn overlays(&self) -> OverlayFlags {
        OverlayFlags {
            names: self.names,
            health_bars: self.health_bars,
            mana_bar: self.mana_bar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub visible_dimension: Size,
    pub antialiasing: AntialiasingMode,
    pub floor_view_mode: FloorViewMode,
    pub floor_fading_ms: u64,
    /// Opacity of the black shadow laid over the floor below the camera.
    pub shadow_floor_intensity: f32,
    /// Lower bound for the ambient light, as a fraction of full intensity.
    pub minimum_ambient_light: f32,
    pub draw: DrawFlags,
    pub sprite_size: i32,
    pub layout: FloorLayout,
    pub default_shader: Option<ShaderId>,
    pub crosshair_texture: Option<TextureId>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            visible_dimension: DEFAULT_VISIBLE_DIMENSION,
            antialiasing: AntialiasingMode::default(),
            floor_view_mode: FloorViewMode::default(),
            floor_fading_ms: DEFAULT_FLOOR_FADING_MS,
            shadow_floor_intensity: 0.0,
            minimum_ambient_light: 0.0,
            draw: DrawFlags::default(),
            sprite_size: DEFAULT_SPRITE_SIZE,
            layout: FloorLayout::default(),
            default_shader: None,
            crosshair_texture: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid view config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid floor layout: {0}")]
    Layout(#[from] FloorLayoutError),
    #[error("invalid visible dimension: {0}")]
    Geometry(#[from] GeometryError),
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },
    #[error("sprite size must be positive, got {0}")]
    SpriteSize(i32),
}

impl ViewConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: ViewConfig = serde_path_to_error::deserialize(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                ConfigError::Parse {
                    path,
                    source: error.into_inner(),
                }
            },
        )?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        validate_visible_dimension(self.visible_dimension)?;
        if self.sprite_size <= 0 {
            return Err(ConfigError::SpriteSize(self.sprite_size));
        }
        for (field, value) in [
            ("shadow_floor_intensity", self.shadow_floor_intensity),
            ("minimum_ambient_light", self.minimum_ambient_light),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }
        Ok(())
    }

    pub fn floor_fading(&self) -> Duration {
        Duration::from_millis(self.floor_fading_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = ViewConfig::from_json_str("{}").expect("parse");
        assert_eq!(config, ViewConfig::default());
        assert_eq!(config.floor_fading(), Duration::from_millis(500));
        assert_eq!(config.sprite_size, 32);
    }

    #[test]
    fn partial_config_overrides_selected_fields() {
        let config = ViewConfig::from_json_str(
            r#"{
                "visible_dimension": { "width": 21, "height": 15 },
                "antialiasing": "smooth_retro",
                "floor_view_mode": "always_with_transparency",
                "draw": { "lights": true },
                "layout": { "sea_floor": 4, "underground_floor": 5 },
                "default_shader": "map_default"
            }"#,
        )
        .expect("parse");
        assert_eq!(config.visible_dimension, Size::new(21, 15));
        assert_eq!(config.antialiasing.scale_factor(), 2.0);
        assert_eq!(config.floor_view_mode, FloorViewMode::AlwaysWithTransparency);
        assert!(config.draw.lights);
        assert!(config.draw.names);
        assert_eq!(config.layout.aware_underground_range, 2);
        assert_eq!(config.default_shader, Some(ShaderId::new("map_default")));
    }

    #[test]
    fn parse_error_reports_json_path() {
        let error = ViewConfig::from_json_str(r#"{ "draw": { "names": "yes" } }"#)
            .expect_err("bad type");
        match error {
            ConfigError::Parse { path, .. } => assert_eq!(path, "draw.names"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_rejects_even_dimension_and_bad_intensity() {
        let even = ViewConfig::from_json_str(r#"{ "visible_dimension": { "width": 14, "height": 11 } }"#);
        assert!(matches!(
            even,
            Err(ConfigError::Geometry(GeometryError::EvenDimension { .. }))
        ));

        let shadow = ViewConfig::from_json_str(r#"{ "shadow_floor_intensity": 1.5 }"#);
        assert!(matches!(
            shadow,
            Err(ConfigError::OutOfUnitRange {
                field: "shadow_floor_intensity",
                ..
            })
        ));

        let layout = ViewConfig::from_json_str(r#"{ "layout": { "sea_floor": 9, "underground_floor": 9 } }"#);
        assert!(matches!(layout, Err(ConfigError::Layout(_))));
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "floor_fading_ms": 0, "draw": {{ "texts": false }} }}"#).expect("write");
        let config = ViewConfig::load(file.path()).expect("load");
        assert_eq!(config.floor_fading(), Duration::ZERO);
        assert!(!config.draw.texts);

        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ViewConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}
