pub mod backend;
pub mod config;
pub mod view;
pub mod world;

#[cfg(test)]
mod test_support;

pub use backend::software::{CanvasStats, PixelSurface, ShadeLightView, SoftwareCanvas};
pub use backend::{
    Color, DrawBackend, DrawPool, Light, LightFactory, LightView, ShaderId, TextureId,
    UniformSlot, UniformValue,
};
pub use config::{
    AntialiasingMode, ConfigError, DrawFlags, ViewConfig, DEFAULT_FLOOR_FADING_MS,
    DEFAULT_SPRITE_SIZE, DEFAULT_VISIBLE_DIMENSION,
};
pub use view::{
    AwareRange, FloorLayout, FloorViewMode, FrameClock, GeometryError, Invalidation,
    ManualClock, MapView, MapViewEvent, MonotonicClock, Point, RebuildStatsSnapshot, Rect, Size,
    ViewGeometry, ViewServices,
};
pub use world::grid::{GridCreature, GridItem, GridMap, GridMissile, GridText};
pub use world::{
    CameraTarget, CreatureInfo, Direction, MapCreature, MapMissile, MapStore, MapText, MapTile,
    OverlayFlags, Position, TileDraw, MAX_Z,
};

/// Environment variable naming the JSON view config file.
pub const CONFIG_ENV_VAR: &str = "MAPVIEW_CONFIG";
