//! Collaborator interfaces the view consumes: the tile store, the entities
//! living on it, and the camera target. The view never owns any of them.

pub mod grid;
mod position;

use std::rc::Rc;

pub use position::{Direction, Position, MAX_Z};

use crate::backend::{DrawBackend, Light, LightView};
use crate::view::{AwareRange, Point, Rect};

pub type TileRef = Rc<dyn MapTile>;
pub type CreatureRef = Rc<dyn MapCreature>;
pub type MissileRef = Rc<dyn MapMissile>;
pub type TextRef = Rc<dyn MapText>;

/// Everything a tile draw hook needs besides the tile itself.
pub struct TileDraw<'a> {
    pub dest: Point,
    pub scale: f32,
    pub canvas: &'a mut dyn DrawBackend,
    pub light: Option<&'a mut dyn LightView>,
}

pub trait MapTile {
    fn position(&self) -> Position;

    /// `false` for tiles with nothing to draw at all.
    fn is_drawable(&self) -> bool;
    fn has_ground(&self) -> bool;
    fn has_surface(&self) -> bool;
    fn has_effect(&self) -> bool;
    /// Whether the tile blocks light coming from the floor above.
    fn can_shade(&self) -> bool;
    fn is_clickable(&self) -> bool;

    /// Whether the tile hides the floors above it. `is_free_view` is true when
    /// the tile is evaluated along a line of sight that is not blocked.
    fn limits_floors_view(&self, is_free_view: bool) -> bool;

    /// Tiles whose things spill over the right/bottom viewport edge are still
    /// drawn when they sit exactly on that edge.
    fn overhangs_viewport_edge(&self) -> bool {
        false
    }

    /// Whether a fully opaque tile on a floor at or above `first_visible_floor`
    /// covers this one.
    fn is_covered(&self, first_visible_floor: u8) -> bool {
        self.position().z < first_visible_floor
    }

    fn creatures(&self) -> Vec<CreatureRef>;

    fn draw_ground(&self, draw: TileDraw<'_>);
    fn draw_surface(&self, draw: TileDraw<'_>);
    fn draw_effects(&self, draw: TileDraw<'_>);

    fn select(&self, _top_only: bool) {}
    fn unselect(&self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayFlags {
    pub names: bool,
    pub health_bars: bool,
    pub mana_bar: bool,
}

impl OverlayFlags {
    pub fn any(&self) -> bool {
        self.names || self.health_bars || self.mana_bar
    }
}

/// Placement of one creature's name/health/mana overlay in output space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreatureInfo {
    pub parent_rect: Rect,
    pub dest: Point,
    pub scale: f32,
    pub draw_offset: Point,
    pub use_gray: bool,
    pub horizontal_stretch: f32,
    pub vertical_stretch: f32,
    pub flags: OverlayFlags,
}

pub trait MapCreature {
    fn position(&self) -> Position;
    fn is_dead(&self) -> bool;
    fn can_be_seen(&self) -> bool;
    fn draw_information(&self, info: &CreatureInfo, canvas: &mut dyn DrawBackend);
}

pub trait MapMissile {
    fn position(&self) -> Position;
    fn draw_missile(&self, draw: TileDraw<'_>);
}

pub trait MapText {
    fn position(&self) -> Position;
    /// Static texts with no message mode are skipped.
    fn has_message(&self) -> bool {
        true
    }
    fn draw_text(&self, dest: Point, parent_rect: Rect, canvas: &mut dyn DrawBackend);
}

/// The movable entity a camera can follow.
pub trait CameraTarget {
    fn position(&self) -> Option<Position>;
    /// Pixel offset of the in-progress step, at a scale factor of 1.
    fn walk_offset(&self) -> Point;
    fn direction(&self) -> Direction;
    fn is_walking(&self) -> bool;
}

pub trait MapStore {
    fn tile(&self, position: Position) -> Option<TileRef>;
    /// Whether sight passes through the tile at `position` (windows, doors).
    fn is_look_possible(&self, position: Position) -> bool;
    fn aware_range(&self) -> AwareRange;
    fn global_light(&self) -> Light;
    fn floor_missiles(&self, z: u8) -> Vec<MissileRef>;
    fn static_texts(&self) -> Vec<TextRef>;
    fn animated_texts(&self) -> Vec<TextRef>;
    fn spectators_in_range(
        &self,
        center: Position,
        multi_floor: bool,
        range: AwareRange,
    ) -> Vec<CreatureRef>;
}
