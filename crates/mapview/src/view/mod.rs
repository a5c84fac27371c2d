//! The map viewport: camera, visible-tile cache, floor fades and the frame
//! passes that draw them.

mod clock;
mod fade;
mod floors;
mod geometry;
mod render;
mod stats;
mod viewport;
mod visible;


use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

pub use clock::{FrameClock, ManualClock, MonotonicClock};
pub use fade::{FadeTimer, FloorFades, ShaderFader};
pub use floors::{
    first_visible_floor, last_visible_floor, FloorLayout, FloorLayoutError, FloorMap,
    FloorViewMode, FLOOR_COUNT,
};
pub use geometry::{
    position_at_buffer_point, transform_position_to_2d, DrawRectCache, Point, Rect, Size,
};
pub use render::FrameParams;
pub use stats::{RebuildStatsSnapshot, RollingMsStats};
pub use viewport::{
    validate_visible_dimension, AwareRange, GeometryError, ViewGeometry, MIN_VISIBLE_DIMENSION,
};
pub use visible::{diagonal_cells, FloorBucket, RebuildSummary, VisibleTiles};

use crate::backend::{DrawBackend, Light, LightFactory, LightView, ShaderId, TextureId};
use crate::config::{AntialiasingMode, ConfigError, DrawFlags, ViewConfig};
use crate::world::{CameraTarget, CreatureRef, Direction, MapStore, Position, TileRef, MAX_Z};
use stats::RebuildStats;
use visible::RebuildParams;

/// Within this many tiles of the camera, upper floors are see-through in
/// [`FloorViewMode::AlwaysWithTransparency`].
pub const TRANSPARENT_FLOOR_VIEW_RANGE: i32 = 2;
/// Ambient light at or above this intensity needs no shading.
const DARK_LIGHT_INTENSITY: u8 = 250;

/// Collaborators injected into a [`MapView`].
pub struct ViewServices<B: DrawBackend> {
    pub map: Rc<dyn MapStore>,
    pub backend: B,
    pub clock: Rc<dyn FrameClock>,
    pub light_factory: LightFactory,
}

/// Why cached state went stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    CameraMoved,
    TileChanged { creature: bool },
    CreatureChanged,
    FloorViewModeChanged,
    GeometryChanged,
    FloorChanged,
    FadeFinished,
    FloorLockChanged,
    LightingToggled,
}

impl Invalidation {
    /// `(tiles, creatures)` marked dirty.
    fn dirties(self) -> (bool, bool) {
        match self {
            Invalidation::CameraMoved
            | Invalidation::FloorViewModeChanged
            | Invalidation::FadeFinished
            | Invalidation::FloorLockChanged
            | Invalidation::LightingToggled => (true, false),
            Invalidation::TileChanged { creature } => (true, creature),
            Invalidation::CreatureChanged | Invalidation::GeometryChanged => (true, true),
            Invalidation::FloorChanged => (false, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapViewEvent {
    FloorChanged { floor: u8, previous: u8 },
    FadeInFinished { floor: u8 },
}

enum Camera {
    Following(Rc<dyn CameraTarget>),
    Custom(Option<Position>),
}

pub struct MapView<B: DrawBackend> {
    map: Rc<dyn MapStore>,
    backend: B,
    clock: Rc<dyn FrameClock>,
    light_factory: LightFactory,
    light: Option<Box<dyn LightView>>,
    ambient_light: Light,

    config: ViewConfig,
    geometry: ViewGeometry,
    viewport_direction: Option<Direction>,
    camera: Camera,
    move_offset: Point,
    locked_floor: Option<u8>,

    visible: VisibleTiles,
    fades: FloorFades,
    last_fade_level: f32,
    shader: ShaderFader,
    rect_cache: Option<DrawRectCache>,
    tiles_dirty: bool,
    creatures_dirty: bool,
    camera_floor: Option<u8>,

    mouse_position: Option<Position>,
    pointer: Option<Point>,
    shift_pressed: bool,
    highlighted: Option<TileRef>,

    events: Vec<MapViewEvent>,
    stats: RebuildStats,
}

impl<B: DrawBackend> MapView<B> {
    pub fn new(config: ViewConfig, services: ViewServices<B>) -> Result<Self, ConfigError> {
        config.validate()?;
        let ViewServices {
            map,
            mut backend,
            clock,
            light_factory,
        } = services;

        let geometry = ViewGeometry::compute(
            config.visible_dimension,
            config.antialiasing.scale_factor(),
            config.sprite_size,
            backend.max_texture_size(),
            map.aware_range(),
        )?;
        backend.resize(geometry.buffer_rect().size());
        backend.set_smooth(config.antialiasing.is_smooth());

        info!(
            width = config.visible_dimension.width,
            height = config.visible_dimension.height,
            tile_size = geometry.tile_size(),
            mode = ?config.floor_view_mode,
            "map_view_created"
        );

        let draw_lights = config.draw.lights;
        let mut view = Self {
            map,
            backend,
            clock,
            light_factory,
            light: None,
            ambient_light: Light::default(),
            fades: FloorFades::new(config.floor_fading()),
            shader: ShaderFader::new(config.default_shader.clone()),
            config: ViewConfig {
                draw: DrawFlags {
                    lights: false,
                    ..config.draw
                },
                ..config
            },
            geometry,
            viewport_direction: None,
            camera: Camera::Custom(None),
            move_offset: Point::default(),
            locked_floor: None,
            visible: VisibleTiles::default(),
            last_fade_level: 1.0,
            rect_cache: None,
            tiles_dirty: true,
            creatures_dirty: true,
            camera_floor: None,
            mouse_position: None,
            pointer: None,
            shift_pressed: false,
            highlighted: None,
            events: Vec::new(),
            stats: RebuildStats::default(),
        };
        view.set_draw_lights(draw_lights);
        Ok(view)
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn geometry(&self) -> &ViewGeometry {
        &self.geometry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn visible(&self) -> &VisibleTiles {
        &self.visible
    }

    pub fn stats(&self) -> RebuildStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn drain_events(&mut self) -> Vec<MapViewEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn needs_rebuild(&self) -> (bool, bool) {
        (self.tiles_dirty, self.creatures_dirty)
    }

    pub fn invalidate(&mut self, reason: Invalidation) {
        let (tiles, creatures) = reason.dirties();
        self.tiles_dirty |= tiles;
        self.creatures_dirty |= creatures;
        trace!(?reason, "map_view_invalidated");
    }

    // Geometry and floor modes.

    /// Rejected dimensions leave the current geometry untouched.
    pub fn set_visible_dimension(&mut self, visible: Size) -> Result<(), GeometryError> {
        if visible == self.geometry.visible_dimension() {
            return Ok(());
        }
        let geometry = self.compute_geometry(visible, self.config.antialiasing)?;
        self.apply_geometry(geometry);
        Ok(())
    }

    pub fn set_antialiasing_mode(&mut self, mode: AntialiasingMode) -> Result<(), GeometryError> {
        let geometry = self.compute_geometry(self.geometry.visible_dimension(), mode)?;
        self.config.antialiasing = mode;
        self.backend.set_smooth(mode.is_smooth());
        if let Some(light) = self.light.as_mut() {
            light.set_smooth(mode.is_smooth());
        }
        self.apply_geometry(geometry);
        Ok(())
    }

    fn compute_geometry(
        &self,
        visible: Size,
        mode: AntialiasingMode,
    ) -> Result<ViewGeometry, GeometryError> {
        ViewGeometry::compute(
            visible,
            mode.scale_factor(),
            self.config.sprite_size,
            self.backend.max_texture_size(),
            self.map.aware_range(),
        )
        .map_err(|error| {
            warn!(
                width = visible.width,
                height = visible.height,
                %error,
                "visible_dimension_rejected"
            );
            error
        })
    }

    fn apply_geometry(&mut self, geometry: ViewGeometry) {
        self.backend.resize(geometry.buffer_rect().size());
        if let Some(light) = self.light.as_mut() {
            light.resize(geometry.draw_dimension(), geometry.tile_size());
        }
        info!(
            width = geometry.visible_dimension().width,
            height = geometry.visible_dimension().height,
            tile_size = geometry.tile_size(),
            "map_geometry_changed"
        );
        self.config.visible_dimension = geometry.visible_dimension();
        self.geometry = geometry;
        self.rect_cache = None;
        self.viewport_direction = None;
        self.invalidate(Invalidation::GeometryChanged);
    }

    pub fn set_floor_view_mode(&mut self, mode: FloorViewMode) {
        if mode == self.config.floor_view_mode {
            return;
        }
        debug!(?mode, "map_floor_view_mode_changed");
        self.config.floor_view_mode = mode;
        self.visible.forget_camera();
        self.invalidate(Invalidation::FloorViewModeChanged);
    }

    pub fn floor_view_mode(&self) -> FloorViewMode {
        self.config.floor_view_mode
    }

    pub fn set_floor_fading(&mut self, duration: Duration) {
        self.config.floor_fading_ms = duration.as_millis() as u64;
        self.fades.set_duration(duration);
        self.invalidate(Invalidation::FloorViewModeChanged);
    }

    pub fn lock_first_visible_floor(&mut self, floor: u8) {
        self.locked_floor = Some(floor.min(MAX_Z));
        self.visible.forget_camera();
        self.invalidate(Invalidation::FloorLockChanged);
    }

    pub fn unlock_first_visible_floor(&mut self) {
        self.locked_floor = None;
        self.visible.forget_camera();
        self.invalidate(Invalidation::FloorLockChanged);
    }

    fn effective_locked_floor(&self, camera: Position) -> Option<u8> {
        self.locked_floor.or(match self.config.floor_view_mode {
            FloorViewMode::Locked => Some(camera.z),
            _ => None,
        })
    }

    // Camera.

    pub fn camera_position(&self) -> Option<Position> {
        match &self.camera {
            Camera::Following(target) => target.position(),
            Camera::Custom(position) => *position,
        }
    }

    pub fn is_following(&self) -> bool {
        matches!(self.camera, Camera::Following(_))
    }

    pub fn follow(&mut self, target: Rc<dyn CameraTarget>) {
        self.camera = Camera::Following(target);
        self.visible.forget_camera();
        self.invalidate(Invalidation::CameraMoved);
    }

    /// Stops following; the camera stays where the target was.
    pub fn unfollow(&mut self) {
        let position = self.camera_position();
        self.leave_follow_mode();
        self.camera = Camera::Custom(position);
        self.viewport_direction = None;
        self.invalidate(Invalidation::CameraMoved);
    }

    pub fn set_camera_position(&mut self, position: Position) {
        self.leave_follow_mode();
        self.camera = Camera::Custom(Some(position));
        self.viewport_direction = None;
        self.invalidate(Invalidation::CameraMoved);
    }

    /// A custom camera never inherits the followed target's step history.
    fn leave_follow_mode(&mut self) {
        if self.is_following() {
            self.visible.forget_camera();
            self.move_offset = Point::default();
        }
    }

    /// Pans a custom camera by screen pixels; whole tiles move the camera and
    /// the remainder scrolls the framebuffer.
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        let sprite_size = self.config.sprite_size;
        self.move_offset = self.move_offset + Point::new(dx, dy);
        let steps = Point::new(
            self.move_offset.x / sprite_size,
            self.move_offset.y / sprite_size,
        );
        if steps != Point::default() {
            if let Camera::Custom(Some(position)) = &mut self.camera {
                if let Some(moved) = position.translated(steps.x, steps.y, 0) {
                    *position = moved;
                }
            }
            self.move_offset = Point::new(
                self.move_offset.x % sprite_size,
                self.move_offset.y % sprite_size,
            );
            self.invalidate(Invalidation::CameraMoved);
        }
        self.on_camera_move();
    }

    pub fn move_offset(&self) -> Point {
        self.move_offset
    }

    pub fn on_camera_move(&mut self) {
        self.rect_cache = None;
        if let Camera::Following(target) = &self.camera {
            self.viewport_direction = target.is_walking().then(|| target.direction());
        }
    }

    pub fn on_map_center_change(&mut self) {
        self.invalidate(Invalidation::CameraMoved);
    }

    fn scroll_offset(&self) -> Point {
        let offset = match &self.camera {
            Camera::Following(target) => target.walk_offset(),
            Camera::Custom(_) => self.move_offset,
        };
        offset * self.geometry.scale_factor()
    }

    // World notifications.

    pub fn on_tile_update(&mut self, position: Position, is_creature: bool) {
        trace!(x = position.x, y = position.y, z = position.z, is_creature, "map_tile_updated");
        self.invalidate(Invalidation::TileChanged {
            creature: is_creature,
        });
    }

    pub fn on_creature_change(&mut self) {
        self.invalidate(Invalidation::CreatureChanged);
    }

    pub fn on_global_light_change(&mut self) {
        self.update_light();
    }

    fn on_floor_change(&mut self, floor: u8, previous: u8) {
        info!(floor, previous, "map_floor_changed");
        self.invalidate(Invalidation::FloorChanged);
        self.update_light();
        self.events.push(MapViewEvent::FloorChanged { floor, previous });
    }

    // Pointer and highlight.

    /// Output-space pointer location, `None` when it left the window.
    pub fn set_pointer(&mut self, pointer: Option<Point>) {
        self.pointer = pointer;
    }

    pub fn mouse_position(&self) -> Option<Position> {
        self.mouse_position
    }

    pub fn highlighted_tile(&self) -> Option<&TileRef> {
        self.highlighted.as_ref()
    }

    pub fn on_mouse_move(&mut self, position: Position) {
        self.mouse_position = Some(position);
        self.highlight(position);
    }

    pub fn on_key_modifiers(&mut self, shift: bool) {
        if shift == self.shift_pressed {
            return;
        }
        self.shift_pressed = shift;
        if let Some(position) = self.mouse_position {
            self.highlight(position);
        }
    }

    fn highlight(&mut self, position: Position) {
        self.clear_highlight();
        if !self.config.draw.highlight_target {
            return;
        }
        let tile = if self.shift_pressed {
            self.top_tile(position)
        } else {
            self.map.tile(position)
        };
        if let Some(tile) = tile {
            tile.select(self.shift_pressed);
            self.highlighted = Some(tile);
        }
    }

    fn clear_highlight(&mut self) {
        if let Some(tile) = self.highlighted.take() {
            tile.unselect();
        }
    }

    /// Keeps the hovered tile under a still pointer while the camera moves.
    fn shift_mouse_with_camera(&mut self, camera: Position) {
        let (Some(mouse), Some(last)) = (self.mouse_position, self.visible.last_camera()) else {
            return;
        };
        let direction = last.direction_to(&camera);
        let step = |position: Position| match direction {
            Some(direction) => position.translated_to_direction(direction),
            None => Some(position),
        };

        let mut shifted = step(mouse);
        if camera.z != last.z {
            shifted = shifted
                .and_then(|position| position.translated(0, 0, camera.z as i32 - last.z as i32))
                .and_then(step);
        }
        match shifted {
            Some(position) => self.on_mouse_move(position),
            None => {
                self.mouse_position = None;
                self.clear_highlight();
            }
        }
    }

    // Rendering options.

    pub fn draw_flags(&self) -> DrawFlags {
        self.config.draw
    }

    pub fn set_draw_flags(&mut self, flags: DrawFlags) {
        let previous = self.config.draw;
        self.config.draw = DrawFlags {
            lights: previous.lights,
            ..flags
        };
        if previous.effects_on_top != flags.effects_on_top {
            self.invalidate(Invalidation::TileChanged { creature: false });
        }
        if !flags.highlight_target {
            self.clear_highlight();
        }
        self.set_draw_lights(flags.lights);
    }

    pub fn set_draw_lights(&mut self, enable: bool) {
        if enable == self.light.is_some() {
            return;
        }
        if enable {
            let mut light = (self.light_factory)();
            light.resize(self.geometry.draw_dimension(), self.geometry.tile_size());
            light.set_smooth(self.config.antialiasing.is_smooth());
            self.light = Some(light);
        } else {
            self.light = None;
        }
        debug!(enable, "map_lights_toggled");
        self.config.draw.lights = enable;
        self.update_light();
        self.invalidate(Invalidation::LightingToggled);
    }

    pub fn set_shadow_floor_intensity(&mut self, intensity: f32) {
        self.config.shadow_floor_intensity = intensity.clamp(0.0, 1.0);
    }

    pub fn set_minimum_ambient_light(&mut self, minimum: f32) {
        self.config.minimum_ambient_light = minimum.clamp(0.0, 1.0);
        self.update_light();
    }

    pub fn set_crosshair_texture(&mut self, texture: Option<TextureId>) {
        self.config.crosshair_texture = texture;
    }

    /// Switches the post-processing shader, cross-fading over the given
    /// durations.
    pub fn set_shader(&mut self, shader: Option<ShaderId>, fade_in: Duration, fade_out: Duration) {
        let camera = self.camera_position();
        let now = self.clock.now();
        self.shader.request(shader, fade_in, fade_out, camera, now);
    }

    pub fn shader(&self) -> Option<&ShaderId> {
        self.shader.current()
    }

    pub fn ambient_light(&self) -> Light {
        self.ambient_light
    }

    fn update_light(&mut self) {
        if self.light.is_none() {
            return;
        }
        let mut ambient = match self.camera_position() {
            Some(camera) if !self.config.layout.is_underground(camera.z) => self.map.global_light(),
            _ => Light::default(),
        };
        let minimum = (self.config.minimum_ambient_light * 255.0) as u8;
        ambient.intensity = ambient.intensity.max(minimum);
        self.ambient_light = ambient;
        if let Some(light) = self.light.as_mut() {
            light.set_global_light(ambient);
        }
        debug!(
            intensity = ambient.intensity,
            color = ambient.color,
            "map_ambient_light_updated"
        );
    }

    fn is_drawing_lights(&self) -> bool {
        self.light.is_some() && self.ambient_light.intensity < DARK_LIGHT_INTENSITY
    }

    // Floors and fades.

    pub fn first_visible_floor(&self) -> u8 {
        self.visible.first_visible()
    }

    pub fn last_visible_floor(&self) -> u8 {
        self.visible.last_visible()
    }

    fn can_floor_fade(&self) -> bool {
        self.config.floor_view_mode == FloorViewMode::Fade && !self.fades.duration().is_zero()
    }

    pub fn fade_level(&self, z: u8) -> f32 {
        if !self.can_floor_fade() {
            return 1.0;
        }
        self.fades
            .level(z, self.visible.first_visible(), self.clock.now())
    }

    fn update_visible_tiles(&mut self) {
        let Some(camera) = self.camera_position() else {
            self.visible.clear();
            return;
        };

        if self.visible.last_camera() != Some(camera) {
            self.shift_mouse_with_camera(camera);
        }
        match self.camera_floor.replace(camera.z) {
            Some(previous) if previous != camera.z => self.on_floor_change(camera.z, previous),
            None => self.update_light(),
            _ => {}
        }

        let started = Instant::now();
        let locked_floor = self.effective_locked_floor(camera);
        let collect_shades = self.is_drawing_lights();
        let fading = self.can_floor_fade();
        let now = self.clock.now();
        let summary = self.visible.rebuild(
            RebuildParams {
                map: self.map.as_ref(),
                camera,
                geometry: &self.geometry,
                mode: self.config.floor_view_mode,
                layout: &self.config.layout,
                locked_floor,
                fading,
                collect_creatures: self.creatures_dirty,
                collect_shades,
                effects_on_top: self.config.draw.effects_on_top,
                now,
            },
            &mut self.fades,
        );
        if summary.floors_revealed {
            self.last_fade_level = 0.0;
        }
        self.stats.record_rebuild(&summary, started.elapsed());
        debug!(
            first = summary.first_visible,
            last = summary.last_visible,
            scan_first = summary.scan_first,
            tiles = summary.tiles,
            creatures = summary.creatures,
            "map_visible_tiles_rebuilt"
        );

        self.tiles_dirty = false;
        self.creatures_dirty = false;
    }

    fn check_fade_finished(&mut self) {
        if !self.can_floor_fade() {
            return;
        }
        let floor = self.visible.first_visible();
        let level = self.fade_level(floor);
        if level != self.last_fade_level && level == 1.0 {
            self.last_fade_level = level;
            trace!(floor, "map_floor_fade_finished");
            self.events.push(MapViewEvent::FadeInFinished { floor });
            self.invalidate(Invalidation::FadeFinished);
        }
    }

    // Queries.

    /// World position on the camera floor under `point`, relative to an
    /// output of `map_size` pixels.
    pub fn position_at(&self, point: Point, map_size: Size) -> Option<Position> {
        let camera = self.camera_position()?;
        if map_size.is_empty() {
            return None;
        }
        let src = self
            .geometry
            .framebuffer_source(map_size, self.scroll_offset());
        let horizontal = src.width as f32 / map_size.width as f32;
        let vertical = src.height as f32 / map_size.height as f32;
        let buffer_point = Point::new(
            (point.x as f32 * horizontal) as i32,
            (point.y as f32 * vertical) as i32,
        ) + src.top_left();
        position_at_buffer_point(
            buffer_point,
            camera,
            self.geometry.virtual_center_offset(),
            self.geometry.tile_size(),
        )
    }

    /// Topmost clickable tile drawn over `position`, scanning from the first
    /// visible floor downwards.
    pub fn top_tile(&self, position: Position) -> Option<TileRef> {
        if self.config.floor_view_mode == FloorViewMode::AlwaysWithTransparency {
            if let Some(last) = self.visible.last_camera() {
                if position.is_in_range(
                    &last,
                    TRANSPARENT_FLOOR_VIEW_RANGE,
                    TRANSPARENT_FLOOR_VIEW_RANGE,
                    false,
                ) {
                    return self.map.tile(position);
                }
            }
        }

        let first = self.visible.first_visible();
        let (_, floor_max) = self.visible.populated_range();
        let mut cursor = position.covered_up(position.z as i32 - first as i32);
        for _ in first..=floor_max {
            let current = cursor?;
            if let Some(tile) = self.map.tile(current) {
                if tile.is_clickable() {
                    return Some(tile);
                }
            }
            cursor = current.covered_down(1);
        }
        None
    }

    pub fn spectators(&self, center: Position, multi_floor: bool) -> Vec<CreatureRef> {
        self.map
            .spectators_in_range(center, multi_floor, self.geometry.aware_range())
    }

    pub fn sight_spectators(&self, center: Position, multi_floor: bool) -> Vec<CreatureRef> {
        self.map
            .spectators_in_range(center, multi_floor, self.geometry.aware_range().sight())
    }

    /// Whether `position` is on screen around the camera.
    pub fn is_in_range(&self, position: Position, ignore_z: bool) -> bool {
        self.camera_in_range(position, self.geometry.aware_range().sight(), ignore_z)
    }

    /// Whether `position` is inside the full aware range around the camera.
    pub fn is_in_range_ex(&self, position: Position, ignore_z: bool) -> bool {
        self.camera_in_range(position, self.geometry.aware_range(), ignore_z)
    }

    fn camera_in_range(&self, position: Position, range: AwareRange, ignore_z: bool) -> bool {
        self.camera_position().map_or(false, |camera| {
            camera.is_in_range_ex(
                &position,
                range.left,
                range.right,
                range.top,
                range.bottom,
                ignore_z,
            )
        })
    }
}
