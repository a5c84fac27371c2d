use super::geometry::{transform_position_to_2d, DrawRectCache, Point, Rect};
use super::{Invalidation, MapView, TRANSPARENT_FLOOR_VIEW_RANGE};
use crate::backend::{
    Color, DrawBackend, DrawPool, LightView, ShaderId, UniformSlot, UniformValue,
};
use crate::view::FloorViewMode;
use crate::world::{CreatureInfo, Position, TileDraw, TileRef};

const FADED_FLOOR_OPACITY_LIMIT: f32 = 0.99;
const TRANSPARENT_NEAR_OPACITY: f32 = 0.16;
const TRANSPARENT_FAR_OPACITY: f32 = 0.7;

/// Presentation state of one map frame, applied when the map pool ends.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParams {
    pub opacity: f32,
    pub shader: Option<ShaderId>,
    pub camera: Option<Position>,
}

fn light_target(
    light: &mut Option<Box<dyn LightView>>,
    enabled: bool,
) -> Option<&mut dyn LightView> {
    match light {
        Some(light) if enabled => Some(&mut **light),
        _ => None,
    }
}

impl<B: DrawBackend> MapView<B> {
    /// Draws the map into `rect` of the output.
    pub fn draw(&mut self, rect: Rect) {
        let camera = self.camera_position();
        if camera.is_some() && camera != self.visible.last_camera() {
            self.invalidate(Invalidation::CameraMoved);
        }
        if self.tiles_dirty {
            self.update_visible_tiles();
        }

        let src = self
            .geometry
            .framebuffer_source(rect.size(), self.scroll_offset());
        let cache = match self.rect_cache {
            Some(cache) if cache.rect == rect && cache.src_rect == src => cache,
            _ => {
                let cache = DrawRectCache::new(rect, src);
                self.rect_cache = Some(cache);
                cache
            }
        };

        self.check_fade_finished();

        let frame = self.begin_frame(camera, &cache);
        if let Some(camera) = camera {
            self.draw_floors(camera);
        }
        self.draw_pointer(camera);
        self.end_frame(frame, &cache);
        self.stats.record_frame();

        let Some(camera) = camera else {
            return;
        };
        self.draw_creature_information(camera, &cache);
        if let Some(light) = self.light.as_mut() {
            light.draw(cache.rect, cache.src_rect, &mut self.backend);
        }
        self.draw_texts(camera, &cache);
    }

    /// Opens the map pool and steps the shader fade.
    pub fn begin_frame(&mut self, camera: Option<Position>, cache: &DrawRectCache) -> FrameParams {
        let opacity = self.shader.advance(self.clock.now());
        self.backend.begin_pool(DrawPool::Map {
            dest: cache.rect,
            src: cache.src_rect,
            clear: Color::BLACK,
        });
        FrameParams {
            opacity,
            shader: self.shader.current().cloned(),
            camera,
        }
    }

    /// Presents the map pool with the frame's shader and opacity.
    pub fn end_frame(&mut self, frame: FrameParams, cache: &DrawRectCache) {
        let mut shader_bound = false;
        if let (Some(shader), Some(camera)) = (&frame.shader, frame.camera) {
            if self.backend.supports_shaders() {
                self.backend.bind_shader(shader);
                for (slot, value) in self.shader_uniforms(camera, cache) {
                    self.backend.set_uniform(slot, value);
                }
                shader_bound = true;
            }
        }
        self.backend.set_opacity(frame.opacity);
        self.backend.end_pool();
        if shader_bound {
            self.backend.reset_shader();
        }
        self.backend.reset_opacity();
    }

    fn shader_uniforms(
        &self,
        camera: Position,
        cache: &DrawRectCache,
    ) -> [(UniformSlot, UniformValue); 4] {
        let buffer = self.geometry.buffer_rect();
        let (width, height) = (buffer.width as f32, buffer.height as f32);
        let draw = self.geometry.draw_dimension();
        let tile_size = self.geometry.tile_size();

        let center = cache.src_rect.center();
        let global = Point::new(
            camera.x as i32 - draw.width / 2,
            -(camera.y as i32 - draw.height / 2),
        ) * tile_size;
        let anchor = self.shader.anchor().unwrap_or(camera);
        let mut walk = transform_position_to_2d(
            camera,
            anchor,
            self.geometry.virtual_center_offset(),
            tile_size,
        );
        walk.y = -walk.y;

        [
            (
                UniformSlot::MapCenterCoord,
                UniformValue::Vec2(center.x as f32 / width, 1.0 - center.y as f32 / height),
            ),
            (
                UniformSlot::MapGlobalCoord,
                UniformValue::Vec2(global.x as f32 / height, global.y as f32 / height),
            ),
            (
                UniformSlot::MapZoom,
                UniformValue::Float(self.geometry.scale_factor()),
            ),
            (
                UniformSlot::MapWalkOffset,
                UniformValue::Vec2(walk.x as f32 / width, walk.y as f32 / height),
            ),
        ]
    }

    fn draw_floors(&mut self, camera: Position) {
        let fading = self.can_floor_fade();
        let drawing_lights = self.is_drawing_lights();
        let now = self.clock.now();
        let viewport = self.geometry.viewport(self.viewport_direction);
        let vco = self.geometry.virtual_center_offset();
        let tile_size = self.geometry.tile_size();
        let scale = self.geometry.scale_factor();
        let buffer_rect = self.geometry.buffer_rect();
        let transparent_mode =
            self.config.floor_view_mode == FloorViewMode::AlwaysWithTransparency;
        let shadow = self.config.shadow_floor_intensity;

        let Self {
            map,
            backend,
            light,
            visible,
            fades,
            ..
        } = self;
        let first = visible.first_visible();
        let (floor_min, floor_max) = visible.populated_range();
        let transform = |position: Position| {
            transform_position_to_2d(position, camera, vco, tile_size)
        };
        // Camera projected onto floor `z` when that floor is drawn see-through.
        let transparency_center = |z: u8, limit: u8| {
            if transparent_mode && z < limit {
                camera.covered_up(camera.z as i32 - z as i32)
            } else {
                None
            }
        };

        for z in (floor_min..=floor_max).rev() {
            let mut floor_opacity = None;
            if fading {
                let level = fades.level(z, first, now);
                if level == 0.0 {
                    break;
                }
                if level < FADED_FLOOR_OPACITY_LIMIT {
                    backend.set_opacity(level);
                    floor_opacity = Some(level);
                }
            }

            let Some(bucket) = visible.bucket(z) else {
                continue;
            };
            let center = transparency_center(z, first);
            let tile_opacity = |tile: &TileRef| {
                center.map(|center| {
                    if tile.position().is_in_range(
                        &center,
                        TRANSPARENT_FLOOR_VIEW_RANGE,
                        TRANSPARENT_FLOOR_VIEW_RANGE,
                        true,
                    ) {
                        TRANSPARENT_NEAR_OPACITY
                    } else {
                        TRANSPARENT_FAR_OPACITY
                    }
                })
            };

            for tile in &bucket.grounds {
                if !viewport.accepts(camera, tile.position(), tile.overhangs_viewport_edge()) {
                    continue;
                }
                let opacity = tile_opacity(tile);
                if let Some(opacity) = opacity {
                    backend.set_opacity(opacity);
                }
                tile.draw_ground(TileDraw {
                    dest: transform(tile.position()),
                    scale,
                    canvas: &mut *backend,
                    light: light_target(light, drawing_lights),
                });
                if opacity.is_some() {
                    backend.reset_opacity();
                }
            }

            for tile in &bucket.surfaces {
                if !viewport.accepts(camera, tile.position(), tile.overhangs_viewport_edge()) {
                    continue;
                }
                let opacity = tile_opacity(tile);
                if let Some(opacity) = opacity {
                    backend.set_opacity(opacity);
                }
                tile.draw_surface(TileDraw {
                    dest: transform(tile.position()),
                    scale,
                    canvas: &mut *backend,
                    light: light_target(light, drawing_lights),
                });
                if opacity.is_some() {
                    backend.reset_opacity();
                }
            }

            for tile in &bucket.effects {
                tile.draw_effects(TileDraw {
                    dest: transform(tile.position()),
                    scale,
                    canvas: &mut *backend,
                    light: light_target(light, drawing_lights),
                });
            }

            for missile in map.floor_missiles(z) {
                missile.draw_missile(TileDraw {
                    dest: transform(missile.position()),
                    scale,
                    canvas: &mut *backend,
                    light: light_target(light, drawing_lights),
                });
            }

            if shadow > 0.0 && z as i32 == camera.z as i32 + 1 {
                backend.set_opacity(shadow);
                backend.add_filled_rect(buffer_rect, Color::BLACK);
                match floor_opacity {
                    Some(level) => backend.set_opacity(level),
                    None => backend.reset_opacity(),
                }
            }

            if drawing_lights && z > floor_min {
                let next = z - 1;
                let level = if fading {
                    fades.level(next, first, now)
                } else {
                    1.0
                };
                let center = transparency_center(next, camera.z);
                let shades = visible
                    .bucket(next)
                    .filter(|_| level > 0.0)
                    .map(|above| above.shades.as_slice())
                    .unwrap_or_default();
                if let Some(light) = light.as_mut() {
                    for tile in shades {
                        let see_through = center.map_or(false, |center| {
                            tile.position().is_in_range(
                                &center,
                                TRANSPARENT_FLOOR_VIEW_RANGE,
                                TRANSPARENT_FLOOR_VIEW_RANGE,
                                true,
                            )
                        });
                        if !see_through {
                            light.add_shade(transform(tile.position()), level);
                        }
                    }
                }
            }

            if floor_opacity.is_some() {
                backend.reset_opacity();
            }
            backend.flush();
        }
    }

    /// Crosshair over the hovered tile, or drops the highlight once the
    /// pointer leaves the view.
    fn draw_pointer(&mut self, camera: Option<Position>) {
        let Some(cache) = self.rect_cache else {
            return;
        };
        let inside = self.pointer.map_or(false, |pointer| cache.rect.contains(pointer));
        if !inside {
            if self.highlighted.is_some() {
                self.mouse_position = None;
                self.clear_highlight();
            }
            return;
        }

        let (Some(texture), Some(mouse), Some(camera)) =
            (&self.config.crosshair_texture, self.mouse_position, camera)
        else {
            return;
        };
        let tile_size = self.geometry.tile_size();
        let origin = transform_position_to_2d(
            mouse,
            camera,
            self.geometry.virtual_center_offset(),
            tile_size,
        );
        self.backend.add_textured_rect(
            Rect::new(origin.x, origin.y, tile_size, tile_size),
            texture,
        );
    }

    fn draw_creature_information(&mut self, camera: Position, cache: &DrawRectCache) {
        let flags = self.config.draw.overlays();
        if !flags.any() {
            return;
        }
        let first = self.visible.first_visible();
        let transparent_mode =
            self.config.floor_view_mode == FloorViewMode::AlwaysWithTransparency;
        let vco = self.geometry.virtual_center_offset();
        let tile_size = self.geometry.tile_size();
        let scale = self.geometry.scale_factor();

        self.backend.begin_pool(DrawPool::CreatureInformation);
        for creature in self.visible.creatures() {
            if creature.is_dead() || !creature.can_be_seen() {
                continue;
            }
            let position = creature.position();
            let Some(tile) = self.map.tile(position) else {
                continue;
            };

            let mut use_gray = tile.is_covered(first);
            if use_gray && transparent_mode {
                use_gray = !tile.position().is_in_range(
                    &camera,
                    TRANSPARENT_FLOOR_VIEW_RANGE,
                    TRANSPARENT_FLOOR_VIEW_RANGE,
                    true,
                );
            }

            let info = CreatureInfo {
                parent_rect: cache.rect,
                dest: transform_position_to_2d(position, camera, vco, tile_size),
                scale,
                draw_offset: cache.draw_offset,
                use_gray,
                horizontal_stretch: cache.horizontal_stretch,
                vertical_stretch: cache.vertical_stretch,
                flags,
            };
            creature.draw_information(&info, &mut self.backend);
        }
        self.backend.end_pool();
    }

    fn draw_texts(&mut self, camera: Position, cache: &DrawRectCache) {
        if !self.config.draw.texts {
            return;
        }
        let static_texts = self.map.static_texts();
        let animated_texts = self.map.animated_texts();
        if static_texts.is_empty() && animated_texts.is_empty() {
            return;
        }
        let vco = self.geometry.virtual_center_offset();
        let tile_size = self.geometry.tile_size();

        self.backend.begin_pool(DrawPool::Text);
        let texts = static_texts
            .iter()
            .filter(|text| text.has_message())
            .chain(animated_texts.iter());
        for text in texts {
            let position = text.position();
            if position.z != camera.z {
                continue;
            }
            let dest =
                cache.buffer_to_output(transform_position_to_2d(position, camera, vco, tile_size));
            text.draw_text(dest, cache.rect, &mut self.backend);
        }
        self.backend.end_pool();
    }
}
