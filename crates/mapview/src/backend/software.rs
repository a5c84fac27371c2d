//! CPU implementation of the drawing seams over RGBA8 buffers. The map pool
//! renders into its own buffer which is presented, stretched, on `end_pool`.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use super::{
    Color, DrawBackend, DrawPool, Light, LightView, ShaderId, TextureId, UniformSlot, UniformValue,
};
use crate::view::{Point, Rect, Size};

pub const DEFAULT_MAX_TEXTURE_SIZE: i32 = 4096;
const CROSSHAIR_THICKNESS: i32 = 2;
const SHADE_DARKNESS: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.rgba = vec![0; width as usize * height as usize * 4];
    }

    pub fn clear(&mut self, color: Color) {
        let color = color.to_rgba();
        for pixel in self.rgba.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let offset = pixel_offset(self.width, self.height, x, y)?;
        let mut pixel = [0; 4];
        pixel.copy_from_slice(&self.rgba[offset..offset + 4]);
        Some(pixel)
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color, opacity: f32) {
        let left = rect.x.max(0);
        let top = rect.y.max(0);
        let right = (rect.x + rect.width).min(self.width as i32);
        let bottom = (rect.y + rect.height).min(self.height as i32);
        for y in top..bottom {
            for x in left..right {
                self.blend_pixel(x, y, color.to_rgba(), opacity);
            }
        }
    }

    pub fn outline_rect(&mut self, rect: Rect, color: Color, opacity: f32, thickness: i32) {
        let thickness = thickness.min(rect.width / 2).min(rect.height / 2).max(1);
        let edges = [
            Rect::new(rect.x, rect.y, rect.width, thickness),
            Rect::new(rect.x, rect.y + rect.height - thickness, rect.width, thickness),
            Rect::new(rect.x, rect.y + thickness, thickness, rect.height - 2 * thickness),
            Rect::new(
                rect.x + rect.width - thickness,
                rect.y + thickness,
                thickness,
                rect.height - 2 * thickness,
            ),
        ];
        for edge in edges {
            self.fill_rect(edge, color, opacity);
        }
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 4], opacity: f32) {
        let Some(offset) = pixel_offset(self.width, self.height, x, y) else {
            return;
        };
        let alpha = (color[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let target = &mut self.rgba[offset..offset + 4];
        for channel in 0..3 {
            let blended = color[channel] as f32 * alpha + target[channel] as f32 * (1.0 - alpha);
            target[channel] = blended.round() as u8;
        }
        let out_alpha = alpha + target[3] as f32 / 255.0 * (1.0 - alpha);
        target[3] = (out_alpha * 255.0).round() as u8;
    }

    /// Copies `src` of `source` onto `dest` of this surface, stretching as
    /// needed.
    fn blit_scaled(&mut self, source: &PixelSurface, src: Rect, dest: Rect, opacity: f32, smooth: bool) {
        if src.is_empty() || dest.is_empty() {
            return;
        }
        let step_x = src.width as f32 / dest.width as f32;
        let step_y = src.height as f32 / dest.height as f32;
        for out_y in dest.y.max(0)..(dest.y + dest.height).min(self.height as i32) {
            let sample_y = src.y as f32 + ((out_y - dest.y) as f32 + 0.5) * step_y - 0.5;
            for out_x in dest.x.max(0)..(dest.x + dest.width).min(self.width as i32) {
                let sample_x = src.x as f32 + ((out_x - dest.x) as f32 + 0.5) * step_x - 0.5;
                let sampled = if smooth {
                    source.sample_bilinear(sample_x, sample_y)
                } else {
                    source.pixel(sample_x.round() as i32, sample_y.round() as i32)
                };
                if let Some(pixel) = sampled {
                    self.blend_pixel(out_x, out_y, pixel, opacity);
                }
            }
        }
    }

    fn sample_bilinear(&self, x: f32, y: f32) -> Option<[u8; 4]> {
        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let corner = |cx: i32, cy: i32| {
            self.pixel(cx, cy)
                .or_else(|| self.pixel(x0.max(0), y0.max(0)))
        };
        let (top_left, top_right) = (corner(x0, y0)?, corner(x0 + 1, y0)?);
        let (bottom_left, bottom_right) = (corner(x0, y0 + 1)?, corner(x0 + 1, y0 + 1)?);
        let mut out = [0; 4];
        for channel in 0..4 {
            let top = top_left[channel] as f32 * (1.0 - fx) + top_right[channel] as f32 * fx;
            let bottom =
                bottom_left[channel] as f32 * (1.0 - fx) + bottom_right[channel] as f32 * fx;
            out[channel] = (top * (1.0 - fy) + bottom * fy).round() as u8;
        }
        Some(out)
    }
}

fn pixel_offset(width: u32, height: u32, x: i32, y: i32) -> Option<usize> {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return None;
    }
    let pixel = (y as usize).checked_mul(width as usize)?.checked_add(x as usize)?;
    pixel.checked_mul(4)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CanvasStats {
    pub rects: u64,
    pub flushes: u64,
    pub presented_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ActivePool {
    Map { dest: Rect, src: Rect },
    Overlay,
}

#[derive(Debug, Clone, PartialEq)]
enum Fill {
    Solid(Color),
    Texture(TextureId),
}

#[derive(Debug, Clone, PartialEq)]
struct QueuedRect {
    rect: Rect,
    fill: Fill,
    opacity: f32,
}

pub struct SoftwareCanvas {
    surface: PixelSurface,
    map_buffer: PixelSurface,
    pool: Option<ActivePool>,
    queue: Vec<QueuedRect>,
    opacity: f32,
    smooth: bool,
    max_texture_size: i32,
    textures: HashMap<TextureId, Color>,
    missing_textures: HashSet<TextureId>,
    stats: CanvasStats,
}

impl SoftwareCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: PixelSurface::new(width, height),
            map_buffer: PixelSurface::new(0, 0),
            pool: None,
            queue: Vec::new(),
            opacity: 1.0,
            smooth: false,
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            textures: HashMap::new(),
            missing_textures: HashSet::new(),
            stats: CanvasStats::default(),
        }
    }

    pub fn with_max_texture_size(mut self, max_texture_size: i32) -> Self {
        self.max_texture_size = max_texture_size;
        self
    }

    /// Textures are flat colors here; they render as a tile outline.
    pub fn register_texture(&mut self, texture: TextureId, color: Color) {
        self.textures.insert(texture, color);
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }

    pub fn map_buffer(&self) -> &PixelSurface {
        &self.map_buffer
    }

    pub fn clear_surface(&mut self, color: Color) {
        self.surface.clear(color);
    }

    pub fn stats(&self) -> CanvasStats {
        self.stats
    }

    pub fn is_smooth(&self) -> bool {
        self.smooth
    }

    fn target(&mut self) -> &mut PixelSurface {
        match self.pool {
            Some(ActivePool::Map { .. }) => &mut self.map_buffer,
            _ => &mut self.surface,
        }
    }

    fn rasterize(&mut self, queued: QueuedRect) {
        match queued.fill {
            Fill::Solid(color) => self.target().fill_rect(queued.rect, color, queued.opacity),
            Fill::Texture(texture) => {
                let Some(color) = self.textures.get(&texture).copied() else {
                    if self.missing_textures.insert(texture.clone()) {
                        warn!(texture = %texture.0, "software_texture_missing");
                    }
                    return;
                };
                self.target()
                    .outline_rect(queued.rect, color, queued.opacity, CROSSHAIR_THICKNESS);
            }
        }
    }
}

impl DrawBackend for SoftwareCanvas {
    fn begin_pool(&mut self, pool: DrawPool) {
        if self.pool.is_some() {
            self.end_pool();
        }
        self.pool = Some(match pool {
            DrawPool::Map { dest, src, clear } => {
                self.map_buffer.clear(clear);
                ActivePool::Map { dest, src }
            }
            DrawPool::CreatureInformation | DrawPool::Light | DrawPool::Text => ActivePool::Overlay,
        });
    }

    fn end_pool(&mut self) {
        self.flush();
        if let Some(ActivePool::Map { dest, src }) = self.pool {
            let opacity = self.opacity;
            let smooth = self.smooth;
            self.surface
                .blit_scaled(&self.map_buffer, src, dest, opacity, smooth);
            self.stats.presented_frames += 1;
        }
        self.pool = None;
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    fn reset_opacity(&mut self) {
        self.opacity = 1.0;
    }

    fn supports_shaders(&self) -> bool {
        false
    }

    fn bind_shader(&mut self, _shader: &ShaderId) {}

    fn set_uniform(&mut self, _slot: UniformSlot, _value: UniformValue) {}

    fn reset_shader(&mut self) {}

    fn add_filled_rect(&mut self, rect: Rect, color: Color) {
        self.queue.push(QueuedRect {
            rect,
            fill: Fill::Solid(color),
            opacity: self.opacity,
        });
    }

    fn add_textured_rect(&mut self, rect: Rect, texture: &TextureId) {
        self.queue.push(QueuedRect {
            rect,
            fill: Fill::Texture(texture.clone()),
            opacity: self.opacity,
        });
    }

    fn flush(&mut self) {
        let queued = std::mem::take(&mut self.queue);
        self.stats.rects += queued.len() as u64;
        self.stats.flushes += 1;
        for rect in queued {
            self.rasterize(rect);
        }
    }

    fn resize(&mut self, buffer_size: Size) {
        self.map_buffer
            .resize(buffer_size.width.max(0) as u32, buffer_size.height.max(0) as u32);
    }

    fn set_smooth(&mut self, smooth: bool) {
        self.smooth = smooth;
    }

    fn max_texture_size(&self) -> i32 {
        self.max_texture_size
    }
}

/// Ambient darkness plus shadows cast by the floor above the camera.
#[derive(Debug, Clone, Default)]
pub struct ShadeLightView {
    draw_dimension: Size,
    tile_size: i32,
    global: Light,
    shades: Vec<(Point, f32)>,
    smooth: bool,
}

impl ShadeLightView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_light(&self) -> Light {
        self.global
    }

    pub fn pending_shades(&self) -> usize {
        self.shades.len()
    }
}

impl LightView for ShadeLightView {
    fn resize(&mut self, draw_dimension: Size, tile_size: i32) {
        self.draw_dimension = draw_dimension;
        self.tile_size = tile_size;
        self.shades.clear();
    }

    fn set_global_light(&mut self, light: Light) {
        self.global = light;
    }

    fn add_shade(&mut self, point: Point, intensity: f32) {
        self.shades.push((point, intensity.clamp(0.0, 1.0)));
    }

    fn draw(&mut self, dest: Rect, src: Rect, canvas: &mut dyn DrawBackend) {
        let shades = std::mem::take(&mut self.shades);
        if src.is_empty() || dest.is_empty() {
            return;
        }
        let stretch_x = dest.width as f32 / src.width as f32;
        let stretch_y = dest.height as f32 / src.height as f32;

        canvas.begin_pool(DrawPool::Light);
        let darkness = 1.0 - self.global.intensity as f32 / 255.0;
        if darkness > 0.0 {
            canvas.set_opacity(darkness);
            canvas.add_filled_rect(dest, Color::BLACK);
        }
        for (point, intensity) in shades {
            let local = point - src.top_left();
            let rect = Rect::new(
                dest.x + (local.x as f32 * stretch_x) as i32,
                dest.y + (local.y as f32 * stretch_y) as i32,
                (self.tile_size as f32 * stretch_x).ceil() as i32,
                (self.tile_size as f32 * stretch_y).ceil() as i32,
            );
            canvas.set_opacity(SHADE_DARKNESS * intensity);
            canvas.add_filled_rect(rect, Color::BLACK);
        }
        canvas.reset_opacity();
        canvas.end_pool();
    }

    fn set_smooth(&mut self, smooth: bool) {
        self.smooth = smooth;
    }
}
