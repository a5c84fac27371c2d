//! Seams to the drawing and lighting backends. The view only ever talks to
//! these traits; `software` holds an RGBA implementation of both.

pub mod software;

use serde::{Deserialize, Serialize};

use crate::view::{Point, Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with alpha replaced by `opacity` in `[0, 1]`.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let a = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { a, ..self }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShaderId(pub String);

impl ShaderId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureId(pub String);

impl TextureId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawPool {
    /// The framed map pool: everything is drawn into a buffer of the current
    /// geometry and `src` of it is presented stretched onto `dest`.
    Map { dest: Rect, src: Rect, clear: Color },
    CreatureInformation,
    Light,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    MapCenterCoord,
    MapGlobalCoord,
    MapZoom,
    MapWalkOffset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(f32, f32),
}

pub trait DrawBackend {
    fn begin_pool(&mut self, pool: DrawPool);
    fn end_pool(&mut self);

    fn set_opacity(&mut self, opacity: f32);
    fn reset_opacity(&mut self);

    fn supports_shaders(&self) -> bool;
    fn bind_shader(&mut self, shader: &ShaderId);
    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue);
    fn reset_shader(&mut self);

    fn add_filled_rect(&mut self, rect: Rect, color: Color);
    fn add_textured_rect(&mut self, rect: Rect, texture: &TextureId);
    /// Submits everything queued since the last flush.
    fn flush(&mut self);

    fn resize(&mut self, buffer_size: Size);
    fn set_smooth(&mut self, smooth: bool);
    fn max_texture_size(&self) -> i32;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Light {
    pub intensity: u8,
    pub color: u8,
}

pub trait LightView {
    fn resize(&mut self, draw_dimension: Size, tile_size: i32);
    fn set_global_light(&mut self, light: Light);
    fn add_shade(&mut self, point: Point, intensity: f32);
    fn draw(&mut self, dest: Rect, src: Rect, canvas: &mut dyn DrawBackend);
    fn set_smooth(&mut self, smooth: bool);
}

/// Creates the lighting instance whenever lights get enabled.
pub type LightFactory = Box<dyn Fn() -> Box<dyn LightView>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_opacity_clamps_and_rounds() {
        assert_eq!(Color::BLACK.with_opacity(0.5).a, 128);
        assert_eq!(Color::BLACK.with_opacity(2.0).a, 255);
        assert_eq!(Color::BLACK.with_opacity(-1.0).a, 0);
    }
}
