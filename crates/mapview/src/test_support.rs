//! Backend and light doubles that record every call.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{
    Color, DrawBackend, DrawPool, Light, LightFactory, LightView, ShaderId, TextureId,
    UniformSlot, UniformValue,
};
use crate::view::{Point, Rect, Size};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BackendOp {
    BeginPool(DrawPool),
    EndPool,
    SetOpacity(f32),
    ResetOpacity,
    BindShader(ShaderId),
    Uniform(UniformSlot, UniformValue),
    ResetShader,
    FilledRect(Rect, Color),
    TexturedRect(Rect, TextureId),
    Flush,
    Resize(Size),
    Smooth(bool),
}

pub(crate) struct RecordingBackend {
    pub ops: Vec<BackendOp>,
    pub max_texture_size: i32,
    pub shaders: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            max_texture_size: 4096,
            shaders: false,
        }
    }

    pub fn with_shaders() -> Self {
        Self {
            shaders: true,
            ..Self::new()
        }
    }

    pub fn take_ops(&mut self) -> Vec<BackendOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn filled_rects(&self) -> Vec<(Rect, Color)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BackendOp::FilledRect(rect, color) => Some((*rect, *color)),
                _ => None,
            })
            .collect()
    }

    pub fn last_resize(&self) -> Option<Size> {
        self.ops.iter().rev().find_map(|op| match op {
            BackendOp::Resize(size) => Some(*size),
            _ => None,
        })
    }
}

impl DrawBackend for RecordingBackend {
    fn begin_pool(&mut self, pool: DrawPool) {
        self.ops.push(BackendOp::BeginPool(pool));
    }

    fn end_pool(&mut self) {
        self.ops.push(BackendOp::EndPool);
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.ops.push(BackendOp::SetOpacity(opacity));
    }

    fn reset_opacity(&mut self) {
        self.ops.push(BackendOp::ResetOpacity);
    }

    fn supports_shaders(&self) -> bool {
        self.shaders
    }

    fn bind_shader(&mut self, shader: &ShaderId) {
        self.ops.push(BackendOp::BindShader(shader.clone()));
    }

    fn set_uniform(&mut self, slot: UniformSlot, value: UniformValue) {
        self.ops.push(BackendOp::Uniform(slot, value));
    }

    fn reset_shader(&mut self) {
        self.ops.push(BackendOp::ResetShader);
    }

    fn add_filled_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(BackendOp::FilledRect(rect, color));
    }

    fn add_textured_rect(&mut self, rect: Rect, texture: &TextureId) {
        self.ops.push(BackendOp::TexturedRect(rect, texture.clone()));
    }

    fn flush(&mut self) {
        self.ops.push(BackendOp::Flush);
    }

    fn resize(&mut self, buffer_size: Size) {
        self.ops.push(BackendOp::Resize(buffer_size));
    }

    fn set_smooth(&mut self, smooth: bool) {
        self.ops.push(BackendOp::Smooth(smooth));
    }

    fn max_texture_size(&self) -> i32 {
        self.max_texture_size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LightOp {
    Resize(Size, i32),
    GlobalLight(Light),
    Shade(Point, f32),
    Draw(Rect, Rect),
    Smooth(bool),
}

pub(crate) type LightLog = Rc<RefCell<Vec<LightOp>>>;

pub(crate) struct RecordingLight {
    log: LightLog,
}

impl LightView for RecordingLight {
    fn resize(&mut self, draw_dimension: Size, tile_size: i32) {
        self.log
            .borrow_mut()
            .push(LightOp::Resize(draw_dimension, tile_size));
    }

    fn set_global_light(&mut self, light: Light) {
        self.log.borrow_mut().push(LightOp::GlobalLight(light));
    }

    fn add_shade(&mut self, point: Point, intensity: f32) {
        self.log.borrow_mut().push(LightOp::Shade(point, intensity));
    }

    fn draw(&mut self, dest: Rect, src: Rect, _canvas: &mut dyn DrawBackend) {
        self.log.borrow_mut().push(LightOp::Draw(dest, src));
    }

    fn set_smooth(&mut self, smooth: bool) {
        self.log.borrow_mut().push(LightOp::Smooth(smooth));
    }
}

/// Factory whose lights all append to the returned log.
pub(crate) fn recording_light_factory() -> (LightFactory, LightLog) {
    let log = LightLog::default();
    let shared = log.clone();
    let factory: LightFactory = Box::new(move || -> Box<dyn LightView> {
        Box::new(RecordingLight {
            log: shared.clone(),
        })
    });
    (factory, log)
}
