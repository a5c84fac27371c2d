use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::world::Position;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<i32> for Point {
    type Output = Point;

    fn mul(self, rhs: i32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    fn mul(self, rhs: f32) -> Point {
        Point::new(
            (self.x as f32 * rhs) as i32,
            (self.y as f32 * rhs) as i32,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Largest size with this aspect ratio that fits inside `bounds`.
    pub fn scaled_to_fit(self, bounds: Size) -> Size {
        if self.is_empty() || bounds.is_empty() {
            return Size::default();
        }
        let width_at_bound_height =
            (bounds.height as i64 * self.width as i64 / self.height as i64) as i32;
        if width_at_bound_height <= bounds.width {
            Size::new(width_at_bound_height, bounds.height)
        } else {
            let height_at_bound_width =
                (bounds.width as i64 * self.height as i64 / self.width as i64) as i32;
            Size::new(bounds.width, height_at_bound_width)
        }
    }
}

impl Mul<i32> for Size {
    type Output = Size;

    fn mul(self, rhs: i32) -> Size {
        Size::new(self.width * rhs, self.height * rhs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_origin(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

/// Pixel origin of `position`'s tile inside the draw buffer. Tiles on other
/// floors than the camera are shifted one tile diagonally per floor.
pub fn transform_position_to_2d(
    position: Position,
    camera: Position,
    virtual_center_offset: Point,
    tile_size: i32,
) -> Point {
    let floor_shift = camera.z as i32 - position.z as i32;
    Point::new(
        (virtual_center_offset.x + (position.x as i32 - camera.x as i32) - floor_shift)
            * tile_size,
        (virtual_center_offset.y + (position.y as i32 - camera.y as i32) - floor_shift)
            * tile_size,
    )
}

/// Inverse of [`transform_position_to_2d`] on the camera floor: the position
/// whose tile contains `buffer_point`.
pub fn position_at_buffer_point(
    buffer_point: Point,
    camera: Position,
    virtual_center_offset: Point,
    tile_size: i32,
) -> Option<Position> {
    if tile_size <= 0 {
        return None;
    }
    let cell = Point::new(
        buffer_point.x.div_euclid(tile_size),
        buffer_point.y.div_euclid(tile_size),
    );
    camera.translated(
        cell.x - virtual_center_offset.x,
        cell.y - virtual_center_offset.y,
        0,
    )
}

/// Output rectangle → framebuffer source mapping, kept until either side
/// changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRectCache {
    pub rect: Rect,
    pub src_rect: Rect,
    pub draw_offset: Point,
    pub horizontal_stretch: f32,
    pub vertical_stretch: f32,
}

impl DrawRectCache {
    pub fn new(rect: Rect, src_rect: Rect) -> Self {
        let horizontal_stretch = if src_rect.width > 0 {
            rect.width as f32 / src_rect.width as f32
        } else {
            1.0
        };
        let vertical_stretch = if src_rect.height > 0 {
            rect.height as f32 / src_rect.height as f32
        } else {
            1.0
        };
        Self {
            rect,
            src_rect,
            draw_offset: src_rect.top_left(),
            horizontal_stretch,
            vertical_stretch,
        }
    }

    /// Maps a draw-buffer point into output space.
    pub fn buffer_to_output(&self, buffer_point: Point) -> Point {
        let local = buffer_point - self.draw_offset;
        Point::new(
            (local.x as f32 * self.horizontal_stretch) as i32,
            (local.y as f32 * self.vertical_stretch) as i32,
        ) + self.rect.top_left()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: u16, y: u16, z: u8) -> Position {
        Position::new(x, y, z).expect("valid position")
    }

    #[test]
    fn camera_maps_to_virtual_center() {
        let camera = pos(100, 100, 7);
        let point = transform_position_to_2d(camera, camera, Point::new(8, 6), 32);
        assert_eq!(point, Point::new(256, 192));
    }

    #[test]
    fn offset_tile_shifts_by_tile_size() {
        let camera = pos(100, 100, 7);
        let point = transform_position_to_2d(pos(102, 99, 7), camera, Point::new(8, 6), 32);
        assert_eq!(point, Point::new(320, 160));
    }

    #[test]
    fn upper_floor_tile_shifts_up_left_per_floor() {
        let camera = pos(100, 100, 7);
        let above = pos(99, 99, 6);
        let point = transform_position_to_2d(above, camera, Point::new(8, 6), 32);
        assert_eq!(point, Point::new((8 - 1 - 1) * 32, (6 - 1 - 1) * 32));
    }

    #[test]
    fn covered_positions_share_a_screen_cell() {
        let camera = pos(100, 100, 7);
        let ground = pos(103, 98, 7);
        for floors in 1..=7 {
            let covering = ground.covered_up(floors).expect("covered up");
            assert_eq!(
                transform_position_to_2d(covering, camera, Point::new(8, 6), 32),
                transform_position_to_2d(ground, camera, Point::new(8, 6), 32)
            );
        }
    }

    #[test]
    fn buffer_point_inverse_recovers_position_on_camera_floor() {
        let camera = pos(100, 100, 7);
        let vco = Point::new(8, 6);
        for dx in -8..=8 {
            for dy in -6..=6 {
                let target = camera.translated(dx, dy, 0).expect("in bounds");
                let origin = transform_position_to_2d(target, camera, vco, 32);
                let inside = origin + Point::new(31, 5);
                assert_eq!(
                    position_at_buffer_point(inside, camera, vco, 32),
                    Some(target)
                );
            }
        }
    }

    #[test]
    fn buffer_point_outside_world_is_none() {
        let camera = pos(2, 2, 7);
        assert_eq!(
            position_at_buffer_point(Point::new(0, 0), camera, Point::new(8, 6), 32),
            None
        );
    }

    #[test]
    fn scaled_to_fit_keeps_aspect_ratio() {
        let bounds = Size::new(480, 352);
        assert_eq!(Size::new(960, 704).scaled_to_fit(bounds), bounds);
        assert_eq!(Size::new(1000, 352).scaled_to_fit(bounds), Size::new(480, 168));
        assert_eq!(Size::new(100, 352).scaled_to_fit(bounds), Size::new(100, 352));
        assert_eq!(Size::new(0, 352).scaled_to_fit(bounds), Size::default());
    }

    #[test]
    fn rect_cache_stretch_and_mapping() {
        let cache = DrawRectCache::new(Rect::new(10, 20, 960, 704), Rect::new(32, 32, 480, 352));
        assert_eq!(cache.horizontal_stretch, 2.0);
        assert_eq!(cache.vertical_stretch, 2.0);
        assert_eq!(cache.buffer_to_output(Point::new(32, 32)), Point::new(10, 20));
        assert_eq!(cache.buffer_to_output(Point::new(64, 48)), Point::new(74, 52));
    }
}
