use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{Point, Rect, Size};
use crate::world::{Direction, Position};

pub const MIN_VISIBLE_DIMENSION: i32 = 3;
const DRAW_MARGIN_TILES: i32 = 2;
const STANDING_SLOT: usize = 8;

/// Tile margins around the camera, in tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AwareRange {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl AwareRange {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The part of the range that is actually on screen.
    pub fn sight(&self) -> AwareRange {
        AwareRange::new(self.left - 1, self.top - 1, self.right - 2, self.bottom - 2)
    }

    /// Accepts `position` when its screen cell, projected onto the camera
    /// floor, lies inside this range around `camera`. The cell exactly on
    /// the right/bottom edge is only kept for tiles that overhang it.
    pub fn accepts(&self, camera: Position, position: Position, overhangs_edge: bool) -> bool {
        let dz = position.z as i32 - camera.z as i32;
        let dx = position.x as i32 + dz - camera.x as i32;
        let dy = position.y as i32 + dz - camera.y as i32;

        if -dx >= self.left || (dx == self.right && !overhangs_edge) {
            return false;
        }
        if -dy >= self.top || (dy == self.bottom && !overhangs_edge) {
            return false;
        }
        dx <= self.right && dy <= self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("visible dimension must be odd, got {width}x{height}")]
    EvenDimension { width: i32, height: i32 },
    #[error("visible dimension must be at least {min}x{min}, got {width}x{height}")]
    DimensionTooSmall { width: i32, height: i32, min: i32 },
    #[error("draw buffer {width}x{height} exceeds the maximum texture size {max}")]
    ExceedsMaxTextureSize { width: i32, height: i32, max: i32 },
}

pub fn validate_visible_dimension(visible: Size) -> Result<(), GeometryError> {
    if visible.width % 2 != 1 || visible.height % 2 != 1 {
        return Err(GeometryError::EvenDimension {
            width: visible.width,
            height: visible.height,
        });
    }
    if visible.width < MIN_VISIBLE_DIMENSION || visible.height < MIN_VISIBLE_DIMENSION {
        return Err(GeometryError::DimensionTooSmall {
            width: visible.width,
            height: visible.height,
            min: MIN_VISIBLE_DIMENSION,
        });
    }
    Ok(())
}

/// Everything derived from the requested visible dimension and zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewGeometry {
    visible_dimension: Size,
    draw_dimension: Size,
    tile_size: i32,
    scale_factor: f32,
    virtual_center_offset: Point,
    buffer_rect: Rect,
    aware_range: AwareRange,
    direction_viewports: [AwareRange; 9],
}

impl ViewGeometry {
    pub fn compute(
        visible_dimension: Size,
        scale_factor: f32,
        sprite_size: i32,
        max_texture_size: i32,
        world_range: AwareRange,
    ) -> Result<Self, GeometryError> {
        validate_visible_dimension(visible_dimension)?;

        let tile_size = (sprite_size as f32 * scale_factor) as i32;
        let buffer_side = |tiles: i32| {
            tiles
                .checked_add(DRAW_MARGIN_TILES)
                .and_then(|drawn| drawn.checked_mul(tile_size))
                .filter(|pixels| *pixels <= max_texture_size)
        };
        let (Some(buffer_width), Some(buffer_height)) = (
            buffer_side(visible_dimension.width),
            buffer_side(visible_dimension.height),
        ) else {
            // Sides past i32::MAX are reported saturated.
            let saturated =
                |tiles: i32| tiles.saturating_add(DRAW_MARGIN_TILES).saturating_mul(tile_size);
            return Err(GeometryError::ExceedsMaxTextureSize {
                width: saturated(visible_dimension.width),
                height: saturated(visible_dimension.height),
                max: max_texture_size,
            });
        };
        let draw_dimension = Size::new(
            visible_dimension.width + DRAW_MARGIN_TILES,
            visible_dimension.height + DRAW_MARGIN_TILES,
        );
        let buffer_size = Size::new(buffer_width, buffer_height);

        let left = world_range.left.min(draw_dimension.width / 2);
        let top = world_range.top.min(draw_dimension.height / 2);
        let aware_range = AwareRange::new(left, top, left + 1, top + 1);

        Ok(Self {
            visible_dimension,
            draw_dimension,
            tile_size,
            scale_factor,
            virtual_center_offset: Point::new(draw_dimension.width / 2, draw_dimension.height / 2),
            buffer_rect: Rect::from_origin(Point::default(), buffer_size),
            aware_range,
            direction_viewports: direction_viewports(aware_range),
        })
    }

    pub fn visible_dimension(&self) -> Size {
        self.visible_dimension
    }

    pub fn draw_dimension(&self) -> Size {
        self.draw_dimension
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn virtual_center_offset(&self) -> Point {
        self.virtual_center_offset
    }

    pub fn buffer_rect(&self) -> Rect {
        self.buffer_rect
    }

    pub fn aware_range(&self) -> AwareRange {
        self.aware_range
    }

    /// Per-direction viewport used for the edge test; `None` means the
    /// camera is standing still.
    pub fn viewport(&self, walking: Option<Direction>) -> AwareRange {
        self.direction_viewports[direction_slot(walking)]
    }

    /// Region of the draw buffer presented onto an output of `dest_size`.
    /// `scroll_offset` is the walk or pan offset, already zoomed.
    pub fn framebuffer_source(&self, dest_size: Size, scroll_offset: Point) -> Rect {
        let margin = Point::new(
            (self.draw_dimension.width - self.visible_dimension.width) / 2,
            (self.draw_dimension.height - self.visible_dimension.height) / 2,
        );
        let mut draw_offset = margin * self.tile_size + scroll_offset;

        let src_visible = self.visible_dimension * self.tile_size;
        let src_size = dest_size.scaled_to_fit(src_visible);
        draw_offset.x += (src_visible.width - src_size.width) / 2;
        draw_offset.y += (src_visible.height - src_size.height) / 2;

        Rect::from_origin(draw_offset, src_size)
    }
}

fn direction_slot(walking: Option<Direction>) -> usize {
    match walking {
        Some(direction) => direction as usize,
        None => STANDING_SLOT,
    }
}

fn direction_viewports(range: AwareRange) -> [AwareRange; 9] {
    let base = AwareRange::new(range.right, range.top, range.right, range.top);
    let mut viewports = [base; 9];
    for direction in Direction::ALL {
        let viewport = &mut viewports[direction_slot(Some(direction))];
        match direction {
            Direction::North | Direction::South => {
                viewport.top += 1;
                viewport.bottom += 1;
            }
            Direction::East | Direction::West => {
                viewport.left += 1;
                viewport.right += 1;
            }
            _ => {
                viewport.left += 1;
                viewport.top += 1;
                viewport.right += 1;
                viewport.bottom += 1;
            }
        }
    }
    let standing = &mut viewports[STANDING_SLOT];
    standing.left -= 1;
    standing.right -= 1;
    viewports
}
