use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::{MapStore, Position, MAX_Z};

pub const FLOOR_COUNT: usize = MAX_Z as usize + 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorViewMode {
    #[default]
    Normal,
    /// Floors hidden or revealed by occlusion cross-fade over time.
    Fade,
    /// The first visible floor is pinned to the camera floor.
    Locked,
    /// Occlusion is ignored; every floor above is drawn.
    Always,
    /// Like `Always`, but floors that would be hidden are drawn translucent.
    AlwaysWithTransparency,
}

/// Where the surface ends and how far underground the view reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorLayout {
    pub sea_floor: u8,
    pub underground_floor: u8,
    pub aware_underground_range: u8,
}

impl Default for FloorLayout {
    fn default() -> Self {
        Self {
            sea_floor: 7,
            underground_floor: 8,
            aware_underground_range: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FloorLayoutError {
    #[error("sea floor {sea_floor} must be above the deepest floor {max}")]
    SeaFloorOutOfRange { sea_floor: u8, max: u8 },
    #[error("underground floor {underground_floor} must lie below sea floor {sea_floor} and within {max}")]
    UndergroundFloorOutOfRange {
        underground_floor: u8,
        sea_floor: u8,
        max: u8,
    },
    #[error("aware underground range {range} exceeds the floor count")]
    RangeTooLarge { range: u8 },
}

impl FloorLayout {
    pub fn validate(&self) -> Result<(), FloorLayoutError> {
        if self.sea_floor >= MAX_Z {
            return Err(FloorLayoutError::SeaFloorOutOfRange {
                sea_floor: self.sea_floor,
                max: MAX_Z,
            });
        }
        if self.underground_floor <= self.sea_floor || self.underground_floor > MAX_Z {
            return Err(FloorLayoutError::UndergroundFloorOutOfRange {
                underground_floor: self.underground_floor,
                sea_floor: self.sea_floor,
                max: MAX_Z,
            });
        }
        if self.aware_underground_range > MAX_Z {
            return Err(FloorLayoutError::RangeTooLarge {
                range: self.aware_underground_range,
            });
        }
        Ok(())
    }

    pub fn is_underground(&self, z: u8) -> bool {
        z > self.sea_floor
    }
}

/// One slot per floor in `0..=MAX_Z`.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorMap<T> {
    floors: [T; FLOOR_COUNT],
}

impl<T: Default> Default for FloorMap<T> {
    fn default() -> Self {
        Self {
            floors: std::array::from_fn(|_| T::default()),
        }
    }
}

impl<T> FloorMap<T> {
    pub fn get(&self, z: u8) -> Option<&T> {
        self.floors.get(z as usize)
    }

    pub fn get_mut(&mut self, z: u8) -> Option<&mut T> {
        self.floors.get_mut(z as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &T)> {
        self.floors.iter().enumerate().map(|(z, value)| (z as u8, value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u8, &mut T)> {
        self.floors
            .iter_mut()
            .enumerate()
            .map(|(z, value)| (z as u8, value))
    }
}

impl<T> Index<u8> for FloorMap<T> {
    type Output = T;

    fn index(&self, z: u8) -> &T {
        debug_assert!(z <= MAX_Z, "floor {z} out of range");
        &self.floors[(z as usize).min(FLOOR_COUNT - 1)]
    }
}

impl<T> IndexMut<u8> for FloorMap<T> {
    fn index_mut(&mut self, z: u8) -> &mut T {
        debug_assert!(z <= MAX_Z, "floor {z} out of range");
        &mut self.floors[(z as usize).min(FLOOR_COUNT - 1)]
    }
}

/// Topmost floor that is drawn. Tiles above the camera (straight up, or
/// covering it along the screen diagonal) stop the view at the floor below
/// them. Only the camera cell and the four axis neighbours that sight passes
/// through are scanned.
pub fn first_visible_floor(
    map: &dyn MapStore,
    camera: Option<Position>,
    layout: &FloorLayout,
    locked: Option<u8>,
    check_occlusion: bool,
) -> u8 {
    if let Some(locked) = locked {
        return locked.min(MAX_Z);
    }
    let Some(camera) = camera else {
        return layout.sea_floor.min(MAX_Z);
    };

    let mut first = 0;
    if layout.is_underground(camera.z) {
        first = camera
            .z
            .saturating_sub(layout.aware_underground_range)
            .max(layout.underground_floor);
    }

    if check_occlusion {
        'scan: for ix in -1..=1_i32 {
            for iy in -1..=1_i32 {
                if first >= camera.z {
                    break 'scan;
                }
                let Some(pos) = camera.translated(ix, iy, 0) else {
                    continue;
                };
                let center = ix == 0 && iy == 0;
                let look_possible = map.is_look_possible(pos);
                if !center && (ix.abs() == iy.abs() || !look_possible) {
                    continue;
                }
                if let Some(limit) = occluding_floor(map, pos, first, look_possible) {
                    first = limit;
                }
            }
        }
    }

    first.min(MAX_Z)
}

fn occluding_floor(map: &dyn MapStore, origin: Position, first: u8, look_possible: bool) -> Option<u8> {
    let mut covered = origin;
    let mut upper = origin;
    loop {
        covered = covered.covered_up(1)?;
        upper = upper.up(1)?;
        if upper.z < first {
            return None;
        }

        if let Some(tile) = map.tile(upper) {
            if tile.limits_floors_view(!look_possible) {
                return Some(upper.z + 1);
            }
        }
        if let Some(tile) = map.tile(covered) {
            if tile.limits_floors_view(look_possible) {
                return Some(covered.z + 1);
            }
        }
    }
}

/// Deepest floor that is drawn.
pub fn last_visible_floor(camera: Option<Position>, layout: &FloorLayout, locked: Option<u8>) -> u8 {
    let mut last = match camera {
        Some(camera) if layout.is_underground(camera.z) => {
            camera.z.saturating_add(layout.aware_underground_range)
        }
        _ => layout.sea_floor,
    };
    if let Some(locked) = locked {
        last = last.max(locked);
    }
    last.min(MAX_Z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Color;
    use crate::world::grid::{GridItem, GridMap};

    fn pos(x: u16, y: u16, z: u8) -> Position {
        Position::new(x, y, z).expect("valid position")
    }

    #[test]
    fn unknown_camera_resolves_to_sea_floor() {
        let map = GridMap::new();
        let layout = FloorLayout::default();
        assert_eq!(first_visible_floor(&map, None, &layout, None, true), 7);
        assert_eq!(last_visible_floor(None, &layout, None), 7);
    }

    #[test]
    fn open_sky_shows_every_floor_above() {
        let map = GridMap::new();
        let layout = FloorLayout::default();
        let camera = Some(pos(100, 100, 7));
        assert_eq!(first_visible_floor(&map, camera, &layout, None, true), 0);
        assert_eq!(last_visible_floor(camera, &layout, None), 7);
    }

    #[test]
    fn underground_bounds_follow_the_aware_range() {
        let map = GridMap::new();
        let layout = FloorLayout::default();
        assert_eq!(
            first_visible_floor(&map, Some(pos(100, 100, 9)), &layout, None, true),
            8
        );
        assert_eq!(
            first_visible_floor(&map, Some(pos(100, 100, 12)), &layout, None, true),
            10
        );
        assert_eq!(last_visible_floor(Some(pos(100, 100, 12)), &layout, None), 14);
        assert_eq!(last_visible_floor(Some(pos(100, 100, 15)), &layout, None), MAX_Z);
    }

    #[test]
    fn roof_straight_above_limits_view() {
        let map = GridMap::new();
        map.set_ground(pos(100, 100, 5), Color::WHITE);
        let first = first_visible_floor(
            &map,
            Some(pos(100, 100, 7)),
            &FloorLayout::default(),
            None,
            true,
        );
        assert_eq!(first, 6);
    }

    #[test]
    fn covering_tile_on_the_diagonal_limits_view() {
        let map = GridMap::new();
        map.set_ground(pos(102, 102, 5), Color::WHITE);
        let first = first_visible_floor(
            &map,
            Some(pos(100, 100, 7)),
            &FloorLayout::default(),
            None,
            true,
        );
        assert_eq!(first, 6);
    }

    #[test]
    fn diagonal_neighbours_are_never_scanned() {
        let map = GridMap::new();
        map.set_ground(pos(99, 99, 6), Color::WHITE);
        let first = first_visible_floor(
            &map,
            Some(pos(100, 100, 7)),
            &FloorLayout::default(),
            None,
            true,
        );
        assert_eq!(first, 0);
    }

    #[test]
    fn axis_neighbour_blocked_for_sight_is_skipped() {
        let camera = Some(pos(100, 100, 7));
        let layout = FloorLayout::default();

        let open = GridMap::new();
        open.set_ground(pos(101, 100, 5), Color::WHITE);
        assert_eq!(first_visible_floor(&open, camera, &layout, None, true), 6);

        let walled = GridMap::new();
        walled.add_item(pos(101, 100, 7), GridItem::wall(Color::WHITE));
        walled.set_ground(pos(101, 100, 5), Color::WHITE);
        assert_eq!(first_visible_floor(&walled, camera, &layout, None, true), 0);
    }

    #[test]
    fn occlusion_check_can_be_disabled() {
        let map = GridMap::new();
        map.set_ground(pos(100, 100, 6), Color::WHITE);
        let first = first_visible_floor(
            &map,
            Some(pos(100, 100, 7)),
            &FloorLayout::default(),
            None,
            false,
        );
        assert_eq!(first, 0);
    }

    #[test]
    fn lock_overrides_scan_and_deepens_last() {
        let map = GridMap::new();
        map.set_ground(pos(100, 100, 6), Color::WHITE);
        let camera = Some(pos(100, 100, 7));
        let layout = FloorLayout::default();
        assert_eq!(first_visible_floor(&map, camera, &layout, Some(3), true), 3);
        assert_eq!(last_visible_floor(camera, &layout, Some(3)), 7);
        assert_eq!(last_visible_floor(camera, &layout, Some(11)), 11);
    }

    #[test]
    fn shallow_layout_puts_floor_seven_underground() {
        let map = GridMap::new();
        let layout = FloorLayout {
            sea_floor: 4,
            underground_floor: 5,
            aware_underground_range: 2,
        };
        let camera = Some(pos(100, 100, 7));
        assert_eq!(first_visible_floor(&map, camera, &layout, None, true), 5);
        assert_eq!(last_visible_floor(camera, &layout, None), 9);
    }

    #[test]
    fn layout_validation_rejects_inverted_floors() {
        assert!(FloorLayout::default().validate().is_ok());
        let inverted = FloorLayout {
            sea_floor: 8,
            underground_floor: 7,
            aware_underground_range: 2,
        };
        assert!(matches!(
            inverted.validate(),
            Err(FloorLayoutError::UndergroundFloorOutOfRange { .. })
        ));
        let too_deep = FloorLayout {
            sea_floor: MAX_Z,
            ..FloorLayout::default()
        };
        assert!(matches!(
            too_deep.validate(),
            Err(FloorLayoutError::SeaFloorOutOfRange { .. })
        ));
    }

    #[test]
    fn floor_map_is_bounds_checked() {
        let mut floors: FloorMap<u32> = FloorMap::default();
        floors[3] = 9;
        assert_eq!(floors.get(3), Some(&9));
        assert_eq!(floors.get(MAX_Z + 1), None);
        assert_eq!(floors.iter().filter(|(_, value)| **value != 0).count(), 1);
    }
}
