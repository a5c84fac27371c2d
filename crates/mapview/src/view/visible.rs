use std::time::Duration;

use super::fade::FloorFades;
use super::floors::{first_visible_floor, last_visible_floor, FloorLayout, FloorMap, FloorViewMode};
use super::geometry::{Point, Size};
use super::viewport::{AwareRange, ViewGeometry};
use crate::world::{CreatureRef, MapStore, Position, TileRef};

/// Tiles of one floor, in draw order, split by what they contribute.
#[derive(Clone, Default)]
pub struct FloorBucket {
    pub grounds: Vec<TileRef>,
    pub surfaces: Vec<TileRef>,
    pub effects: Vec<TileRef>,
    pub shades: Vec<TileRef>,
}

impl FloorBucket {
    pub fn clear(&mut self) {
        self.grounds.clear();
        self.surfaces.clear();
        self.effects.clear();
        self.shades.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.grounds.is_empty()
            && self.surfaces.is_empty()
            && self.effects.is_empty()
            && self.shades.is_empty()
    }
}

/// Cells of a `dimension` grid, one anti-diagonal at a time starting at the
/// top-left corner; inside a diagonal `x` grows and `y` shrinks. Anything
/// drawn later in this order overlaps what came before.
pub fn diagonal_cells(dimension: Size) -> impl Iterator<Item = Point> {
    let width = dimension.width.max(0);
    let height = dimension.height.max(0);
    let diagonals = (width + height - 1).max(0);
    (0..diagonals).flat_map(move |diagonal| {
        let advance = (diagonal - (height - 1)).max(0);
        (0..)
            .map(move |step| Point::new(advance + step, diagonal - advance - step))
            .take_while(move |cell| cell.y >= 0 && cell.x < width)
    })
}

pub(crate) struct RebuildParams<'a> {
    pub map: &'a dyn MapStore,
    pub camera: Position,
    pub geometry: &'a ViewGeometry,
    pub mode: FloorViewMode,
    pub layout: &'a FloorLayout,
    pub locked_floor: Option<u8>,
    pub fading: bool,
    pub collect_creatures: bool,
    pub collect_shades: bool,
    pub effects_on_top: bool,
    pub now: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub first_visible: u8,
    pub last_visible: u8,
    pub scan_first: u8,
    pub tiles: usize,
    pub creatures: usize,
    /// At least one floor went from hidden to visible.
    pub floors_revealed: bool,
}

/// Per-floor visible tiles plus the creatures worth drawing overlays for.
#[derive(Default)]
pub struct VisibleTiles {
    buckets: FloorMap<FloorBucket>,
    creatures: Vec<CreatureRef>,
    first_visible: u8,
    last_visible: u8,
    floor_min: u8,
    floor_max: u8,
    last_camera: Option<Position>,
}

impl VisibleTiles {
    pub fn bucket(&self, z: u8) -> Option<&FloorBucket> {
        self.buckets.get(z)
    }

    pub fn creatures(&self) -> &[CreatureRef] {
        &self.creatures
    }

    pub fn first_visible(&self) -> u8 {
        self.first_visible
    }

    pub fn last_visible(&self) -> u8 {
        self.last_visible
    }

    /// Lowest and highest floor that received tiles in the last rebuild.
    pub fn populated_range(&self) -> (u8, u8) {
        (self.floor_min, self.floor_max)
    }

    pub fn last_camera(&self) -> Option<Position> {
        self.last_camera
    }

    /// Forces the next rebuild to recompute floors and restart fades.
    pub fn forget_camera(&mut self) {
        self.last_camera = None;
    }

    pub fn clear(&mut self) {
        for (_, bucket) in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.creatures.clear();
    }

    pub(crate) fn rebuild(&mut self, params: RebuildParams<'_>, fades: &mut FloorFades) -> RebuildSummary {
        let camera = params.camera;
        for z in self.floor_min..=self.floor_max {
            self.buckets[z].clear();
        }
        if params.collect_creatures {
            self.creatures.clear();
        }

        let previous_first = self.first_visible;
        let camera_changed = self.last_camera != Some(camera);
        if camera_changed {
            let first = first_visible_floor(
                params.map,
                Some(camera),
                params.layout,
                params.locked_floor,
                params.mode != FloorViewMode::Always,
            );
            let last = last_visible_floor(Some(camera), params.layout, params.locked_floor);
            debug_assert!(first <= last || params.locked_floor.is_some());
            self.first_visible = first;
            self.last_visible = last.max(first);
        }
        self.floor_min = camera.z;
        self.floor_max = camera.z;

        let mut scan_first = self.first_visible;
        if params.mode == FloorViewMode::AlwaysWithTransparency || params.fading {
            scan_first = first_visible_floor(
                params.map,
                Some(camera),
                params.layout,
                params.locked_floor,
                false,
            );
        }

        let mut floors_revealed = false;
        let jumped = match self.last_camera {
            None => true,
            Some(last) => last.z != camera.z || last.distance(&camera) >= 3.0,
        };
        if jumped {
            fades.finish_range(scan_first, self.last_visible, params.now);
        } else if previous_first < self.first_visible {
            for z in previous_first..self.first_visible {
                fades.mirror(z, params.now);
            }
        } else if previous_first > self.first_visible {
            floors_revealed = true;
            for z in self.first_visible..previous_first {
                fades.mirror(z, params.now);
            }
        }
        self.last_camera = Some(camera);

        let sight = params.geometry.aware_range().sight();
        let mut tiles = 0;
        for z in (scan_first..=self.last_visible).rev() {
            tiles += self.collect_floor(&params, z, sight);
        }

        RebuildSummary {
            first_visible: self.first_visible,
            last_visible: self.last_visible,
            scan_first,
            tiles,
            creatures: self.creatures.len(),
            floors_revealed,
        }
    }

    fn collect_floor(&mut self, params: &RebuildParams<'_>, z: u8, sight: AwareRange) -> usize {
        let camera = params.camera;
        let center = params.geometry.virtual_center_offset();
        let floor_shift = camera.z as i32 - z as i32;
        let mut collected = 0;

        for cell in diagonal_cells(params.geometry.draw_dimension()) {
            let Some(screen_cell) = camera.translated(cell.x - center.x, cell.y - center.y, 0) else {
                continue;
            };
            let Some(tile_position) = screen_cell.covered_up(floor_shift) else {
                continue;
            };
            let Some(tile) = params.map.tile(tile_position) else {
                continue;
            };
            if !tile.is_drawable() {
                continue;
            }

            if params.collect_creatures
                && camera.is_in_range_ex(
                    &screen_cell,
                    sight.left,
                    sight.right,
                    sight.top,
                    sight.bottom,
                    true,
                )
            {
                self.creatures.extend(tile.creatures().into_iter().rev());
            }

            let bucket = &mut self.buckets[z];
            if params.collect_shades && tile.can_shade() {
                bucket.shades.push(tile.clone());
            }
            if tile.has_ground() {
                bucket.grounds.push(tile.clone());
            }
            if tile.has_surface() {
                bucket.surfaces.push(tile.clone());
            }
            if params.effects_on_top && tile.has_effect() {
                bucket.effects.push(tile);
            }

            collected += 1;
            if z < self.floor_min {
                self.floor_min = z;
            } else if z > self.floor_max {
                self.floor_max = z;
            }
        }
        collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Color;
    use crate::world::grid::{GridCreature, GridMap};
    use crate::world::MAX_Z;
    use std::rc::Rc;

    fn pos(x: u16, y: u16, z: u8) -> Position {
        Position::new(x, y, z).expect("valid position")
    }

    fn geometry() -> ViewGeometry {
        ViewGeometry::compute(Size::new(15, 11), 1.0, 32, 4096, AwareRange::new(8, 6, 9, 7))
            .expect("valid geometry")
    }

    fn params<'a>(
        map: &'a GridMap,
        geometry: &'a ViewGeometry,
        layout: &'a FloorLayout,
        camera: Position,
    ) -> RebuildParams<'a> {
        RebuildParams {
            map,
            camera,
            geometry,
            mode: FloorViewMode::Normal,
            layout,
            locked_floor: None,
            fading: false,
            collect_creatures: true,
            collect_shades: false,
            effects_on_top: true,
            now: Duration::ZERO,
        }
    }

    #[test]
    fn diagonal_order_matches_brute_force() {
        for (width, height) in [(1, 1), (3, 5), (17, 13), (6, 2)] {
            let walked: Vec<Point> = diagonal_cells(Size::new(width, height)).collect();
            let mut expected = Vec::new();
            for x in 0..width {
                for y in 0..height {
                    expected.push(Point::new(x, y));
                }
            }
            expected.sort_by_key(|cell| (cell.x + cell.y, cell.x));
            assert_eq!(walked, expected, "{width}x{height}");
        }
    }

    #[test]
    fn empty_dimension_yields_no_cells() {
        assert_eq!(diagonal_cells(Size::new(0, 4)).count(), 0);
    }

    #[test]
    fn rebuild_fills_buckets_in_diagonal_order_and_only_in_range() {
        let map = GridMap::new();
        let camera = pos(100, 100, 7);
        for dx in -3..=3 {
            for dy in -3..=3 {
                let ground = camera.translated(dx, dy, 0).expect("in bounds");
                map.set_ground(ground, Color::rgb(10, 120, 10));
            }
        }
        map.set_ground(pos(100, 100, 12), Color::WHITE);

        let geometry = geometry();
        let layout = FloorLayout::default();
        let mut visible = VisibleTiles::default();
        let mut fades = FloorFades::new(Duration::ZERO);
        let summary = visible.rebuild(params(&map, &geometry, &layout, camera), &mut fades);

        assert_eq!(summary.first_visible, 0);
        assert_eq!(summary.last_visible, 7);
        assert_eq!(summary.tiles, 49);

        let grounds = &visible.bucket(7).expect("floor 7").grounds;
        let keys: Vec<(i32, u16)> = grounds
            .iter()
            .map(|tile| {
                let p = tile.position();
                (p.x as i32 + p.y as i32, p.x)
            })
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        for z in 0..=MAX_Z {
            if z != 7 {
                assert!(visible.bucket(z).expect("floor").is_empty(), "floor {z}");
            }
        }
    }

    #[test]
    fn upper_floor_tiles_are_picked_up_through_the_covered_transform() {
        let map = GridMap::new();
        let camera = pos(100, 100, 7);
        map.set_ground(camera, Color::WHITE);
        // Drawn over the camera cell, one floor up.
        map.add_effect(pos(101, 101, 6), Color::WHITE);

        let geometry = geometry();
        let layout = FloorLayout::default();
        let mut visible = VisibleTiles::default();
        let mut fades = FloorFades::new(Duration::ZERO);
        visible.rebuild(params(&map, &geometry, &layout, camera), &mut fades);

        let effects = &visible.bucket(6).expect("floor 6").effects;
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].position(), pos(101, 101, 6));
        assert_eq!(visible.populated_range(), (6, 7));
    }

    #[test]
    fn creatures_are_collected_in_reverse_tile_order() {
        let map = GridMap::new();
        let camera = pos(100, 100, 7);
        map.set_ground(camera, Color::WHITE);
        let first = GridCreature::new(1, "first", camera);
        let second = GridCreature::new(2, "second", camera);
        map.add_creature(first.clone());
        map.add_creature(second.clone());
        // Out of sight: 8 tiles west is outside the visible 15 columns.
        map.set_ground(pos(92, 100, 7), Color::WHITE);
        map.add_creature(GridCreature::new(3, "far", pos(92, 100, 7)));

        let geometry = geometry();
        let layout = FloorLayout::default();
        let mut visible = VisibleTiles::default();
        let mut fades = FloorFades::new(Duration::ZERO);
        let summary = visible.rebuild(params(&map, &geometry, &layout, camera), &mut fades);

        assert_eq!(summary.creatures, 2);
        let order: Vec<*const ()> = visible
            .creatures()
            .iter()
            .map(|creature| Rc::as_ptr(creature) as *const ())
            .collect();
        assert_eq!(
            order,
            vec![
                Rc::as_ptr(&second) as *const (),
                Rc::as_ptr(&first) as *const ()
            ]
        );
    }

    #[test]
    fn rebuild_without_camera_change_reuses_floor_bounds() {
        let map = GridMap::new();
        let camera = pos(100, 100, 7);
        map.set_ground(camera, Color::WHITE);
        let geometry = geometry();
        let layout = FloorLayout::default();
        let mut visible = VisibleTiles::default();
        let mut fades = FloorFades::new(Duration::ZERO);
        visible.rebuild(params(&map, &geometry, &layout, camera), &mut fades);
        assert_eq!(visible.first_visible(), 0);

        // A roof appearing does not change bounds until the camera moves.
        map.set_ground(pos(100, 100, 6), Color::WHITE);
        visible.rebuild(params(&map, &geometry, &layout, camera), &mut fades);
        assert_eq!(visible.first_visible(), 0);

        visible.forget_camera();
        visible.rebuild(params(&map, &geometry, &layout, camera), &mut fades);
        assert_eq!(visible.first_visible(), 7);
    }

    #[test]
    fn revealing_floors_mirrors_their_fades() {
        let map = GridMap::new();
        let camera = pos(100, 100, 7);
        map.set_ground(pos(100, 100, 6), Color::WHITE);
        let geometry = geometry();
        let layout = FloorLayout::default();
        let mut visible = VisibleTiles::default();
        let mut fades = FloorFades::new(Duration::from_millis(500));

        let mut first_pass = params(&map, &geometry, &layout, camera);
        first_pass.fading = true;
        first_pass.mode = FloorViewMode::Fade;
        let summary = visible.rebuild(first_pass, &mut fades);
        assert_eq!(summary.first_visible, 7);
        assert_eq!(summary.scan_first, 0);
        assert_eq!(fades.level(5, 7, Duration::ZERO), 0.0);

        // Two steps east: the roof is out of every scanned column.
        let moved = pos(102, 100, 7);
        let mut second_pass = params(&map, &geometry, &layout, moved);
        second_pass.fading = true;
        second_pass.mode = FloorViewMode::Fade;
        second_pass.now = Duration::from_millis(1_000);
        let summary = visible.rebuild(second_pass, &mut fades);
        assert!(summary.floors_revealed);
        assert_eq!(summary.first_visible, 0);
        assert_eq!(fades.level(5, 0, Duration::from_millis(1_000)), 0.0);
        assert_eq!(fades.level(5, 0, Duration::from_millis(1_500)), 1.0);
    }
}
