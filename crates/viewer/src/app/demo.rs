//! A small surface town: a field, a house with a roof, a couple of
//! creatures and one of them walking in and out of the house.

use std::rc::Rc;

use mapview::{
    Color, Direction, DrawBackend, GridCreature, GridItem, GridMap, GridMissile, GridText,
    MapCreature, MapView, Point, Position, DEFAULT_SPRITE_SIZE,
};
use tracing::debug;

use super::ViewerError;

const GRASS: Color = Color::rgb(52, 120, 44);
const PATH: Color = Color::rgb(150, 128, 90);
const PLANKS: Color = Color::rgb(120, 84, 50);
const ROOF: Color = Color::rgb(140, 52, 40);
const STONE: Color = Color::rgb(110, 110, 118);
const GLASS: Color = Color::rgb(150, 200, 230);
const LEAVES: Color = Color::rgb(30, 90, 30);
const FLOWERS: Color = Color::rgb(220, 200, 60);
const SPARK: Color = Color::rgb(255, 230, 120);
const ARROW: Color = Color::rgb(230, 230, 230);

const SURFACE: i32 = 7;
const HOUSE_X: (i32, i32) = (104, 108);
const HOUSE_Y: (i32, i32) = (96, 100);
const DOOR: (i32, i32) = (104, 98);
const SPARK_AT: (i32, i32) = (101, 102);
/// The arrow flies east along this row and starts over past its end.
const ARROW_ROW: i32 = 101;
const ARROW_SPAN: (i32, i32) = (92, 103);
/// Pixels the walker advances per frame.
const STEP_PIXELS: i32 = 4;

pub(crate) struct DemoWorld {
    pub(crate) map: Rc<GridMap>,
    pub(crate) walker: Rc<GridCreature>,
    route: Vec<Direction>,
    leg: usize,
    direction: Direction,
    remaining: i32,
    arrow_x: i32,
}

fn at(x: i32, y: i32, z: i32) -> Result<Position, ViewerError> {
    Position::from_coords(x, y, z).ok_or(ViewerError::OffMap { x, y, z })
}

fn area(
    (x0, x1): (i32, i32),
    (y0, y1): (i32, i32),
    z: i32,
) -> impl Iterator<Item = Position> {
    (x0..=x1)
        .flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
        .filter_map(move |(x, y)| Position::from_coords(x, y, z))
}

impl DemoWorld {
    pub(crate) fn build() -> Result<Self, ViewerError> {
        let map = Rc::new(GridMap::new());

        for position in area((86, 114), (88, 112), SURFACE) {
            map.set_ground(position, GRASS);
        }
        for position in area((90, HOUSE_X.0 - 1), (DOOR.1, DOOR.1), SURFACE) {
            map.set_ground(position, PATH);
        }

        for position in area(HOUSE_X, HOUSE_Y, SURFACE) {
            map.set_ground(position, PLANKS);
            let on_edge = position.x as i32 == HOUSE_X.0
                || position.x as i32 == HOUSE_X.1
                || position.y as i32 == HOUSE_Y.0
                || position.y as i32 == HOUSE_Y.1;
            if !on_edge || (position.x as i32, position.y as i32) == DOOR {
                continue;
            }
            let item = if position.y as i32 == HOUSE_Y.1 && position.x as i32 % 2 == 0 {
                GridItem::window(GLASS)
            } else {
                GridItem::wall(STONE)
            };
            map.add_item(position, item);
        }
        for position in area(HOUSE_X, HOUSE_Y, SURFACE - 1) {
            map.set_ground(position, ROOF);
        }

        map.add_item(at(96, 94, SURFACE)?, GridItem::tall(LEAVES));
        map.add_item(at(99, 101, SURFACE)?, GridItem::decoration(FLOWERS));
        map.add_effect(at(SPARK_AT.0, SPARK_AT.1, SURFACE)?, SPARK);
        map.add_missile(GridMissile::new(at(ARROW_SPAN.0, ARROW_ROW, SURFACE)?, ARROW));

        map.add_static_text(GridText::new(at(106, 95, SURFACE)?, "shop", Color::WHITE));
        map.add_animated_text(GridText::new(
            at(102, 101, SURFACE)?,
            "+12",
            Color::rgb(120, 220, 120),
        ));

        let guard = GridCreature::new(2, "guard", at(102, 101, SURFACE)?);
        guard.set_color(Color::rgb(60, 60, 200));
        map.add_creature(guard);

        let walker = GridCreature::new(1, "walker", at(98, DOOR.1, SURFACE)?);
        map.add_creature(walker.clone());

        let mut route = vec![Direction::East; 8];
        route.extend(std::iter::repeat(Direction::West).take(8));

        debug!(tiles = map.tile_count(), "demo_world_built");
        Ok(Self {
            map,
            walker,
            route,
            leg: 0,
            direction: Direction::East,
            remaining: 0,
            arrow_x: ARROW_SPAN.0,
        })
    }

    /// Steps the walker by one frame, notifying `view` of tile changes.
    pub(crate) fn advance<B: DrawBackend>(&mut self, view: &mut MapView<B>) {
        if self.remaining == 0 {
            self.start_step(view);
        } else {
            self.remaining = (self.remaining - STEP_PIXELS).max(0);
            let (dx, dy) = self.direction.offset();
            self.walker
                .set_walk_offset(Point::new(-dx * self.remaining, -dy * self.remaining));
            if self.remaining == 0 {
                self.walker.stop_walk();
            }
        }
        view.on_camera_move();
    }

    fn start_step<B: DrawBackend>(&mut self, view: &mut MapView<B>) {
        if self.route.is_empty() {
            return;
        }
        let direction = self.route[self.leg % self.route.len()];
        self.leg += 1;
        self.fly_arrow();
        self.flicker_spark(view);

        let from = MapCreature::position(self.walker.as_ref());
        let Some(to) = from.translated_to_direction(direction) else {
            return;
        };
        self.map.move_creature(&self.walker, to);
        let (dx, dy) = direction.offset();
        self.direction = direction;
        self.remaining = DEFAULT_SPRITE_SIZE;
        self.walker.start_walk(
            direction,
            Point::new(-dx * DEFAULT_SPRITE_SIZE, -dy * DEFAULT_SPRITE_SIZE),
        );
        view.on_tile_update(from, true);
        view.on_tile_update(to, true);
    }

    fn fly_arrow(&mut self) {
        self.arrow_x = if self.arrow_x >= ARROW_SPAN.1 {
            ARROW_SPAN.0
        } else {
            self.arrow_x + 1
        };
        self.map.clear_missiles();
        if let Some(position) = Position::from_coords(self.arrow_x, ARROW_ROW, SURFACE) {
            self.map.add_missile(GridMissile::new(position, ARROW));
        }
    }

    /// The spark shows on odd legs only.
    fn flicker_spark<B: DrawBackend>(&self, view: &mut MapView<B>) {
        let Some(position) = Position::from_coords(SPARK_AT.0, SPARK_AT.1, SURFACE) else {
            return;
        };
        self.map.clear_effects(position);
        if self.leg % 2 == 1 {
            self.map.add_effect(position, SPARK);
        }
        view.on_tile_update(position, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapview::MapStore;

    #[test]
    fn house_has_a_roof_and_an_open_door() {
        let world = DemoWorld::build().expect("demo world");
        let door = world
            .map
            .tile_at(at(DOOR.0, DOOR.1, SURFACE).expect("door"))
            .expect("door tile");
        assert!(door.items().is_empty());
        let corner = world
            .map
            .tile_at(at(HOUSE_X.0, HOUSE_Y.0, SURFACE).expect("corner"))
            .expect("corner tile");
        assert_eq!(corner.items(), vec![GridItem::wall(STONE)]);
        assert!(world
            .map
            .tile_at(at(106, 98, SURFACE - 1).expect("roof"))
            .is_some());
    }

    #[test]
    fn arrow_wraps_back_to_the_start_of_its_row() {
        let mut world = DemoWorld::build().expect("demo world");
        for _ in ARROW_SPAN.0..ARROW_SPAN.1 {
            world.fly_arrow();
        }
        assert_eq!(world.arrow_x, ARROW_SPAN.1);
        world.fly_arrow();
        assert_eq!(world.arrow_x, ARROW_SPAN.0);
        assert_eq!(world.map.floor_missiles(SURFACE as u8).len(), 1);
    }

    #[test]
    fn route_returns_the_walker_home() {
        let world = DemoWorld::build().expect("demo world");
        let (dx, dy) = world.route.iter().fold((0, 0), |(x, y), direction| {
            let (dx, dy) = direction.offset();
            (x + dx, y + dy)
        });
        assert_eq!((dx, dy), (0, 0));
    }
}
