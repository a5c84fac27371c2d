//! In-memory tile store with flat-colored things. Drives the demo viewer and
//! the view's tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::{
    CameraTarget, CreatureInfo, CreatureRef, Direction, MapCreature, MapMissile, MapStore, MapText,
    MapTile, MissileRef, Position, TextRef, TileDraw, TileRef,
};
use crate::backend::{Color, DrawBackend, Light};
use crate::config::DEFAULT_SPRITE_SIZE;
use crate::view::{AwareRange, Point, Rect};

pub const DEFAULT_AWARE_RANGE: AwareRange = AwareRange::new(8, 6, 9, 7);

const HEALTH_BAR_WIDTH: i32 = 27;
const HEALTH_BAR_HEIGHT: i32 = 4;
const GRAY: Color = Color::rgb(128, 128, 128);
const HEALTHY: Color = Color::rgb(0, 188, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridItem {
    pub color: Color,
    /// Walls, windows and other things drawn below creatures.
    pub on_bottom: bool,
    pub blocks_projectile: bool,
    /// Sprite reaches past the tile into the right/bottom neighbour.
    pub overhangs: bool,
}

impl GridItem {
    pub fn wall(color: Color) -> Self {
        Self {
            color,
            on_bottom: true,
            blocks_projectile: true,
            overhangs: false,
        }
    }

    pub fn window(color: Color) -> Self {
        Self {
            color,
            on_bottom: true,
            blocks_projectile: false,
            overhangs: false,
        }
    }

    pub fn decoration(color: Color) -> Self {
        Self {
            color,
            on_bottom: false,
            blocks_projectile: false,
            overhangs: false,
        }
    }

    pub fn tall(color: Color) -> Self {
        Self {
            overhangs: true,
            ..Self::decoration(color)
        }
    }
}

pub struct GridTile {
    position: Position,
    ground: Cell<Option<Color>>,
    items: RefCell<Vec<GridItem>>,
    effects: RefCell<Vec<Color>>,
    creatures: RefCell<Vec<Rc<GridCreature>>>,
    selection: Cell<Option<bool>>,
}

impl GridTile {
    fn new(position: Position) -> Self {
        Self {
            position,
            ground: Cell::new(None),
            items: RefCell::new(Vec::new()),
            effects: RefCell::new(Vec::new()),
            creatures: RefCell::new(Vec::new()),
            selection: Cell::new(None),
        }
    }

    pub fn ground(&self) -> Option<Color> {
        self.ground.get()
    }

    pub fn items(&self) -> Vec<GridItem> {
        self.items.borrow().clone()
    }

    /// `Some(top_only)` while highlighted.
    pub fn selection(&self) -> Option<bool> {
        self.selection.get()
    }

    pub fn is_look_possible(&self) -> bool {
        !self.items.borrow().iter().any(|item| item.blocks_projectile)
    }

    fn is_empty(&self) -> bool {
        self.ground.get().is_none()
            && self.items.borrow().is_empty()
            && self.effects.borrow().is_empty()
            && self.creatures.borrow().is_empty()
    }
}

fn tile_pixels(scale: f32) -> i32 {
    (DEFAULT_SPRITE_SIZE as f32 * scale) as i32
}

fn inset(dest: Point, size: i32, margin: i32) -> Rect {
    Rect::new(dest.x + margin, dest.y + margin, size - 2 * margin, size - 2 * margin)
}

impl MapTile for GridTile {
    fn position(&self) -> Position {
        self.position
    }

    fn is_drawable(&self) -> bool {
        !self.is_empty()
    }

    fn has_ground(&self) -> bool {
        self.ground.get().is_some()
    }

    fn has_surface(&self) -> bool {
        !self.items.borrow().is_empty() || !self.creatures.borrow().is_empty()
    }

    fn has_effect(&self) -> bool {
        !self.effects.borrow().is_empty()
    }

    fn can_shade(&self) -> bool {
        self.ground.get().is_some()
    }

    fn is_clickable(&self) -> bool {
        self.ground.get().is_some() || self.has_surface()
    }

    fn limits_floors_view(&self, is_free_view: bool) -> bool {
        if self.ground.get().is_some() {
            return true;
        }
        match self.items.borrow().first() {
            Some(item) if is_free_view => item.on_bottom,
            Some(item) => item.on_bottom && item.blocks_projectile,
            None => false,
        }
    }

    fn overhangs_viewport_edge(&self) -> bool {
        self.items.borrow().iter().any(|item| item.overhangs)
    }

    fn creatures(&self) -> Vec<CreatureRef> {
        self.creatures
            .borrow()
            .iter()
            .map(|creature| creature.clone() as CreatureRef)
            .collect()
    }

    fn draw_ground(&self, draw: TileDraw<'_>) {
        if let Some(color) = self.ground.get() {
            let size = tile_pixels(draw.scale);
            draw.canvas
                .add_filled_rect(Rect::new(draw.dest.x, draw.dest.y, size, size), color);
        }
    }

    fn draw_surface(&self, draw: TileDraw<'_>) {
        let size = tile_pixels(draw.scale);
        for item in self.items.borrow().iter() {
            let margin = if item.on_bottom { 0 } else { size / 4 };
            let mut rect = inset(draw.dest, size, margin);
            if item.overhangs {
                rect.width += size / 2;
                rect.height += size / 2;
            }
            draw.canvas.add_filled_rect(rect, item.color);
        }
        for creature in self.creatures.borrow().iter() {
            if creature.can_be_seen() {
                let dest = draw.dest + creature.walk_offset() * draw.scale;
                draw.canvas.add_filled_rect(inset(dest, size, size / 6), creature.color());
            }
        }
    }

    fn draw_effects(&self, draw: TileDraw<'_>) {
        let size = tile_pixels(draw.scale);
        for color in self.effects.borrow().iter() {
            draw.canvas
                .add_filled_rect(inset(draw.dest, size, size * 3 / 8), *color);
        }
    }

    fn select(&self, top_only: bool) {
        self.selection.set(Some(top_only));
    }

    fn unselect(&self) {
        self.selection.set(None);
    }
}

pub struct GridCreature {
    id: u32,
    name: String,
    color: Cell<Color>,
    position: Cell<Position>,
    dead: Cell<bool>,
    hidden: Cell<bool>,
    direction: Cell<Direction>,
    walk_offset: Cell<Option<Point>>,
}

impl GridCreature {
    pub fn new(id: u32, name: impl Into<String>, position: Position) -> Rc<Self> {
        Rc::new(Self {
            id,
            name: name.into(),
            color: Cell::new(Color::rgb(200, 60, 60)),
            position: Cell::new(position),
            dead: Cell::new(false),
            hidden: Cell::new(false),
            direction: Cell::new(Direction::South),
            walk_offset: Cell::new(None),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Color {
        self.color.get()
    }

    pub fn set_color(&self, color: Color) {
        self.color.set(color);
    }

    pub fn set_dead(&self, dead: bool) {
        self.dead.set(dead);
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.set(hidden);
    }

    /// Starts a step towards `direction`, `offset` pixels short of arrival.
    pub fn start_walk(&self, direction: Direction, offset: Point) {
        self.direction.set(direction);
        self.walk_offset.set(Some(offset));
    }

    pub fn set_walk_offset(&self, offset: Point) {
        if self.walk_offset.get().is_some() {
            self.walk_offset.set(Some(offset));
        }
    }

    pub fn stop_walk(&self) {
        self.walk_offset.set(None);
    }
}

impl MapCreature for GridCreature {
    fn position(&self) -> Position {
        self.position.get()
    }

    fn is_dead(&self) -> bool {
        self.dead.get()
    }

    fn can_be_seen(&self) -> bool {
        !self.hidden.get()
    }

    fn draw_information(&self, info: &CreatureInfo, canvas: &mut dyn DrawBackend) {
        if !info.flags.health_bars {
            return;
        }
        let local = info.dest - info.draw_offset;
        let origin = Point::new(
            (local.x as f32 * info.horizontal_stretch) as i32,
            (local.y as f32 * info.vertical_stretch) as i32,
        ) + info.parent_rect.top_left();
        let width = (HEALTH_BAR_WIDTH as f32 * info.scale * info.horizontal_stretch) as i32;
        let height = (HEALTH_BAR_HEIGHT as f32 * info.scale * info.vertical_stretch).max(1.0) as i32;
        let bar = Rect::new(origin.x, origin.y - height - 2, width, height);
        if !info.parent_rect.contains(bar.top_left()) {
            return;
        }
        canvas.add_filled_rect(bar, if info.use_gray { GRAY } else { HEALTHY });
    }
}

impl CameraTarget for GridCreature {
    fn position(&self) -> Option<Position> {
        Some(self.position.get())
    }

    fn walk_offset(&self) -> Point {
        self.walk_offset.get().unwrap_or_default()
    }

    fn direction(&self) -> Direction {
        self.direction.get()
    }

    fn is_walking(&self) -> bool {
        self.walk_offset.get().is_some()
    }
}

pub struct GridMissile {
    position: Position,
    color: Color,
}

impl GridMissile {
    pub fn new(position: Position, color: Color) -> Rc<Self> {
        Rc::new(Self { position, color })
    }
}

impl MapMissile for GridMissile {
    fn position(&self) -> Position {
        self.position
    }

    fn draw_missile(&self, draw: TileDraw<'_>) {
        let size = tile_pixels(draw.scale);
        draw.canvas
            .add_filled_rect(inset(draw.dest, size, size * 7 / 16), self.color);
    }
}

pub struct GridText {
    position: Position,
    message: String,
    color: Color,
}

impl GridText {
    pub fn new(position: Position, message: impl Into<String>, color: Color) -> Rc<Self> {
        Rc::new(Self {
            position,
            message: message.into(),
            color,
        })
    }
}

impl MapText for GridText {
    fn position(&self) -> Position {
        self.position
    }

    fn has_message(&self) -> bool {
        !self.message.is_empty()
    }

    /// Glyphs are out of reach here; the message is drawn as a bar as wide
    /// as its character count.
    fn draw_text(&self, dest: Point, parent_rect: Rect, canvas: &mut dyn DrawBackend) {
        let width = self.message.chars().count() as i32 * 4;
        let bar = Rect::new(dest.x, dest.y - 8, width, 3);
        if parent_rect.contains(bar.top_left()) {
            canvas.add_filled_rect(bar, self.color);
        }
    }
}

pub struct GridMap {
    tiles: RefCell<HashMap<Position, Rc<GridTile>>>,
    aware_range: Cell<AwareRange>,
    light: Cell<Light>,
    missiles: RefCell<Vec<Rc<GridMissile>>>,
    static_texts: RefCell<Vec<Rc<GridText>>>,
    animated_texts: RefCell<Vec<Rc<GridText>>>,
}

impl Default for GridMap {
    fn default() -> Self {
        Self::new()
    }
}

impl GridMap {
    pub fn new() -> Self {
        Self {
            tiles: RefCell::new(HashMap::new()),
            aware_range: Cell::new(DEFAULT_AWARE_RANGE),
            light: Cell::new(Light {
                intensity: 250,
                color: 215,
            }),
            missiles: RefCell::new(Vec::new()),
            static_texts: RefCell::new(Vec::new()),
            animated_texts: RefCell::new(Vec::new()),
        }
    }

    pub fn set_aware_range(&self, range: AwareRange) {
        self.aware_range.set(range);
    }

    pub fn set_global_light(&self, light: Light) {
        self.light.set(light);
    }

    pub fn tile_at(&self, position: Position) -> Option<Rc<GridTile>> {
        self.tiles.borrow().get(&position).cloned()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.borrow().len()
    }

    fn ensure_tile(&self, position: Position) -> Rc<GridTile> {
        self.tiles
            .borrow_mut()
            .entry(position)
            .or_insert_with(|| Rc::new(GridTile::new(position)))
            .clone()
    }

    pub fn set_ground(&self, position: Position, color: Color) -> Rc<GridTile> {
        let tile = self.ensure_tile(position);
        tile.ground.set(Some(color));
        tile
    }

    pub fn add_item(&self, position: Position, item: GridItem) -> Rc<GridTile> {
        let tile = self.ensure_tile(position);
        tile.items.borrow_mut().push(item);
        tile
    }

    pub fn add_effect(&self, position: Position, color: Color) -> Rc<GridTile> {
        let tile = self.ensure_tile(position);
        tile.effects.borrow_mut().push(color);
        tile
    }

    pub fn clear_effects(&self, position: Position) {
        if let Some(tile) = self.tile_at(position) {
            tile.effects.borrow_mut().clear();
        }
    }

    /// Places `creature` on the tile at its current position.
    pub fn add_creature(&self, creature: Rc<GridCreature>) -> Rc<GridTile> {
        let tile = self.ensure_tile(creature.position.get());
        tile.creatures.borrow_mut().push(creature);
        tile
    }

    pub fn remove_creature(&self, creature: &GridCreature) -> bool {
        let Some(tile) = self.tile_at(creature.position.get()) else {
            return false;
        };
        let mut creatures = tile.creatures.borrow_mut();
        let before = creatures.len();
        creatures.retain(|other| other.id != creature.id);
        creatures.len() != before
    }

    /// Moves `creature` to `to`, returning the tile it left.
    pub fn move_creature(&self, creature: &Rc<GridCreature>, to: Position) -> Option<Rc<GridTile>> {
        let from = creature.position.get();
        self.remove_creature(creature);
        creature.position.set(to);
        self.add_creature(creature.clone());
        self.tile_at(from)
    }

    pub fn add_missile(&self, missile: Rc<GridMissile>) {
        self.missiles.borrow_mut().push(missile);
    }

    pub fn clear_missiles(&self) {
        self.missiles.borrow_mut().clear();
    }

    pub fn add_static_text(&self, text: Rc<GridText>) {
        self.static_texts.borrow_mut().push(text);
    }

    pub fn add_animated_text(&self, text: Rc<GridText>) {
        self.animated_texts.borrow_mut().push(text);
    }
}

impl MapStore for GridMap {
    fn tile(&self, position: Position) -> Option<TileRef> {
        self.tile_at(position).map(|tile| tile as TileRef)
    }

    fn is_look_possible(&self, position: Position) -> bool {
        self.tile_at(position)
            .map_or(true, |tile| tile.is_look_possible())
    }

    fn aware_range(&self) -> AwareRange {
        self.aware_range.get()
    }

    fn global_light(&self) -> Light {
        self.light.get()
    }

    fn floor_missiles(&self, z: u8) -> Vec<MissileRef> {
        self.missiles
            .borrow()
            .iter()
            .filter(|missile| missile.position.z == z)
            .map(|missile| missile.clone() as MissileRef)
            .collect()
    }

    fn static_texts(&self) -> Vec<TextRef> {
        self.static_texts
            .borrow()
            .iter()
            .map(|text| text.clone() as TextRef)
            .collect()
    }

    fn animated_texts(&self) -> Vec<TextRef> {
        self.animated_texts
            .borrow()
            .iter()
            .map(|text| text.clone() as TextRef)
            .collect()
    }

    fn spectators_in_range(
        &self,
        center: Position,
        multi_floor: bool,
        range: AwareRange,
    ) -> Vec<CreatureRef> {
        let mut found: Vec<Rc<GridCreature>> = self
            .tiles
            .borrow()
            .values()
            .flat_map(|tile| tile.creatures.borrow().clone())
            .filter(|creature| {
                center.is_in_range_ex(
                    &creature.position.get(),
                    range.left,
                    range.right,
                    range.top,
                    range.bottom,
                    multi_floor,
                )
            })
            .collect();
        found.sort_by_key(|creature| creature.id);
        found
            .into_iter()
            .map(|creature| creature as CreatureRef)
            .collect()
    }
}
