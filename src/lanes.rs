use crate::model::{
    GridPos, Theme, LOOKAHEAD_ROWS, MAX_TILE, MIN_TILE, SAFE_START_ROWS, TILE_SIZE, WRAP_BOUND,
};
use rand::Rng;
use std::collections::BTreeMap;

const ROAD_CHANCE: f64 = 0.5;
const TRUCK_CHANCE: f64 = 0.2;
const SPEED_BONUS: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Heading {
    Positive,
    Negative,
}

impl Heading {
    pub fn sign(self) -> f32 {
        match self {
            Heading::Positive => 1.0,
            Heading::Negative => -1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleSize {
    Car,
    Truck,
}

impl VehicleSize {
    /// Drawn length only; collision uses HIT_WIDTH for every size.
    pub fn body_len(self) -> f32 {
        match self {
            VehicleSize::Car => 65.0,
            VehicleSize::Truck => 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vehicle {
    pub x: f32, // world units, within [-WRAP_BOUND, WRAP_BOUND]
    pub size: VehicleSize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Traffic {
    pub heading: Heading,
    pub speed: f32, // world units/sec
    pub vehicles: Vec<Vehicle>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LaneKind {
    Grass,
    Road(Traffic),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lane {
    pub row: u32,
    pub kind: LaneKind,
}

impl Lane {
    pub fn y(&self) -> f32 {
        self.row as f32 * TILE_SIZE
    }

    pub fn traffic(&self) -> Option<&Traffic> {
        match &self.kind {
            LaneKind::Road(t) => Some(t),
            LaneKind::Grass => None,
        }
    }

    pub fn is_road(&self) -> bool {
        matches!(self.kind, LaneKind::Road(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    pub row: u32,
    pub tile: i32,
}

impl From<GridPos> for TileKey {
    fn from(p: GridPos) -> Self {
        Self {
            row: p.row,
            tile: p.tile,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Obstacle {
    Standing,
    Felled,
}

/// All generated lanes of one run plus the obstacle state of every grass tile
/// that ever held a tree. Row 0 is the start lane and is always clear grass.
#[derive(Clone, Debug, PartialEq)]
pub struct World {
    lanes: Vec<Lane>,
    obstacles: BTreeMap<TileKey, Obstacle>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            lanes: vec![Lane {
                row: 0,
                kind: LaneKind::Grass,
            }],
            obstacles: BTreeMap::new(),
        }
    }

    /// Highest generated row.
    pub fn frontier(&self) -> u32 {
        (self.lanes.len() - 1) as u32
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub(crate) fn lanes_mut(&mut self) -> &mut [Lane] {
        &mut self.lanes
    }

    pub fn lane(&self, row: u32) -> Option<&Lane> {
        self.lanes.get(row as usize)
    }

    pub fn needs_extension(&self, player_row: u32) -> bool {
        player_row + LOOKAHEAD_ROWS > self.frontier()
    }

    /// Appends `n` random lanes after the frontier.
    pub fn extend<R: Rng + ?Sized>(&mut self, n: u32, theme: Theme, rng: &mut R) {
        for _ in 0..n {
            let row = self.frontier() + 1;
            if rng.gen_bool(ROAD_CHANCE) {
                let heading = if rng.gen_bool(0.5) {
                    Heading::Positive
                } else {
                    Heading::Negative
                };
                let size = if rng.gen_bool(TRUCK_CHANCE) {
                    VehicleSize::Truck
                } else {
                    VehicleSize::Car
                };
                let traffic = Traffic {
                    heading,
                    speed: theme.road_base_speed() + rng.gen_range(0.0..SPEED_BONUS),
                    vehicles: vec![Vehicle {
                        x: rng.gen_range(-WRAP_BOUND..WRAP_BOUND),
                        size,
                    }],
                };
                self.push_lane(LaneKind::Road(traffic));
            } else {
                self.push_lane(LaneKind::Grass);
                for _ in 0..theme.tree_attempts() {
                    let tile = rng.gen_range(MIN_TILE..=MAX_TILE);
                    if tile == 0 && row <= SAFE_START_ROWS {
                        continue;
                    }
                    self.obstacles
                        .entry(TileKey { row, tile })
                        .or_insert(Obstacle::Standing);
                }
            }
        }
    }

    /// Appends a lane of the given kind and returns its row.
    pub fn push_lane(&mut self, kind: LaneKind) -> u32 {
        let row = self.frontier() + 1;
        self.lanes.push(Lane { row, kind });
        row
    }

    /// Places a standing tree. Only grass lanes inside the tile range accept one.
    pub fn plant(&mut self, key: TileKey) -> bool {
        let on_grass = matches!(
            self.lane(key.row).map(|l| &l.kind),
            Some(LaneKind::Grass)
        );
        if !on_grass || !(MIN_TILE..=MAX_TILE).contains(&key.tile) {
            return false;
        }
        self.obstacles.insert(key, Obstacle::Standing);
        true
    }

    pub fn obstacle(&self, key: TileKey) -> Option<Obstacle> {
        self.obstacles.get(&key).copied()
    }

    pub fn is_blocked(&self, key: TileKey) -> bool {
        self.obstacle(key) == Some(Obstacle::Standing)
    }

    /// Cuts a standing tree down for good. Returns false if nothing was standing.
    pub fn fell(&mut self, key: TileKey) -> bool {
        match self.obstacles.get_mut(&key) {
            Some(o) if *o == Obstacle::Standing => {
                *o = Obstacle::Felled;
                true
            }
            _ => false,
        }
    }

    pub fn obstacles_in(&self, row: u32) -> impl Iterator<Item = (i32, Obstacle)> + '_ {
        let lo = TileKey { row, tile: MIN_TILE };
        let hi = TileKey { row, tile: MAX_TILE };
        self.obstacles.range(lo..=hi).map(|(k, o)| (k.tile, *o))
    }
}
