use serde::{Deserialize, Serialize};

// World units: one tile is TILE_SIZE wide and one row is TILE_SIZE deep.
pub const TILE_SIZE: f32 = 42.0;
pub const MIN_TILE: i32 = -6;
pub const MAX_TILE: i32 = 6;

pub const WRAP_BOUND: f32 = 500.0; // vehicles teleport across at +-this
pub const HIT_WIDTH: f32 = 40.0; // same for cars and trucks
pub const HIT_DEPTH: f32 = 20.0;
pub const AURA_RADIUS: f32 = 200.0;
pub const HOP_HEIGHT: f32 = 18.0;

pub const FIXED_DT: f32 = 1.0 / 60.0;
pub const MAX_FRAME_DT: f32 = 1.0 / 20.0; // clamp if system hiccups

pub const INITIAL_ROWS: u32 = 30;
pub const LOOKAHEAD_ROWS: u32 = 15;
pub const EXTEND_ROWS: u32 = 10;
pub const SAFE_START_ROWS: u32 = 3;

pub const STEPS_PER_REWARD: u32 = 5;
pub const COIN_REWARD: u32 = 2;

pub const FREEZE_SECS: f64 = 5.0;
pub const COOLDOWN_SECS: f64 = 15.0;
pub const GAME_OVER_DELAY_SECS: f64 = 0.5;

/// Identifies one run within a session. Timers carry it so they can be
/// recognised as stale once a newer run has started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RunId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    /// (row delta, tile delta)
    pub fn delta(self) -> (i64, i32) {
        match self {
            Direction::Forward => (1, 0),
            Direction::Backward => (-1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct GridPos {
    pub row: u32,
    pub tile: i32,
}

impl GridPos {
    pub const START: GridPos = GridPos { row: 0, tile: 0 };

    pub fn new(row: u32, tile: i32) -> Self {
        Self { row, tile }
    }

    /// The neighbouring cell in `dir`, or None when it leaves the grid
    /// (below row 0 or outside the lateral tile range).
    pub fn step(self, dir: Direction) -> Option<GridPos> {
        let (dr, dt) = dir.delta();
        let row = u32::try_from(i64::from(self.row) + dr).ok()?;
        let tile = self.tile + dt;
        if !(MIN_TILE..=MAX_TILE).contains(&tile) {
            return None;
        }
        Some(GridPos { row, tile })
    }

    pub fn world_x(self) -> f32 {
        self.tile as f32 * TILE_SIZE
    }

    pub fn world_y(self) -> f32 {
        self.row as f32 * TILE_SIZE
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Normal,
    Volcano,
}

impl Theme {
    pub fn name(self) -> &'static str {
        match self {
            Theme::Normal => "normal",
            Theme::Volcano => "volcano",
        }
    }

    /// World units per second before the per-lane random bonus.
    pub fn road_base_speed(self) -> f32 {
        match self {
            Theme::Normal => 130.0,
            Theme::Volcano => 250.0,
        }
    }

    pub fn tree_attempts(self) -> u32 {
        match self {
            Theme::Normal => 2,
            Theme::Volcano => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TimeFreeze,
    ChopObstacles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_respects_grid_edges() {
        assert_eq!(GridPos::START.step(Direction::Backward), None);
        assert_eq!(
            GridPos::START.step(Direction::Forward),
            Some(GridPos::new(1, 0))
        );
        assert_eq!(GridPos::new(4, MAX_TILE).step(Direction::Right), None);
        assert_eq!(GridPos::new(4, MIN_TILE).step(Direction::Left), None);
        assert_eq!(
            GridPos::new(4, MIN_TILE).step(Direction::Right),
            Some(GridPos::new(4, MIN_TILE + 1))
        );
    }

    #[test]
    fn volcano_is_faster_and_denser() {
        assert!(Theme::Volcano.road_base_speed() > Theme::Normal.road_base_speed());
        assert_eq!(Theme::Normal.tree_attempts(), 2);
        assert_eq!(Theme::Volcano.tree_attempts(), 4);
    }
}
