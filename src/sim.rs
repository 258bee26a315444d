use crate::lanes::{LaneKind, TileKey, World};
use crate::model::{
    Direction, GridPos, RunId, Theme, AURA_RADIUS, COIN_REWARD, EXTEND_ROWS, HIT_DEPTH,
    HIT_WIDTH, HOP_HEIGHT, INITIAL_ROWS, STEPS_PER_REWARD, WRAP_BOUND,
};
use crate::skins::{Loadout, SkinId};
use rand::{rngs::SmallRng, Rng};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Frozen,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreezeGate {
    Ready,
    Active,
    Cooling,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingMove {
    pub direction: Direction,
    pub from: GridPos,
    pub to: GridPos,
    pub progress: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    Inactive,
    Busy,
    OutOfBounds,
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    Chopped(TileKey),
    Rejected(Rejection),
}

impl MoveOutcome {
    pub fn accepted(self) -> bool {
        !matches!(self, MoveOutcome::Rejected(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    MoveCompleted { to: GridPos, direction: Direction },
    ScoreChanged(u32),
    CoinsEarned(u32),
    FrontierExtended(u32),
    Crashed { row: u32, x: f32 },
}

/// What a finished run hands to the profile and ranking collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunResult {
    pub run: RunId,
    pub skin: SkinId,
    pub score: u32,
    pub coins_earned: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Player {
    pub pos: GridPos,
    pub facing: Direction,
    // interpolated world position, used for collision and drawing
    pub x: f32,
    pub y: f32,
    pub hop: f32,
}

impl Player {
    fn at(pos: GridPos) -> Self {
        Self {
            pos,
            facing: Direction::Forward,
            x: pos.world_x(),
            y: pos.world_y(),
            hop: 0.0,
        }
    }

    fn place_between(&mut self, mv: &PendingMove) {
        let t = mv.progress;
        self.x = lerp(mv.from.world_x(), mv.to.world_x(), t);
        self.y = lerp(mv.from.world_y(), mv.to.world_y(), t);
        self.hop = (t * std::f32::consts::PI).sin() * HOP_HEIGHT;
    }

    fn settle(&mut self, pos: GridPos) {
        self.pos = pos;
        self.x = pos.world_x();
        self.y = pos.world_y();
        self.hop = 0.0;
    }
}

/// One play-through: created idle, started, mutated by `tick` and input,
/// latched into `GameOver` by the first collision.
#[derive(Clone, Debug)]
pub struct Run {
    id: RunId,
    theme: Theme,
    loadout: Loadout,
    phase: RunPhase,
    freeze: FreezeGate,
    world: World,
    player: Player,
    pending: Option<PendingMove>,
    score: u32,
    coins_earned: u32,
    steps_since_coin: u32,
    ticks: u64,
    reported: bool,
    rng: SmallRng,
}

impl Run {
    pub fn new(id: RunId, theme: Theme, loadout: Loadout, rng: SmallRng) -> Self {
        Self {
            id,
            theme,
            loadout,
            phase: RunPhase::Idle,
            freeze: FreezeGate::Ready,
            world: World::new(),
            player: Player::at(GridPos::START),
            pending: None,
            score: 0,
            coins_earned: 0,
            steps_since_coin: 0,
            ticks: 0,
            reported: false,
            rng,
        }
    }

    /// Generates the opening stretch of lanes and enters `Running`.
    pub fn start(&mut self) {
        let mut world = World::new();
        world.extend(INITIAL_ROWS, self.theme, &mut self.rng);
        self.start_with_world(world);
    }

    /// Enters `Running` on a prepared world.
    pub fn start_with_world(&mut self, world: World) {
        self.world = world;
        self.player = Player::at(GridPos::START);
        self.pending = None;
        self.score = 0;
        self.coins_earned = 0;
        self.steps_since_coin = 0;
        self.ticks = 0;
        self.reported = false;
        self.freeze = FreezeGate::Ready;
        self.phase = RunPhase::Running;
        info!(
            run = self.id.0,
            theme = self.theme.name(),
            skin = ?self.loadout.skin,
            frontier = self.world.frontier(),
            "run started"
        );
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn loadout(&self) -> &Loadout {
        &self.loadout
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, RunPhase::Running | RunPhase::Frozen)
    }

    pub fn is_over(&self) -> bool {
        self.phase == RunPhase::GameOver
    }

    pub fn is_reported(&self) -> bool {
        self.reported
    }

    pub fn freeze_gate(&self) -> FreezeGate {
        self.freeze
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn pending(&self) -> Option<&PendingMove> {
        self.pending.as_ref()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn coins_earned(&self) -> u32 {
        self.coins_earned
    }

    pub fn steps_since_coin(&self) -> u32 {
        self.steps_since_coin
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn try_move(&mut self, direction: Direction) -> MoveOutcome {
        if !self.is_active() {
            return MoveOutcome::Rejected(Rejection::Inactive);
        }
        if self.pending.is_some() {
            return MoveOutcome::Rejected(Rejection::Busy);
        }
        let Some(to) = self.player.pos.step(direction) else {
            return MoveOutcome::Rejected(Rejection::OutOfBounds);
        };

        let key = TileKey::from(to);
        let mut outcome = MoveOutcome::Accepted;
        if self.world.is_blocked(key) {
            if !self.loadout.can_chop {
                return MoveOutcome::Rejected(Rejection::Blocked);
            }
            self.world.fell(key);
            info!(run = self.id.0, row = key.row, tile = key.tile, "obstacle chopped");
            outcome = MoveOutcome::Chopped(key);
        }

        self.player.facing = direction;
        self.pending = Some(PendingMove {
            direction,
            from: self.player.pos,
            to,
            progress: 0.0,
        });
        outcome
    }

    /// Suspends traffic. Needs the capability, a ready gate and an unfrozen run.
    pub fn activate_freeze(&mut self) -> bool {
        if self.phase != RunPhase::Running
            || !self.loadout.can_freeze
            || self.freeze != FreezeGate::Ready
        {
            return false;
        }
        self.phase = RunPhase::Frozen;
        self.freeze = FreezeGate::Active;
        info!(run = self.id.0, "time freeze started");
        true
    }

    /// Resumes traffic and starts the cooldown. No-op unless frozen.
    pub fn end_freeze(&mut self) -> bool {
        if self.phase != RunPhase::Frozen {
            return false;
        }
        self.phase = RunPhase::Running;
        self.freeze = FreezeGate::Cooling;
        info!(run = self.id.0, "time freeze ended");
        true
    }

    pub fn end_cooldown(&mut self) -> bool {
        if self.is_over() || self.freeze != FreezeGate::Cooling {
            return false;
        }
        self.freeze = FreezeGate::Ready;
        true
    }

    /// Hands out the result of a finished run, once.
    pub fn finish(&mut self) -> Option<RunResult> {
        if !self.is_over() || self.reported {
            return None;
        }
        self.reported = true;
        Some(RunResult {
            run: self.id,
            skin: self.loadout.skin,
            score: self.score,
            coins_earned: self.coins_earned,
        })
    }

    /// One fixed simulation step.
    pub fn tick(&mut self, dt: f32) -> Vec<RunEvent> {
        let mut events = Vec::new();
        if !self.is_active() {
            return events;
        }
        self.ticks += 1;

        if self.phase == RunPhase::Running {
            self.advance_traffic(dt);
            if let Some((row, x)) = self.collision() {
                self.phase = RunPhase::GameOver;
                info!(run = self.id.0, row, x, score = self.score, "player hit");
                events.push(RunEvent::Crashed { row, x });
                return events;
            }
        }

        self.advance_move(&mut events);
        events
    }

    fn advance_traffic(&mut self, dt: f32) {
        let player_y = self.player.y;
        let aura = self.loadout.modifiers.neutralizes_traffic;
        for lane in self.world.lanes_mut() {
            let lane_y = lane.y();
            let LaneKind::Road(traffic) = &mut lane.kind else {
                continue;
            };
            let jitter = aura && (lane_y - player_y).abs() < AURA_RADIUS;
            let step = traffic.heading.sign() * traffic.speed * dt;
            for v in &mut traffic.vehicles {
                if jitter {
                    v.x += self.rng.gen_range(-1.0..1.0);
                } else {
                    v.x += step;
                }
                v.x = wrap_lateral(v.x);
            }
        }
    }

    fn collision(&self) -> Option<(u32, f32)> {
        let (px, py) = (self.player.x, self.player.y);
        self.world
            .lanes()
            .iter()
            .filter(|lane| (lane.y() - py).abs() < HIT_DEPTH)
            .find_map(|lane| {
                lane.traffic()?
                    .vehicles
                    .iter()
                    .find(|v| (v.x - px).abs() < HIT_WIDTH)
                    .map(|v| (lane.row, v.x))
            })
    }

    fn advance_move(&mut self, events: &mut Vec<RunEvent>) {
        let Some(mut mv) = self.pending else {
            return;
        };
        mv.progress = (mv.progress + self.loadout.modifiers.move_speed).min(1.0);
        if mv.progress < 1.0 {
            self.player.place_between(&mv);
            self.pending = Some(mv);
            return;
        }

        self.pending = None;
        self.player.settle(mv.to);
        events.push(RunEvent::MoveCompleted {
            to: mv.to,
            direction: mv.direction,
        });

        if mv.direction == Direction::Forward {
            self.steps_since_coin += 1;
            if self.steps_since_coin >= STEPS_PER_REWARD {
                self.steps_since_coin = 0;
                self.coins_earned += COIN_REWARD;
                info!(run = self.id.0, total = self.coins_earned, "coins earned");
                events.push(RunEvent::CoinsEarned(COIN_REWARD));
            }
        }

        if mv.to.row > self.score {
            self.score = mv.to.row;
            events.push(RunEvent::ScoreChanged(self.score));
        }

        if self.world.needs_extension(mv.to.row) {
            self.world.extend(EXTEND_ROWS, self.theme, &mut self.rng);
            debug!(run = self.id.0, frontier = self.world.frontier(), "world extended");
            events.push(RunEvent::FrontierExtended(self.world.frontier()));
        }
    }
}

/// Vehicles leaving one side reappear at the other.
pub fn wrap_lateral(x: f32) -> f32 {
    if x > WRAP_BOUND {
        -WRAP_BOUND
    } else if x < -WRAP_BOUND {
        WRAP_BOUND
    } else {
        x
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::{Heading, Traffic, Vehicle, VehicleSize};
    use crate::model::{Capability, FIXED_DT, TILE_SIZE};
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    fn grass_world(rows: u32) -> World {
        let mut w = World::new();
        for _ in 0..rows {
            w.push_lane(LaneKind::Grass);
        }
        w
    }

    fn road(speed: f32, x: f32) -> LaneKind {
        LaneKind::Road(Traffic {
            heading: Heading::Positive,
            speed,
            vehicles: vec![Vehicle {
                x,
                size: VehicleSize::Car,
            }],
        })
    }

    fn run_on(world: World, loadout: Loadout) -> Run {
        let mut run = Run::new(RunId(1), Theme::Normal, loadout, SmallRng::seed_from_u64(9));
        run.start_with_world(world);
        run
    }

    fn hop(run: &mut Run, dir: Direction) -> Vec<RunEvent> {
        assert!(run.try_move(dir).accepted(), "{dir:?} rejected");
        let mut events = Vec::new();
        while run.pending().is_some() && run.is_active() {
            events.extend(run.tick(FIXED_DT));
        }
        events
    }

    fn with_caps(skin: SkinId, caps: &[Capability]) -> Loadout {
        let caps: BTreeSet<_> = caps.iter().copied().collect();
        Loadout::resolve(skin, &caps)
    }

    #[test]
    fn new_run_is_idle_and_ignores_input() {
        let mut run = Run::new(
            RunId(1),
            Theme::Normal,
            Loadout::default(),
            SmallRng::seed_from_u64(1),
        );
        assert_eq!(run.phase(), RunPhase::Idle);
        assert_eq!(
            run.try_move(Direction::Forward),
            MoveOutcome::Rejected(Rejection::Inactive)
        );
        assert!(run.tick(FIXED_DT).is_empty());
        assert_eq!(run.ticks(), 0);
    }

    #[test]
    fn start_generates_initial_batch() {
        let mut run = Run::new(
            RunId(1),
            Theme::Volcano,
            Loadout::default(),
            SmallRng::seed_from_u64(1),
        );
        run.start();
        assert_eq!(run.phase(), RunPhase::Running);
        assert_eq!(run.world().frontier(), INITIAL_ROWS);
        assert_eq!(run.player().pos, GridPos::START);
    }

    #[test]
    fn only_one_move_in_flight() {
        let mut run = run_on(grass_world(40), Loadout::default());
        assert_eq!(run.try_move(Direction::Forward), MoveOutcome::Accepted);
        assert_eq!(
            run.try_move(Direction::Left),
            MoveOutcome::Rejected(Rejection::Busy)
        );
        run.tick(FIXED_DT);
        assert_eq!(
            run.try_move(Direction::Left),
            MoveOutcome::Rejected(Rejection::Busy)
        );
    }

    #[test]
    fn move_interpolates_then_lands() {
        let mut run = run_on(grass_world(40), Loadout::default());
        run.try_move(Direction::Forward);
        assert!(run.tick(FIXED_DT).is_empty());
        let p = *run.player();
        assert_eq!(p.pos, GridPos::START);
        assert!((p.y - 0.25 * TILE_SIZE).abs() < 1e-4);
        assert!(p.hop > 0.0);

        let mut events = Vec::new();
        for _ in 0..3 {
            events.extend(run.tick(FIXED_DT));
        }
        assert_eq!(
            events,
            vec![
                RunEvent::MoveCompleted {
                    to: GridPos::new(1, 0),
                    direction: Direction::Forward,
                },
                RunEvent::ScoreChanged(1),
            ]
        );
        let p = *run.player();
        assert_eq!(p.pos, GridPos::new(1, 0));
        assert_eq!(p.y, TILE_SIZE);
        assert_eq!(p.hop, 0.0);
        assert!(run.pending().is_none());
    }

    #[test]
    fn faster_skins_land_sooner() {
        let mut run = run_on(grass_world(40), with_caps(SkinId::SuperCar, &[]));
        run.try_move(Direction::Forward);
        run.tick(FIXED_DT);
        assert!(run.pending().is_some());
        run.tick(FIXED_DT);
        assert!(run.pending().is_none());
        assert_eq!(run.player().pos.row, 1);
    }

    #[test]
    fn rejects_leaving_the_grid() {
        let mut run = run_on(grass_world(40), Loadout::default());
        assert_eq!(
            run.try_move(Direction::Backward),
            MoveOutcome::Rejected(Rejection::OutOfBounds)
        );
        for _ in 0..6 {
            hop(&mut run, Direction::Right);
        }
        assert_eq!(
            run.try_move(Direction::Right),
            MoveOutcome::Rejected(Rejection::OutOfBounds)
        );
    }

    #[test]
    fn lateral_and_backward_moves_do_not_count_toward_coins() {
        let mut run = run_on(grass_world(40), Loadout::default());
        for _ in 0..4 {
            hop(&mut run, Direction::Forward);
        }
        hop(&mut run, Direction::Left);
        hop(&mut run, Direction::Backward);
        assert_eq!(run.steps_since_coin(), 4);
        assert_eq!(run.coins_earned(), 0);
        let events = hop(&mut run, Direction::Forward);
        assert!(events.contains(&RunEvent::CoinsEarned(COIN_REWARD)));
        assert_eq!(run.coins_earned(), COIN_REWARD);
        assert_eq!(run.steps_since_coin(), 0);
        // the backward hop dropped to row 3, the last forward returned to 4
        assert_eq!(run.score(), 4);
    }

    #[test]
    fn score_never_decreases() {
        let mut run = run_on(grass_world(40), Loadout::default());
        hop(&mut run, Direction::Forward);
        let events = hop(&mut run, Direction::Forward);
        assert!(events.contains(&RunEvent::ScoreChanged(2)));
        let events = hop(&mut run, Direction::Backward);
        assert!(events
            .iter()
            .all(|e| !matches!(e, RunEvent::ScoreChanged(_))));
        assert!(events.contains(&RunEvent::MoveCompleted {
            to: GridPos::new(1, 0),
            direction: Direction::Backward,
        }));
        assert_eq!(run.player().pos.row, 1);
        assert_eq!(run.score(), 2);
    }

    #[test]
    fn blocked_tile_without_axe() {
        let mut world = grass_world(40);
        world.plant(TileKey { row: 1, tile: 0 });
        let mut run = run_on(world, Loadout::default());
        assert_eq!(
            run.try_move(Direction::Forward),
            MoveOutcome::Rejected(Rejection::Blocked)
        );
        assert!(run.pending().is_none());
        assert_eq!(run.player().pos, GridPos::START);
    }

    #[test]
    fn axe_chops_once() {
        let mut world = grass_world(40);
        let key = TileKey { row: 1, tile: 0 };
        world.plant(key);
        let mut run = run_on(world, with_caps(SkinId::Capy, &[Capability::ChopObstacles]));
        assert_eq!(run.try_move(Direction::Forward), MoveOutcome::Chopped(key));
        while run.pending().is_some() {
            run.tick(FIXED_DT);
        }
        hop(&mut run, Direction::Backward);
        assert_eq!(run.try_move(Direction::Forward), MoveOutcome::Accepted);
        assert!(!run.world().is_blocked(key));
    }

    #[test]
    fn vehicles_wrap_preserving_heading_and_speed() {
        let mut world = grass_world(5);
        world.push_lane(road(120.0, WRAP_BOUND + 1.0));
        let mut run = run_on(world, Loadout::default());
        run.tick(FIXED_DT);
        let t = run.world().lane(6).and_then(|l| l.traffic()).unwrap();
        assert_eq!(t.vehicles[0].x, -WRAP_BOUND);
        assert_eq!(t.heading, Heading::Positive);
        assert_eq!(t.speed, 120.0);
        run.tick(FIXED_DT);
        let t = run.world().lane(6).and_then(|l| l.traffic()).unwrap();
        assert!(t.vehicles[0].x > -WRAP_BOUND);
    }

    #[test]
    fn collision_latches_once() {
        let mut world = World::new();
        world.push_lane(road(0.0, 200.0));
        let mut run = run_on(world, Loadout::default());
        hop(&mut run, Direction::Forward);
        assert_eq!(run.player().pos.row, 1);

        // drive the car onto the player
        if let LaneKind::Road(t) = &mut run.world.lanes_mut()[1].kind {
            t.vehicles[0].x = 10.0;
        }
        let events = run.tick(FIXED_DT);
        assert!(matches!(events.as_slice(), [RunEvent::Crashed { row: 1, .. }]));
        assert!(run.is_over());
        assert!(run.tick(FIXED_DT).is_empty());
        assert_eq!(
            run.try_move(Direction::Forward),
            MoveOutcome::Rejected(Rejection::Inactive)
        );

        let result = run.finish().unwrap();
        assert_eq!(result.score, 1);
        assert_eq!(run.finish(), None);
    }

    fn crosses_parked(size: VehicleSize, x: f32) -> bool {
        let mut world = World::new();
        world.push_lane(LaneKind::Road(Traffic {
            heading: Heading::Negative,
            speed: 0.0,
            vehicles: vec![Vehicle { x, size }],
        }));
        let mut run = run_on(world, Loadout::default());
        run.try_move(Direction::Forward);
        let mut crashed = false;
        for _ in 0..8 {
            crashed |= run
                .tick(FIXED_DT)
                .iter()
                .any(|e| matches!(e, RunEvent::Crashed { .. }));
        }
        crashed
    }

    #[test]
    fn trucks_and_cars_share_the_hit_width() {
        assert!(!crosses_parked(VehicleSize::Truck, 50.0));
        assert!(crosses_parked(VehicleSize::Truck, 39.0));
        assert!(!crosses_parked(VehicleSize::Car, 50.0));
        assert!(crosses_parked(VehicleSize::Car, -39.0));
    }

    #[test]
    fn frozen_traffic_stands_still_and_is_harmless() {
        let mut world = World::new();
        world.push_lane(road(300.0, -300.0));
        let mut run = run_on(world, with_caps(SkinId::Capy, &[Capability::TimeFreeze]));
        assert!(run.activate_freeze());
        assert_eq!(run.phase(), RunPhase::Frozen);
        assert!(!run.activate_freeze());

        hop(&mut run, Direction::Forward);
        if let LaneKind::Road(t) = &mut run.world.lanes_mut()[1].kind {
            t.vehicles[0].x = 0.0;
        }
        for _ in 0..30 {
            assert!(run.tick(FIXED_DT).is_empty());
        }
        let t = run.world().lane(1).and_then(|l| l.traffic()).unwrap();
        assert_eq!(t.vehicles[0].x, 0.0);
        assert!(!run.is_over());

        assert!(run.end_freeze());
        assert_eq!(run.freeze_gate(), FreezeGate::Cooling);
        assert!(!run.activate_freeze());
        assert!(run.end_cooldown());
        assert_eq!(run.freeze_gate(), FreezeGate::Ready);
    }

    #[test]
    fn freeze_needs_the_capability() {
        let mut run = run_on(grass_world(40), Loadout::default());
        assert!(!run.activate_freeze());
        assert_eq!(run.phase(), RunPhase::Running);
    }

    #[test]
    fn aura_pins_nearby_traffic() {
        let mut world = World::new();
        world.push_lane(road(250.0, -400.0));
        for _ in 0..20 {
            world.push_lane(LaneKind::Grass);
        }
        world.push_lane(road(250.0, -400.0));
        let mut run = run_on(world, with_caps(SkinId::HackerCapy, &[]));
        for _ in 0..60 {
            run.tick(FIXED_DT);
        }
        let near = run.world().lane(1).and_then(|l| l.traffic()).unwrap();
        let far = run.world().lane(22).and_then(|l| l.traffic()).unwrap();
        assert!((near.vehicles[0].x + 400.0).abs() <= 60.0);
        assert!(far.vehicles[0].x > -200.0);
    }

    #[test]
    fn approaching_the_frontier_extends_the_world() {
        let mut run = run_on(grass_world(15), Loadout::default());
        assert_eq!(run.world().frontier(), 15);
        let events = hop(&mut run, Direction::Forward);
        assert!(events.contains(&RunEvent::FrontierExtended(15 + EXTEND_ROWS)));
        assert_eq!(run.world().frontier(), 15 + EXTEND_ROWS);
    }

    #[test]
    fn wrap_lateral_is_a_teleport() {
        assert_eq!(wrap_lateral(WRAP_BOUND + 0.1), -WRAP_BOUND);
        assert_eq!(wrap_lateral(-WRAP_BOUND - 0.1), WRAP_BOUND);
        assert_eq!(wrap_lateral(12.0), 12.0);
    }
}
