use capy_road::lanes::{Heading, LaneKind, TileKey, Traffic, Vehicle, VehicleSize, World};
use capy_road::model::{
    Capability, Direction, GridPos, RunId, Theme, COIN_REWARD, FIXED_DT, WRAP_BOUND,
};
use capy_road::sim::{MoveOutcome, Rejection, Run, RunEvent, RunPhase};
use capy_road::skins::{Loadout, SkinId};
use rand::{rngs::SmallRng, SeedableRng};
use std::collections::BTreeSet;

fn grass(rows: u32) -> World {
    let mut w = World::new();
    for _ in 0..rows {
        w.push_lane(LaneKind::Grass);
    }
    w
}

fn road(heading: Heading, speed: f32, x: f32) -> LaneKind {
    LaneKind::Road(Traffic {
        heading,
        speed,
        vehicles: vec![Vehicle {
            x,
            size: VehicleSize::Car,
        }],
    })
}

fn loadout(skin: SkinId, caps: &[Capability]) -> Loadout {
    let caps: BTreeSet<_> = caps.iter().copied().collect();
    Loadout::resolve(skin, &caps)
}

fn started(world: World, loadout: Loadout) -> Run {
    let mut run = Run::new(RunId(1), Theme::Normal, loadout, SmallRng::seed_from_u64(3));
    run.start_with_world(world);
    run
}

/// Issues one move and ticks until it lands or the run ends.
fn hop(run: &mut Run, dir: Direction) -> (MoveOutcome, Vec<RunEvent>) {
    let outcome = run.try_move(dir);
    let mut events = Vec::new();
    while run.pending().is_some() && run.is_active() {
        events.extend(run.tick(FIXED_DT));
    }
    (outcome, events)
}

fn car_x(run: &Run, row: u32) -> f32 {
    run.world()
        .lane(row)
        .and_then(|l| l.traffic())
        .map(|t| t.vehicles[0].x)
        .unwrap()
}

#[test]
fn five_forward_steps_then_a_tree() {
    let mut world = grass(40);
    world.plant(TileKey { row: 6, tile: 0 });
    let mut run = started(world, Loadout::default());

    let mut coin_events = 0;
    for step in 1..=5 {
        let (outcome, events) = hop(&mut run, Direction::Forward);
        assert_eq!(outcome, MoveOutcome::Accepted);
        assert_eq!(run.score(), step);
        coin_events += events
            .iter()
            .filter(|e| matches!(e, RunEvent::CoinsEarned(_)))
            .count();
    }
    assert_eq!(run.score(), 5);
    assert_eq!(run.coins_earned(), COIN_REWARD);
    assert_eq!(coin_events, 1);

    let before = *run.player();
    assert_eq!(
        run.try_move(Direction::Forward),
        MoveOutcome::Rejected(Rejection::Blocked)
    );
    assert!(run.pending().is_none());
    assert_eq!(run.player().pos, before.pos);
    assert_eq!(run.player().pos, GridPos::new(5, 0));
}

#[test]
fn score_tracks_the_furthest_row() {
    let mut run = started(grass(40), Loadout::default());
    let script = [
        Direction::Forward,
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Forward,
        Direction::Forward,
        Direction::Backward,
        Direction::Backward,
    ];
    let mut best = 0;
    for dir in script {
        let before = run.score();
        hop(&mut run, dir);
        best = best.max(run.player().pos.row);
        assert_eq!(run.score(), best);
        assert!(run.score() >= before);
    }
    assert_eq!(run.score(), 3);
}

#[test]
fn ten_forward_steps_pay_twice() {
    let mut run = started(grass(40), Loadout::default());
    for _ in 0..10 {
        hop(&mut run, Direction::Forward);
    }
    assert_eq!(run.coins_earned(), 2 * COIN_REWARD);
    assert_eq!(run.steps_since_coin(), 0);
}

#[test]
fn chopping_is_idempotent() {
    let mut world = grass(40);
    let key = TileKey { row: 1, tile: 1 };
    world.plant(key);
    let mut run = started(world, loadout(SkinId::SuperCar, &[]));

    hop(&mut run, Direction::Right);
    let (outcome, _) = hop(&mut run, Direction::Forward);
    assert_eq!(outcome, MoveOutcome::Chopped(key));
    hop(&mut run, Direction::Backward);
    let (outcome, _) = hop(&mut run, Direction::Forward);
    assert_eq!(outcome, MoveOutcome::Accepted);
    assert_eq!(run.world().obstacles_in(1).count(), 1);
    assert!(!run.world().is_blocked(key));
}

#[test]
fn wrapped_vehicle_keeps_heading_and_speed() {
    let mut world = grass(3);
    world.push_lane(road(Heading::Negative, 200.0, -WRAP_BOUND + 1.0));
    let mut run = started(world, Loadout::default());

    run.tick(FIXED_DT);
    assert_eq!(car_x(&run, 4), WRAP_BOUND);
    let t = run.world().lane(4).and_then(|l| l.traffic()).unwrap();
    assert_eq!(t.heading, Heading::Negative);
    assert_eq!(t.speed, 200.0);

    run.tick(FIXED_DT);
    assert!(car_x(&run, 4) < WRAP_BOUND);
}

#[test]
fn overlap_latches_game_over_once() {
    let mut world = World::new();
    world.push_lane(road(Heading::Positive, 0.0, 0.0));
    world.push_lane(LaneKind::Grass);
    let mut run = started(world, Loadout::default());

    let (outcome, events) = hop(&mut run, Direction::Forward);
    assert!(outcome.accepted());
    let crashes = events
        .iter()
        .filter(|e| matches!(e, RunEvent::Crashed { row: 1, .. }))
        .count();
    assert_eq!(crashes, 1);
    assert_eq!(run.phase(), RunPhase::GameOver);

    // the car still overlaps; nothing fires again
    for _ in 0..10 {
        assert!(run.tick(FIXED_DT).is_empty());
    }
    assert!(run.finish().is_some());
    assert!(run.finish().is_none());
}

#[test]
fn freeze_suspends_traffic_and_collisions() {
    let mut world = World::new();
    world.push_lane(road(Heading::Positive, 300.0, 0.0));
    let mut run = started(world, loadout(SkinId::Capy, &[Capability::TimeFreeze]));
    assert!(run.activate_freeze());

    let (_, events) = hop(&mut run, Direction::Forward);
    assert!(events
        .iter()
        .all(|e| !matches!(e, RunEvent::Crashed { .. })));
    for _ in 0..60 {
        run.tick(FIXED_DT);
        assert_eq!(car_x(&run, 1), 0.0);
    }
    assert_eq!(run.phase(), RunPhase::Frozen);
    assert_eq!(run.player().pos.row, 1);

    // thawing on top of the car ends the run
    run.end_freeze();
    let events = run.tick(FIXED_DT);
    assert!(matches!(events.as_slice(), [RunEvent::Crashed { .. }]));
}

#[test]
fn same_seed_same_world() {
    let mk = |seed| {
        let mut run = Run::new(
            RunId(1),
            Theme::Volcano,
            Loadout::default(),
            SmallRng::seed_from_u64(seed),
        );
        run.start();
        run.world().clone()
    };
    assert_eq!(mk(11), mk(11));
    assert_ne!(mk(11), mk(12));
}

#[test]
fn parked_truck_beside_the_path_is_harmless() {
    let mut world = World::new();
    world.push_lane(LaneKind::Road(Traffic {
        heading: Heading::Positive,
        speed: 0.0,
        vehicles: vec![Vehicle {
            x: 50.0,
            size: VehicleSize::Truck,
        }],
    }));
    world.push_lane(LaneKind::Grass);
    let mut run = started(world, Loadout::default());

    let (_, events) = hop(&mut run, Direction::Forward);
    assert!(events
        .iter()
        .all(|e| !matches!(e, RunEvent::Crashed { .. })));
    for _ in 0..8 {
        assert!(run.tick(FIXED_DT).is_empty());
    }
    assert_eq!(run.phase(), RunPhase::Running);
    assert_eq!(run.player().pos, GridPos::new(1, 0));
}
