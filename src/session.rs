use crate::lanes::World;
use crate::model::{
    Direction, RunId, Theme, COOLDOWN_SECS, FREEZE_SECS, GAME_OVER_DELAY_SECS,
};
use crate::profile::{Profile, RankingEntry, RunReport};
use crate::schedule::{Scheduler, TimerKind};
use crate::sim::{MoveOutcome, Run, RunEvent};
use crate::skins::{unlocks_for, Loadout};
use crate::storage::{ProfileStore, RankingBoard};
use anyhow::Result;
use chrono::Utc;
use rand::{rngs::SmallRng, SeedableRng};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Move(Direction),
    Special,
}

/// Owns the current run, its timers and the two persistence collaborators.
pub struct Session<P: ProfileStore, B: RankingBoard> {
    profiles: P,
    board: B,
    profile: Profile,
    theme: Theme,
    seed: Option<u64>,
    scheduler: Scheduler,
    run: Run,
    runs_started: u64,
    last_report: Option<RunReport>,
}

fn rng_for(seed: Option<u64>, run: RunId) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed ^ run.0),
        None => SmallRng::from_entropy(),
    }
}

impl<P: ProfileStore, B: RankingBoard> Session<P, B> {
    pub fn new(profiles: P, board: B, theme: Theme, seed: Option<u64>) -> Self {
        let profile = profiles.load();
        let loadout = Loadout::resolve(profile.equipped, &profile.capabilities);
        let idle = Run::new(RunId(0), theme, loadout, rng_for(seed, RunId(0)));
        Self {
            profiles,
            board,
            profile,
            theme,
            seed,
            scheduler: Scheduler::new(),
            run: idle,
            runs_started: 0,
            last_report: None,
        }
    }

    fn next_run(&mut self) -> &mut Run {
        self.runs_started += 1;
        let id = RunId(self.runs_started);
        let loadout = Loadout::resolve(self.profile.equipped, &self.profile.capabilities);
        self.run = Run::new(id, self.theme, loadout, rng_for(self.seed, id));
        self.last_report = None;
        info!(run = id.0, seed = ?self.seed, "new run");
        &mut self.run
    }

    /// Discards the current run, unreported, and starts a fresh one.
    pub fn start_run(&mut self) -> RunId {
        let run = self.next_run();
        run.start();
        run.id()
    }

    pub fn start_run_with_world(&mut self, world: World) -> RunId {
        let run = self.next_run();
        run.start_with_world(world);
        run.id()
    }

    /// Routes one player action into the run. Returns whether it took effect.
    pub fn handle(&mut self, action: Action) -> bool {
        match action {
            Action::Move(dir) => {
                let outcome = self.run.try_move(dir);
                if let MoveOutcome::Rejected(reason) = outcome {
                    debug!(run = self.run.id().0, ?dir, ?reason, "move rejected");
                }
                outcome.accepted()
            }
            Action::Special => {
                if !self.run.activate_freeze() {
                    return false;
                }
                self.scheduler
                    .schedule(self.run.id(), TimerKind::FreezeExpired, FREEZE_SECS);
                true
            }
        }
    }

    /// Advances the run one fixed step, then fires due timers.
    pub fn tick(&mut self, dt: f32) -> Result<Vec<RunEvent>> {
        let events = self.run.tick(dt);
        if events.iter().any(|e| matches!(e, RunEvent::Crashed { .. })) {
            self.scheduler.schedule(
                self.run.id(),
                TimerKind::ReportGameOver,
                GAME_OVER_DELAY_SECS,
            );
        }

        for timer in self.scheduler.advance(f64::from(dt)) {
            if timer.run != self.run.id() {
                debug!(
                    timer_run = timer.run.0,
                    current = self.run.id().0,
                    kind = ?timer.kind,
                    at = self.scheduler.now(),
                    "stale timer dropped"
                );
                continue;
            }
            match timer.kind {
                TimerKind::FreezeExpired => {
                    if self.run.end_freeze() {
                        self.scheduler.schedule(
                            timer.run,
                            TimerKind::CooldownElapsed,
                            COOLDOWN_SECS,
                        );
                    }
                }
                TimerKind::CooldownElapsed => {
                    self.run.end_cooldown();
                }
                TimerKind::ReportGameOver => self.report()?,
            }
        }
        Ok(events)
    }

    fn report(&mut self) -> Result<()> {
        let Some(result) = self.run.finish() else {
            return Ok(());
        };
        let unlocks = unlocks_for(
            result.score,
            &self.profile.unlocked_skins,
            self.profile.equipped,
        );
        let report = RunReport {
            run: result.run,
            skin: result.skin,
            score: result.score,
            coins_earned: result.coins_earned,
            unlocked: unlocks.unlocked,
            equip: unlocks.equip,
        };
        self.profile.apply(&report, Utc::now());
        info!(
            run = report.run.0,
            score = report.score,
            coins = report.coins_earned,
            unlocked = ?report.unlocked,
            "run reported"
        );
        self.last_report = Some(report);

        let saved = self.profiles.save(&self.profile);
        if let Err(err) = &saved {
            warn!(%err, "profile save failed");
        }
        self.board
            .submit(&self.profile.name, result.score, result.skin)?;
        saved
    }

    /// True once the finished run has been reported, or when no run is going.
    pub fn can_restart(&self) -> bool {
        !self.run.is_active() && (self.run.is_reported() || !self.run.is_over())
    }

    /// Flushes a game-over report that is still waiting on its timer.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.run.is_over() && !self.run.is_reported() {
            self.report()?;
        }
        Ok(())
    }

    /// 0..1 while the freeze ability is cooling down.
    pub fn freeze_cooldown(&self) -> Option<f32> {
        self.scheduler
            .progress(self.run.id(), TimerKind::CooldownElapsed)
    }

    /// 0..1 while time is frozen.
    pub fn freeze_elapsed(&self) -> Option<f32> {
        self.scheduler
            .progress(self.run.id(), TimerKind::FreezeExpired)
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    pub fn ranking(&self, n: usize) -> Vec<RankingEntry> {
        self.board.top(n)
    }

    pub fn profiles(&self) -> &P {
        &self.profiles
    }

    pub fn board(&self) -> &B {
        &self.board
    }
}
