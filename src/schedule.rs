use crate::model::RunId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    FreezeExpired,
    CooldownElapsed,
    ReportGameOver,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scheduled {
    pub run: RunId,
    pub kind: TimerKind,
    pub scheduled_at: f64,
    pub due: f64,
}

/// Deferred events on the simulation clock. Entries are never cancelled;
/// whoever drains them checks `run` against the current run and drops stale ones.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    now: f64,
    pending: Vec<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn schedule(&mut self, run: RunId, kind: TimerKind, delay_secs: f64) {
        self.pending.push(Scheduled {
            run,
            kind,
            scheduled_at: self.now,
            due: self.now + delay_secs.max(0.0),
        });
    }

    /// Moves the clock forward and returns everything that came due, earliest first.
    pub fn advance(&mut self, dt: f64) -> Vec<Scheduled> {
        self.now += dt.max(0.0);
        let now = self.now;
        let (mut due, rest): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|s| s.due <= now);
        self.pending = rest;
        due.sort_by(|a, b| a.due.total_cmp(&b.due));
        due
    }

    /// 0..1 progress of the pending timer of this kind for this run.
    pub fn progress(&self, run: RunId, kind: TimerKind) -> Option<f32> {
        self.pending
            .iter()
            .find(|s| s.run == run && s.kind == kind)
            .map(|s| {
                let span = s.due - s.scheduled_at;
                if span <= 0.0 {
                    1.0
                } else {
                    ((self.now - s.scheduled_at) / span).clamp(0.0, 1.0) as f32
                }
            })
    }
}
