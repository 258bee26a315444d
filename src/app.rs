use crate::config::{save_settings_atomic, Paths, Settings};
use crate::input::{collect_input_nonblocking, Command};
use crate::model::{RunId, FIXED_DT, MAX_FRAME_DT};
use crate::profile::RankingEntry;
use crate::render::{draw_frame, Palette, Screen};
use crate::session::Session;
use crate::storage::{JsonProfileStore, JsonRankingBoard};
use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const PODIUM: usize = 3;

struct App {
    settings: Settings,
    session: Session<JsonProfileStore, JsonRankingBoard>,
    screen: Screen,
    palette: Palette,
    podium: Vec<RankingEntry>,
    podium_for: Option<RunId>,
    should_quit: bool,
}

impl App {
    fn init(settings: Settings, paths: &Paths) -> Result<Self> {
        let session = Session::new(
            JsonProfileStore::new(&paths.profile_path),
            JsonRankingBoard::new(&paths.ranking_path),
            settings.theme,
            settings.seed,
        );
        let palette = Palette::new(settings.theme, settings.enable_color);
        let screen = Screen::begin()?;
        Ok(Self {
            settings,
            session,
            screen,
            palette,
            podium: Vec::new(),
            podium_for: None,
            should_quit: false,
        })
    }

    fn run(&mut self) -> Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        self.session.start_run();
        let mut last = Instant::now();
        let mut acc = 0.0f32;

        while !self.should_quit {
            let frame_start = Instant::now();

            for cmd in collect_input_nonblocking(frame_dt)? {
                self.apply(cmd)?;
                if self.should_quit {
                    break;
                }
            }

            let now = Instant::now();
            let frame = (now - last).as_secs_f32().min(MAX_FRAME_DT);
            last = now;

            acc += frame;
            while acc >= FIXED_DT {
                if let Err(err) = self.session.tick(FIXED_DT) {
                    warn!("could not record run: {err:#}");
                }
                acc -= FIXED_DT;
            }
            self.refresh_podium();

            draw_frame(
                &mut self.screen.canvas,
                &self.session,
                &self.palette,
                &self.podium,
            );
            self.screen.present()?;

            spin_sleep(frame_dt, frame_start);
        }
        Ok(())
    }

    fn apply(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::Play(action) => {
                self.session.handle(action);
            }
            Command::Restart => {
                if self.session.can_restart() {
                    self.session.start_run();
                }
            }
            Command::Quit => self.should_quit = true,
            Command::Resized(w, h) => self.screen.resize(w, h)?,
        }
        Ok(())
    }

    fn refresh_podium(&mut self) {
        let Some(report) = self.session.last_report() else {
            return;
        };
        if self.podium_for != Some(report.run) {
            self.podium_for = Some(report.run);
            self.podium = self.session.ranking(PODIUM);
        }
    }
}

/// Plays until the player quits, then restores the terminal and persists settings.
pub fn run(settings: Settings, paths: &Paths) -> Result<()> {
    let mut app = App::init(settings, paths)?;
    let played = app.run();
    let restored = app.screen.end();
    let flushed = app.session.shutdown();
    info!(runs = app.session.runs_started(), "session closed");
    save_settings_atomic(&paths.settings_path, &app.settings)?;
    played?;
    restored?;
    flushed
}

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        if end - t > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
