use crate::lanes::{LaneKind, Obstacle, VehicleSize};
use crate::model::{Direction, Theme, HOP_HEIGHT, MAX_TILE, MIN_TILE, TILE_SIZE};
use crate::profile::RankingEntry;
use crate::session::Session;
use crate::sim::{FreezeGate, Player, RunPhase};
use crate::skins::SkinId;
use crate::storage::{ProfileStore, RankingBoard};
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Stdout, Write};

const HUD_ROWS: u16 = 2;
const FOOTER_ROWS: u16 = 1;
/// Lanes kept visible below the player.
const TRAIL_ROWS: i32 = 4;
const COLS_PER_TILE: f32 = 3.0;
const MIN_COLS: u16 = 44;
const MIN_ROWS: u16 = 12;

#[derive(Clone, Copy, PartialEq)]
pub(crate) struct FrameCell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

const BLANK: FrameCell = FrameCell {
    ch: ' ',
    fg: Color::White,
    bg: Color::Black,
};

/// Double-buffered cell grid; only changed cells are written out.
pub(crate) struct Canvas {
    pub(crate) w: u16,
    pub(crate) h: u16,
    prev: Vec<FrameCell>,
    cur: Vec<FrameCell>,
}

impl Canvas {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        let n = (w as usize) * (h as usize);
        Self {
            w,
            h,
            prev: vec![BLANK; n],
            cur: vec![BLANK; n],
        }
    }

    pub(crate) fn clear_to(&mut self, fg: Color, bg: Color) {
        for c in &mut self.cur {
            *c = FrameCell { ch: ' ', fg, bg };
        }
    }

    pub(crate) fn get(&self, x: u16, y: u16) -> Option<FrameCell> {
        if x >= self.w || y >= self.h {
            return None;
        }
        Some(self.cur[(y as usize) * (self.w as usize) + (x as usize)])
    }

    pub(crate) fn put(&mut self, x: i32, y: i32, ch: char, fg: Color, bg: Color) {
        if x < 0 || y < 0 || x >= self.w as i32 || y >= self.h as i32 {
            return;
        }
        let i = (y as usize) * (self.w as usize) + (x as usize);
        self.cur[i] = FrameCell { ch, fg, bg };
    }

    /// Replaces the glyph and foreground, keeping whatever background is there.
    pub(crate) fn put_fg(&mut self, x: i32, y: i32, ch: char, fg: Color) {
        let (Ok(cx), Ok(cy)) = (u16::try_from(x), u16::try_from(y)) else {
            return;
        };
        if let Some(cell) = self.get(cx, cy) {
            self.put(x, y, ch, fg, cell.bg);
        }
    }

    pub(crate) fn put_str(&mut self, x: i32, y: i32, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            self.put(x + i as i32, y, ch, fg, bg);
        }
    }

    fn flush_diff(&mut self, out: &mut Stdout) -> io::Result<()> {
        queue!(out, BeginSynchronizedUpdate)?;
        let mut cur_fg = None::<Color>;
        let mut cur_bg = None::<Color>;

        for y in 0..self.h {
            let row_off = (y as usize) * (self.w as usize);
            for x in 0..self.w {
                let i = row_off + (x as usize);
                let a = self.cur[i];
                if a == self.prev[i] {
                    continue;
                }
                queue!(out, cursor::MoveTo(x, y))?;
                if cur_fg != Some(a.fg) {
                    queue!(out, SetForegroundColor(a.fg))?;
                    cur_fg = Some(a.fg);
                }
                if cur_bg != Some(a.bg) {
                    queue!(out, SetBackgroundColor(a.bg))?;
                    cur_bg = Some(a.bg);
                }
                queue!(out, Print(a.ch))?;
            }
        }

        queue!(out, ResetColor, EndSynchronizedUpdate)?;
        out.flush()?;
        self.prev.copy_from_slice(&self.cur);
        Ok(())
    }
}

/// Alternate screen in raw mode for the lifetime of a play session.
pub(crate) struct Screen {
    out: Stdout,
    pub(crate) canvas: Canvas,
}

impl Screen {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;
        let (w, h) = terminal::size()?;
        Ok(Self {
            out,
            canvas: Canvas::new(w, h),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        execute!(
            self.out,
            ResetColor,
            terminal::Clear(ClearType::All),
            EnableLineWrap,
            cursor::Show,
            LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize(&mut self, w: u16, h: u16) -> anyhow::Result<()> {
        if (w, h) == (self.canvas.w, self.canvas.h) {
            return Ok(());
        }
        self.canvas = Canvas::new(w, h);
        execute!(self.out, terminal::Clear(ClearType::All))?;
        Ok(())
    }

    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        self.canvas.flush_diff(&mut self.out)?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
pub(crate) struct Palette {
    hud_fg: Color,
    hud_bg: Color,
    accent_fg: Color,
    grass_bg: Color,
    grass_alt_bg: Color,
    road_bg: Color,
    mark_fg: Color,
    verge_bg: Color,
    edge_bg: Color,
    void_bg: Color,
    tree_fg: Color,
    stump_fg: Color,
    car_fg: Color,
    truck_fg: Color,
    crash_fg: Color,
}

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

impl Palette {
    pub(crate) fn new(theme: Theme, color: bool) -> Self {
        if !color {
            return Self::mono();
        }
        match theme {
            Theme::Normal => Self {
                hud_fg: rgb(230, 240, 230),
                hud_bg: rgb(12, 18, 14),
                accent_fg: rgb(255, 220, 120),
                grass_bg: rgb(52, 120, 48),
                grass_alt_bg: rgb(60, 132, 54),
                road_bg: rgb(48, 48, 56),
                mark_fg: rgb(200, 200, 180),
                verge_bg: rgb(70, 92, 40),
                edge_bg: rgb(28, 60, 26),
                void_bg: rgb(8, 10, 12),
                tree_fg: rgb(20, 70, 24),
                stump_fg: rgb(140, 100, 60),
                car_fg: rgb(240, 80, 70),
                truck_fg: rgb(90, 150, 240),
                crash_fg: rgb(255, 255, 255),
            },
            Theme::Volcano => Self {
                hud_fg: rgb(255, 210, 170),
                hud_bg: rgb(20, 8, 6),
                accent_fg: rgb(255, 150, 60),
                grass_bg: rgb(62, 40, 34),
                grass_alt_bg: rgb(72, 46, 38),
                road_bg: rgb(30, 22, 22),
                mark_fg: rgb(255, 110, 40),
                verge_bg: rgb(110, 40, 20),
                edge_bg: rgb(150, 40, 10),
                void_bg: rgb(10, 4, 4),
                tree_fg: rgb(20, 12, 10),
                stump_fg: rgb(160, 90, 60),
                car_fg: rgb(255, 200, 60),
                truck_fg: rgb(255, 90, 40),
                crash_fg: rgb(255, 255, 200),
            },
        }
    }

    fn mono() -> Self {
        Self {
            hud_fg: Color::White,
            hud_bg: Color::Black,
            accent_fg: Color::White,
            grass_bg: Color::Black,
            grass_alt_bg: Color::Black,
            road_bg: Color::Black,
            mark_fg: Color::Grey,
            verge_bg: Color::Black,
            edge_bg: Color::Black,
            void_bg: Color::Black,
            tree_fg: Color::White,
            stump_fg: Color::Grey,
            car_fg: Color::White,
            truck_fg: Color::White,
            crash_fg: Color::White,
        }
    }
}

fn skin_color(skin: SkinId) -> Color {
    match skin {
        SkinId::Capy => rgb(170, 120, 70),
        SkinId::GoldenCapy => rgb(255, 210, 60),
        SkinId::BlueCapy => rgb(60, 140, 255),
        SkinId::BlackCapy => rgb(30, 30, 30),
        SkinId::DiamondCapy => rgb(170, 240, 255),
        SkinId::HackerCapy => rgb(0, 255, 90),
        SkinId::SuperCar => rgb(230, 30, 40),
    }
}

fn facing_glyph(dir: Direction) -> char {
    match dir {
        Direction::Forward => '▲',
        Direction::Backward => '▼',
        Direction::Left => '◀',
        Direction::Right => '▶',
    }
}

/// Maps world coordinates onto terminal cells. The player's lane sits
/// TRAIL_ROWS above the footer and the grid centre sits mid-screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Camera {
    cols: u16,
    rows: u16,
    focus_y: f32,
}

impl Camera {
    pub(crate) fn follow(cols: u16, rows: u16, player: &Player) -> Self {
        Self {
            cols,
            rows,
            focus_y: player.y,
        }
    }

    fn anchor_line(&self) -> i32 {
        self.rows as i32 - FOOTER_ROWS as i32 - 1 - TRAIL_ROWS
    }

    pub(crate) fn line_for_y(&self, y: f32) -> i32 {
        self.anchor_line() - ((y - self.focus_y) / TILE_SIZE).round() as i32
    }

    /// Lane row shown on a terminal line.
    pub(crate) fn row_for_line(&self, line: i32) -> i64 {
        let focus_row = (self.focus_y / TILE_SIZE).round() as i64;
        focus_row + (self.anchor_line() - line) as i64
    }

    pub(crate) fn col_for_x(&self, x: f32) -> i32 {
        self.cols as i32 / 2 + (x / TILE_SIZE * COLS_PER_TILE).round() as i32
    }
}

/// Text gauge for a 0..1 value.
pub(crate) fn gauge(progress: f32, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    let mut s = String::with_capacity(width * 3);
    s.extend(std::iter::repeat('█').take(filled));
    s.extend(std::iter::repeat('░').take(width - filled));
    s
}

pub(crate) fn draw_frame<P: ProfileStore, B: RankingBoard>(
    c: &mut Canvas,
    session: &Session<P, B>,
    pal: &Palette,
    ranking: &[RankingEntry],
) {
    c.clear_to(pal.hud_fg, pal.void_bg);
    if c.w < MIN_COLS || c.h < MIN_ROWS {
        c.put_str(0, 0, "Terminal too small.", pal.hud_fg, pal.void_bg);
        c.put_str(0, 1, "Try at least 44x12.", pal.hud_fg, pal.void_bg);
        return;
    }

    let run = session.run();
    let cam = Camera::follow(c.w, c.h, run.player());
    draw_lanes(c, session, pal, &cam);
    draw_player(c, session, pal, &cam);
    draw_hud(c, session, pal);

    if run.is_over() {
        draw_game_over(c, session, pal, ranking);
    }
}

fn draw_lanes<P: ProfileStore, B: RankingBoard>(
    c: &mut Canvas,
    session: &Session<P, B>,
    pal: &Palette,
    cam: &Camera,
) {
    let world = session.run().world();
    let left_edge = cam.col_for_x((MIN_TILE as f32 - 0.5) * TILE_SIZE);
    let right_edge = cam.col_for_x((MAX_TILE as f32 + 0.5) * TILE_SIZE);

    for line in HUD_ROWS as i32..(c.h - FOOTER_ROWS) as i32 {
        let row = cam.row_for_line(line);
        let lane = u32::try_from(row).ok().and_then(|r| world.lane(r));

        let bg = match lane.map(|l| &l.kind) {
            Some(LaneKind::Road(_)) => pal.road_bg,
            Some(LaneKind::Grass) if row % 2 == 0 => pal.grass_bg,
            Some(LaneKind::Grass) => pal.grass_alt_bg,
            None if row < 0 => pal.verge_bg,
            None => pal.void_bg,
        };
        for x in 0..c.w as i32 {
            let off_grid = x < left_edge || x >= right_edge;
            let cell_bg = if off_grid && lane.is_some_and(|l| !l.is_road()) {
                pal.edge_bg
            } else {
                bg
            };
            c.put(x, line, ' ', pal.mark_fg, cell_bg);
        }

        let Some(lane) = lane else {
            continue;
        };
        match &lane.kind {
            LaneKind::Grass => {
                for (tile, obstacle) in world.obstacles_in(lane.row) {
                    let x = cam.col_for_x(tile as f32 * TILE_SIZE);
                    match obstacle {
                        Obstacle::Standing => c.put_fg(x, line, '♣', pal.tree_fg),
                        Obstacle::Felled => c.put_fg(x, line, '¸', pal.stump_fg),
                    }
                }
            }
            LaneKind::Road(traffic) => {
                for x in (0..c.w as i32).step_by(4) {
                    c.put_fg(x, line, '·', pal.mark_fg);
                }
                for v in &traffic.vehicles {
                    let half = v.size.body_len() / 2.0;
                    let x0 = cam.col_for_x(v.x - half);
                    let x1 = cam.col_for_x(v.x + half);
                    let fg = match v.size {
                        VehicleSize::Car => pal.car_fg,
                        VehicleSize::Truck => pal.truck_fg,
                    };
                    for x in x0..=x1 {
                        c.put_fg(x, line, '█', fg);
                    }
                }
            }
        }
    }
}

fn draw_player<P: ProfileStore, B: RankingBoard>(
    c: &mut Canvas,
    session: &Session<P, B>,
    pal: &Palette,
    cam: &Camera,
) {
    let run = session.run();
    let p = run.player();
    let x = cam.col_for_x(p.x);
    let line = cam.line_for_y(p.y);
    if run.phase() == RunPhase::GameOver {
        c.put_fg(x, line, '✖', pal.crash_fg);
        return;
    }
    c.put_fg(x, line, facing_glyph(p.facing), skin_color(run.loadout().skin));
    // airborne for the middle of a hop
    if p.hop > 0.5 * HOP_HEIGHT {
        c.put_fg(x, line + 1, '˙', pal.hud_fg);
    }
}

fn draw_hud<P: ProfileStore, B: RankingBoard>(
    c: &mut Canvas,
    session: &Session<P, B>,
    pal: &Palette,
) {
    let run = session.run();
    let profile = session.profile();
    for y in 0..HUD_ROWS as i32 {
        for x in 0..c.w as i32 {
            c.put(x, y, ' ', pal.hud_fg, pal.hud_bg);
        }
    }

    let line = format!(
        " CAPY ROAD  score {}  best {}  coins {} (+{})  {}  [{}]",
        run.score(),
        profile.high_score.max(run.score()),
        profile.coins,
        run.coins_earned(),
        run.loadout().skin.label(),
        run.theme().name(),
    );
    c.put_str(0, 0, &line, pal.hud_fg, pal.hud_bg);

    let freeze = if !run.loadout().can_freeze {
        String::new()
    } else {
        match run.freeze_gate() {
            FreezeGate::Ready => " freeze ready [space]".to_string(),
            FreezeGate::Active => {
                let left = 1.0 - session.freeze_elapsed().unwrap_or(1.0);
                format!(" FROZEN {}", gauge(left, 10))
            }
            FreezeGate::Cooling => {
                let p = session.freeze_cooldown().unwrap_or(1.0);
                format!(" recharging {}", gauge(p, 10))
            }
        }
    };
    let axe = if run.loadout().can_chop { "  axe" } else { "" };
    c.put_str(0, 1, &format!("{freeze}{axe}"), pal.accent_fg, pal.hud_bg);

    let footer = " arrows/WASD hop  space freeze  r restart  q quit";
    let y = c.h as i32 - 1;
    for x in 0..c.w as i32 {
        c.put(x, y, ' ', pal.hud_fg, pal.hud_bg);
    }
    c.put_str(0, y, footer, pal.hud_fg, pal.hud_bg);
}

fn draw_game_over<P: ProfileStore, B: RankingBoard>(
    c: &mut Canvas,
    session: &Session<P, B>,
    pal: &Palette,
    ranking: &[RankingEntry],
) {
    let run = session.run();
    let mut body = vec![
        format!("Score {}   coins +{}", run.score(), run.coins_earned()),
        String::new(),
    ];
    if let Some(report) = session.last_report() {
        for skin in &report.unlocked {
            body.push(format!("Unlocked: {}", skin.label()));
        }
        if !report.unlocked.is_empty() {
            body.push(String::new());
        }
        body.push("Top runners".to_string());
        for (i, e) in ranking.iter().take(3).enumerate() {
            body.push(format!("{}. {:<12} {:>5}", i + 1, e.name, e.score));
        }
        body.push(String::new());
    }
    if session.can_restart() {
        body.push("r play again   q quit".to_string());
    }
    draw_center_box(c, "SPLAT!", &body, pal);
}

fn draw_center_box(c: &mut Canvas, title: &str, body: &[String], pal: &Palette) {
    let bw = 36.min(c.w as i32 - 2);
    let bh = (body.len() as i32 + 4).min(c.h as i32 - 2);
    let x0 = (c.w as i32 - bw) / 2;
    let y0 = (c.h as i32 - bh) / 2;

    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            let top_or_bottom = y == y0 || y == y0 + bh - 1;
            let side = x == x0 || x == x0 + bw - 1;
            let ch = match (top_or_bottom, side) {
                (true, true) => match (y == y0, x == x0) {
                    (true, true) => '┌',
                    (true, false) => '┐',
                    (false, true) => '└',
                    (false, false) => '┘',
                },
                (true, false) => '─',
                (false, true) => '│',
                (false, false) => ' ',
            };
            c.put(x, y, ch, pal.hud_fg, pal.hud_bg);
        }
    }
    c.put_str(x0 + 2, y0 + 1, title, pal.accent_fg, pal.hud_bg);
    for (i, line) in body.iter().enumerate() {
        let y = y0 + 3 + i as i32;
        if y >= y0 + bh - 1 {
            break;
        }
        let text: String = line.chars().take((bw - 4).max(0) as usize).collect();
        c.put_str(x0 + 2, y, &text, pal.hud_fg, pal.hud_bg);
    }
}
