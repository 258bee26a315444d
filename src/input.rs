use crate::model::Direction;
use crate::session::Action;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Play(Action),
    Restart,
    Quit,
    Resized(u16, u16),
}

pub fn collect_input_nonblocking(max_wait: Duration) -> anyhow::Result<Vec<Command>> {
    let mut out = Vec::new();
    let timeout = std::cmp::min(Duration::from_millis(1), max_wait);
    while event::poll(timeout)? {
        match event::read()? {
            Event::Key(k) if k.kind != KeyEventKind::Release => {
                if let Some(cmd) = map_key(k) {
                    out.push(cmd);
                }
            }
            Event::Resize(w, h) => out.push(Command::Resized(w, h)),
            _ => {}
        }
        if out.len() >= 32 {
            break;
        }
    }
    Ok(out)
}

pub fn map_key(k: KeyEvent) -> Option<Command> {
    if k.modifiers.contains(KeyModifiers::CONTROL) {
        return match k.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(Command::Quit),
            _ => None,
        };
    }
    let dir = |d| Some(Command::Play(Action::Move(d)));
    match k.code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => dir(Direction::Forward),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => dir(Direction::Backward),
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => dir(Direction::Left),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => dir(Direction::Right),
        KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('e') | KeyCode::Char('E') => {
            Some(Command::Play(Action::Special))
        }
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::Restart),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}
