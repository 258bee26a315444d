//! Endless lane-crossing game: a capybara hops forward across procedurally
//! generated grass and road lanes until a vehicle hits it.
//!
//! The simulation core (`lanes`, `sim`, `schedule`, `session`) is
//! terminal-free and deterministic under a seeded RNG; `app`, `input` and
//! `render` drive it from a crossterm loop.

pub mod app;
pub mod config;
pub mod input;
pub mod lanes;
pub mod model;
pub mod profile;
mod render;
pub mod schedule;
pub mod session;
pub mod sim;
pub mod skins;
pub mod storage;
