use crate::config::atomic_rename;
use crate::profile::{Leaderboard, Profile, RankingEntry};
use crate::skins::SkinId;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

/// Where the profile lives between runs.
pub trait ProfileStore {
    fn load(&self) -> Profile;
    fn save(&mut self, profile: &Profile) -> Result<()>;
}

/// Receives one score per finished run.
pub trait RankingBoard {
    fn submit(&mut self, name: &str, score: u32, skin: SkinId) -> Result<()>;
    fn top(&self, n: usize) -> Vec<RankingEntry>;
}

/// Missing or unreadable files yield `T::default()`.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let Ok(s) = fs::read_to_string(path) else {
        return T::default();
    };
    match serde_json::from_str::<T>(&s) {
        Ok(v) => v,
        Err(err) => {
            warn!(path = %path.display(), %err, "discarding unreadable file");
            T::default()
        }
    }
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, data).with_context(|| format!("could not write {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Profile {
        read_json_or_default(&self.path)
    }

    fn save(&mut self, profile: &Profile) -> Result<()> {
        write_json_atomic(&self.path, profile)
    }
}

/// Re-reads the file on every call so concurrent sessions do not clobber each other's entries.
pub struct JsonRankingBoard {
    path: PathBuf,
}

impl JsonRankingBoard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RankingBoard for JsonRankingBoard {
    fn submit(&mut self, name: &str, score: u32, skin: SkinId) -> Result<()> {
        let mut board: Leaderboard = read_json_or_default(&self.path);
        board.record(RankingEntry {
            name: name.to_string(),
            score,
            skin,
            recorded_at: Utc::now(),
        });
        write_json_atomic(&self.path, &board)
    }

    fn top(&self, n: usize) -> Vec<RankingEntry> {
        read_json_or_default::<Leaderboard>(&self.path)
            .top(n)
            .to_vec()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryProfileStore {
    pub profile: Profile,
    pub saves: u32,
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self) -> Profile {
        self.profile.clone()
    }

    fn save(&mut self, profile: &Profile) -> Result<()> {
        self.profile = profile.clone();
        self.saves += 1;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryRankingBoard {
    pub board: Leaderboard,
    pub submissions: u32,
}

impl RankingBoard for MemoryRankingBoard {
    fn submit(&mut self, name: &str, score: u32, skin: SkinId) -> Result<()> {
        self.board.record(RankingEntry {
            name: name.to_string(),
            score,
            skin,
            recorded_at: Utc::now(),
        });
        self.submissions += 1;
        Ok(())
    }

    fn top(&self, n: usize) -> Vec<RankingEntry> {
        self.board.top(n).to_vec()
    }
}
