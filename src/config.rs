use crate::model::Theme;
use crate::storage::{read_json_or_default, write_json_atomic};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub fps_cap: u32,
    pub enable_color: bool,
    /// Fixed seed for reproducible lane layouts; None draws from entropy.
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Normal,
            fps_cap: 60,
            enable_color: true,
            seed: None,
        }
    }
}

impl Settings {
    /// Folds command-line flags into the saved settings. `clear_seed` wins over `seed`.
    pub fn apply_overrides(
        &mut self,
        theme: Option<Theme>,
        seed: Option<u64>,
        clear_seed: bool,
    ) {
        if let Some(theme) = theme {
            self.theme = theme;
        }
        if clear_seed {
            self.seed = None;
        } else if seed.is_some() {
            self.seed = seed;
        }
    }
}

pub struct Paths {
    pub settings_path: PathBuf,
    pub profile_path: PathBuf,
    pub ranking_path: PathBuf,
    pub log_path: PathBuf,
}

impl Paths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            settings_path: dir.join("settings.json"),
            profile_path: dir.join("profile.json"),
            ranking_path: dir.join("ranking.json"),
            log_path: dir.join("capy-road.log"),
        }
    }
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "capyroad", "CapyRoad")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir)
        .with_context(|| format!("could not create {}", dir.display()))?;
    Ok(Paths::in_dir(&dir))
}

pub fn load_settings(path: &Path) -> Settings {
    read_json_or_default(path)
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    write_json_atomic(path, s)
}

pub fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // rename-over-existing is not atomic on Windows; remove first there.
    if cfg!(windows) && to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
        .with_context(|| format!("could not move {} to {}", from.display(), to.display()))?;
    Ok(())
}
