use crate::model::{Capability, RunId};
use crate::skins::SkinId;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const RANKING_LIMIT: usize = 100;
const HACKER_CODE: &str = "/HACKER.7779";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub identity: String,
    pub name: String,
    pub coins: u32,
    pub high_score: u32,
    pub capabilities: BTreeSet<Capability>,
    pub unlocked_skins: BTreeSet<SkinId>,
    pub equipped: SkinId,
    pub last_played: Option<DateTime<Utc>>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            identity: "local".to_string(),
            name: "Capy".to_string(),
            coins: 0,
            high_score: 0,
            capabilities: BTreeSet::new(),
            unlocked_skins: [SkinId::Capy].into_iter().collect(),
            equipped: SkinId::Capy,
            last_played: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ShopItem {
    TimeFreeze,
    Axe,
    BlueCapy,
    BlackCapy,
    SuperCar,
}

enum Grant {
    Capability(Capability),
    Skin(SkinId),
}

impl ShopItem {
    pub fn price(self) -> u32 {
        match self {
            ShopItem::TimeFreeze => 50,
            ShopItem::Axe => 100,
            ShopItem::BlueCapy | ShopItem::BlackCapy => 60,
            ShopItem::SuperCar => 200,
        }
    }

    fn grant(self) -> Grant {
        match self {
            ShopItem::TimeFreeze => Grant::Capability(Capability::TimeFreeze),
            ShopItem::Axe => Grant::Capability(Capability::ChopObstacles),
            ShopItem::BlueCapy => Grant::Skin(SkinId::BlueCapy),
            ShopItem::BlackCapy => Grant::Skin(SkinId::BlackCapy),
            ShopItem::SuperCar => Grant::Skin(SkinId::SuperCar),
        }
    }
}

/// Outcome of one run as applied to the profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub run: RunId,
    pub skin: SkinId,
    pub score: u32,
    pub coins_earned: u32,
    pub unlocked: Vec<SkinId>,
    pub equip: Option<SkinId>,
}

impl Profile {
    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn apply(&mut self, report: &RunReport, at: DateTime<Utc>) {
        self.high_score = self.high_score.max(report.score);
        self.coins = self.coins.saturating_add(report.coins_earned);
        self.unlocked_skins.extend(report.unlocked.iter().copied());
        if let Some(skin) = report.equip {
            self.equipped = skin;
        }
        self.last_played = Some(at);
    }

    pub fn owns(&self, item: ShopItem) -> bool {
        match item.grant() {
            Grant::Capability(c) => self.has(c),
            Grant::Skin(s) => self.unlocked_skins.contains(&s),
        }
    }

    pub fn purchase(&mut self, item: ShopItem) -> Result<()> {
        if self.owns(item) {
            bail!("{item:?} is already owned");
        }
        let price = item.price();
        if self.coins < price {
            bail!("{item:?} costs {price} coins, you have {}", self.coins);
        }
        self.coins -= price;
        match item.grant() {
            Grant::Capability(c) => {
                self.capabilities.insert(c);
            }
            Grant::Skin(s) => {
                self.unlocked_skins.insert(s);
                self.equipped = s;
            }
        }
        Ok(())
    }

    pub fn equip(&mut self, skin: SkinId) -> Result<()> {
        if !self.unlocked_skins.contains(&skin) {
            bail!("{} is locked", skin.label());
        }
        self.equipped = skin;
        Ok(())
    }

    pub fn redeem(&mut self, code: &str) -> Result<SkinId> {
        if code.trim() != HACKER_CODE {
            bail!("invalid code");
        }
        if !self.unlocked_skins.insert(SkinId::HackerCapy) {
            bail!("code already used");
        }
        self.equipped = SkinId::HackerCapy;
        Ok(SkinId::HackerCapy)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub name: String,
    pub score: u32,
    pub skin: SkinId,
    pub recorded_at: DateTime<Utc>,
}

/// Best score per player name, highest first, capped at RANKING_LIMIT.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<RankingEntry>,
}

impl Leaderboard {
    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    pub fn top(&self, n: usize) -> &[RankingEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn record(&mut self, entry: RankingEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                if existing.score < entry.score {
                    *existing = entry;
                }
            }
            None => self.entries.push(entry),
        }
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
        self.entries.truncate(RANKING_LIMIT);
    }
}
