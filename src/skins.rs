use crate::model::Capability;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const GOLDEN_UNLOCK_SCORE: u32 = 500;
pub const DIAMOND_UNLOCK_SCORE: u32 = 1000;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SkinId {
    #[default]
    Capy,
    GoldenCapy,
    BlueCapy,
    BlackCapy,
    DiamondCapy,
    HackerCapy,
    SuperCar,
}

impl SkinId {
    pub fn label(self) -> &'static str {
        match self {
            SkinId::Capy => "Classic",
            SkinId::GoldenCapy => "Golden God",
            SkinId::BlueCapy => "Sonic Capy",
            SkinId::BlackCapy => "Shadow Capy",
            SkinId::DiamondCapy => "Diamond",
            SkinId::HackerCapy => "HACKER.EXE",
            SkinId::SuperCar => "Super Car",
        }
    }
}

/// Gameplay effects of a skin, resolved once when a run starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkinModifiers {
    /// Fraction of a hop completed per simulation tick.
    pub move_speed: f32,
    /// Nearby vehicles jitter in place instead of travelling.
    pub neutralizes_traffic: bool,
    pub can_chop: bool,
}

const BASE: SkinModifiers = SkinModifiers {
    move_speed: 0.25,
    neutralizes_traffic: false,
    can_chop: false,
};

const QUICK: SkinModifiers = SkinModifiers {
    move_speed: 0.5,
    ..BASE
};

const SKIN_TABLE: [(SkinId, SkinModifiers); 7] = [
    (SkinId::Capy, BASE),
    (SkinId::GoldenCapy, QUICK),
    (SkinId::BlueCapy, QUICK),
    (SkinId::BlackCapy, QUICK),
    (SkinId::DiamondCapy, QUICK),
    (
        SkinId::HackerCapy,
        SkinModifiers {
            move_speed: 0.8,
            neutralizes_traffic: true,
            can_chop: false,
        },
    ),
    (
        SkinId::SuperCar,
        SkinModifiers {
            move_speed: 0.8,
            neutralizes_traffic: false,
            can_chop: true,
        },
    ),
];

pub fn modifiers(skin: SkinId) -> SkinModifiers {
    SKIN_TABLE
        .iter()
        .find(|(id, _)| *id == skin)
        .map(|(_, m)| *m)
        .unwrap_or(BASE)
}

/// Everything a run needs to know about the player's equipment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Loadout {
    pub skin: SkinId,
    pub modifiers: SkinModifiers,
    pub can_chop: bool,
    pub can_freeze: bool,
}

impl Loadout {
    pub fn resolve(skin: SkinId, capabilities: &BTreeSet<Capability>) -> Self {
        let modifiers = modifiers(skin);
        Self {
            skin,
            modifiers,
            can_chop: modifiers.can_chop || capabilities.contains(&Capability::ChopObstacles),
            can_freeze: capabilities.contains(&Capability::TimeFreeze),
        }
    }
}

impl Default for Loadout {
    fn default() -> Self {
        Self::resolve(SkinId::Capy, &BTreeSet::new())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Unlocks {
    pub unlocked: Vec<SkinId>,
    /// Skin to switch to, when it differs from the equipped one.
    pub equip: Option<SkinId>,
}

/// Score-threshold unlocks earned by a finished run.
pub fn unlocks_for(score: u32, owned: &BTreeSet<SkinId>, equipped: SkinId) -> Unlocks {
    let mut out = Unlocks::default();
    let mut current = equipped;

    if score >= DIAMOND_UNLOCK_SCORE && !owned.contains(&SkinId::DiamondCapy) {
        out.unlocked.push(SkinId::DiamondCapy);
        current = SkinId::DiamondCapy;
    }
    if score >= GOLDEN_UNLOCK_SCORE && !owned.contains(&SkinId::GoldenCapy) {
        out.unlocked.push(SkinId::GoldenCapy);
        if !matches!(current, SkinId::DiamondCapy | SkinId::HackerCapy) {
            current = SkinId::GoldenCapy;
        }
    }

    if current != equipped {
        out.equip = Some(current);
    }
    out
}
