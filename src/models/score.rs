use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use super::ModMask;

/// Worst precision tier an indexed record can carry
pub const MAX_PRECISION_TIER: u8 = 9;

/// Game mode a score was set in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    Osu,
    Taiko,
    Catch,
    Mania,
}

impl Discipline {
    pub const ALL: [Discipline; 4] = [
        Discipline::Osu,
        Discipline::Taiko,
        Discipline::Catch,
        Discipline::Mania,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::Osu => "osu",
            Discipline::Taiko => "taiko",
            Discipline::Catch => "catch",
            Discipline::Mania => "mania",
        }
    }

    /// Mode name understood by the game API
    pub fn api_mode(&self) -> &'static str {
        match self {
            Discipline::Catch => "fruits",
            other => other.as_str(),
        }
    }
}

impl Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Discipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "osu" | "std" | "standard" => Ok(Discipline::Osu),
            "taiko" => Ok(Discipline::Taiko),
            "catch" | "fruits" | "ctb" => Ok(Discipline::Catch),
            "mania" => Ok(Discipline::Mania),
            other => Err(format!("unknown discipline '{}'", other)),
        }
    }
}

/// A community score observed on a chart, as stored in the score index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub score_id: u64,
    pub beatmap_id: u32,
    /// Reward value (PP) of the score
    pub pp: f64,
    pub mods: ModMask,
    /// 1 = highest confidence, 9 = lowest
    pub precision: u8,
    pub tempo: f64,
    pub date: DateTime<Utc>,
}

impl ScoreRecord {
    /// Key of the hash holding this record in the index store
    pub fn index_key(&self) -> String {
        format!("score:{}", self.score_id)
    }
}
