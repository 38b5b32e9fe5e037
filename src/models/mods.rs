use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::BitOr;

use crate::error::{AppError, AppResult};

/// Gameplay modifiers encoded as the game's legacy bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModMask(pub u32);

/// Acronym table in canonical display order
const ACRONYMS: [(&str, ModMask); 13] = [
    ("NF", ModMask::NO_FAIL),
    ("EZ", ModMask::EASY),
    ("TD", ModMask::TOUCH_DEVICE),
    ("HD", ModMask::HIDDEN),
    ("HR", ModMask::HARD_ROCK),
    ("SD", ModMask::SUDDEN_DEATH),
    ("DT", ModMask::DOUBLE_TIME),
    ("RX", ModMask::RELAX),
    ("HT", ModMask::HALF_TIME),
    ("NC", ModMask::NIGHTCORE),
    ("FL", ModMask::FLASHLIGHT),
    ("SO", ModMask::SPUN_OUT),
    ("PF", ModMask::PERFECT),
];

impl ModMask {
    pub const NONE: ModMask = ModMask(0);
    pub const NO_FAIL: ModMask = ModMask(1);
    pub const EASY: ModMask = ModMask(1 << 1);
    pub const TOUCH_DEVICE: ModMask = ModMask(1 << 2);
    pub const HIDDEN: ModMask = ModMask(1 << 3);
    pub const HARD_ROCK: ModMask = ModMask(1 << 4);
    pub const SUDDEN_DEATH: ModMask = ModMask(1 << 5);
    pub const DOUBLE_TIME: ModMask = ModMask(1 << 6);
    pub const RELAX: ModMask = ModMask(1 << 7);
    pub const HALF_TIME: ModMask = ModMask(1 << 8);
    pub const NIGHTCORE: ModMask = ModMask(1 << 9);
    pub const FLASHLIGHT: ModMask = ModMask(1 << 10);
    pub const SPUN_OUT: ModMask = ModMask(1 << 12);
    pub const PERFECT: ModMask = ModMask(1 << 14);

    /// Bits that never change a score's reward value
    pub const NEUTRAL: ModMask = ModMask(Self::SUDDEN_DEATH.0 | Self::PERFECT.0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`
    pub const fn contains(self, other: ModMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without_neutral(self) -> ModMask {
        ModMask(self.0 & !Self::NEUTRAL.0)
    }

    /// Playback rate implied by the speed-changing modifiers
    pub fn tempo(self) -> f64 {
        if self.contains(Self::DOUBLE_TIME) || self.contains(Self::NIGHTCORE) {
            1.5
        } else if self.contains(Self::HALF_TIME) {
            0.75
        } else {
            1.0
        }
    }

    /// Parses a concatenated acronym string such as `HDDT` or `NM`
    pub fn from_acronyms(input: &str) -> AppResult<Self> {
        let cleaned: String = input
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();

        if cleaned.len() % 2 != 0 {
            return Err(AppError::InvalidInput(format!(
                "Malformed modifier string: {}",
                input
            )));
        }

        let parts: Vec<String> = cleaned
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect();

        Self::from_acronym_list(&parts)
    }

    /// Parses a list of acronyms, as returned by the game API
    pub fn from_acronym_list<S: AsRef<str>>(acronyms: &[S]) -> AppResult<Self> {
        let mut mask = ModMask::NONE;
        for acronym in acronyms {
            let acronym = acronym.as_ref().to_uppercase();
            if acronym == "NM" {
                continue;
            }
            let bit = ACRONYMS
                .iter()
                .find(|(name, _)| *name == acronym)
                .map(|(_, bit)| *bit)
                .ok_or_else(|| AppError::InvalidInput(format!("Unknown modifier: {}", acronym)))?;
            mask = mask | bit;
            // The API encodes NC and PF together with the mod they imply
            if bit == Self::NIGHTCORE {
                mask = mask | Self::DOUBLE_TIME;
            } else if bit == Self::PERFECT {
                mask = mask | Self::SUDDEN_DEATH;
            }
        }
        Ok(mask)
    }
}

impl BitOr for ModMask {
    type Output = ModMask;

    fn bitor(self, rhs: ModMask) -> ModMask {
        ModMask(self.0 | rhs.0)
    }
}

impl Display for ModMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "NM");
        }
        for (name, bit) in ACRONYMS {
            // implied bits are hidden behind the mod that implies them
            if bit == Self::DOUBLE_TIME && self.contains(Self::NIGHTCORE) {
                continue;
            }
            if bit == Self::SUDDEN_DEATH && self.contains(Self::PERFECT) {
                continue;
            }
            if self.contains(bit) {
                write!(f, "{}", name)?;
            }
        }
        Ok(())
    }
}
