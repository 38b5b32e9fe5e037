use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use super::{Discipline, ModMask};

/// Range computation strategies, in the order the orchestrator tries them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmKind {
    Conservative,
    Balanced,
    Aggressive,
    /// Simpler base/refined variant
    Base,
    Dynamic,
}

impl AlgorithmKind {
    /// Cheaper, narrower algorithms first
    pub const ORDER: [AlgorithmKind; 5] = [
        AlgorithmKind::Conservative,
        AlgorithmKind::Balanced,
        AlgorithmKind::Aggressive,
        AlgorithmKind::Base,
        AlgorithmKind::Dynamic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::Conservative => "Conservative",
            AlgorithmKind::Balanced => "Balanced",
            AlgorithmKind::Aggressive => "Aggressive",
            AlgorithmKind::Base => "Base",
            AlgorithmKind::Dynamic => "Dynamic",
        }
    }
}

impl Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlgorithmKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(AlgorithmKind::Conservative),
            "balanced" => Ok(AlgorithmKind::Balanced),
            "aggressive" => Ok(AlgorithmKind::Aggressive),
            "base" | "refined" => Ok(AlgorithmKind::Base),
            "dynamic" => Ok(AlgorithmKind::Dynamic),
            other => Err(format!("unknown algorithm '{}'", other)),
        }
    }
}

/// How a candidate's modifiers are compared with the requested ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModMatch {
    /// Same modifiers, ignoring neutral bits
    Exact,
    /// Requested modifiers present, extra ones allowed
    Superset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModRequirement {
    pub mask: ModMask,
    pub mode: ModMatch,
}

impl ModRequirement {
    pub fn exact(mask: ModMask) -> Self {
        Self {
            mask,
            mode: ModMatch::Exact,
        }
    }

    pub fn superset(mask: ModMask) -> Self {
        Self {
            mask,
            mode: ModMatch::Superset,
        }
    }

    pub fn is_satisfied_by(&self, mods: ModMask) -> bool {
        match self.mode {
            ModMatch::Exact => mods.without_neutral() == self.mask.without_neutral(),
            ModMatch::Superset => mods.contains(self.mask),
        }
    }
}

/// A player's request for a chart recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub discipline: Discipline,
    /// Algorithm to try alone before the full strategy
    pub algorithm: Option<AlgorithmKind>,
    /// Explicit reward value to aim for
    pub target_pp: Option<f64>,
    pub mods: Option<ModRequirement>,
    pub tempo: Option<f64>,
}

impl RecommendationRequest {
    pub fn new(discipline: Discipline) -> Self {
        Self {
            discipline,
            algorithm: None,
            target_pp: None,
            mods: None,
            tempo: None,
        }
    }

    /// Whether the index should only return scores that carry modifiers
    pub fn requires_mods(&self) -> bool {
        self.mods.map(|m| !m.mask.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("conservative".parse::<AlgorithmKind>().unwrap(), AlgorithmKind::Conservative);
        assert_eq!("Refined".parse::<AlgorithmKind>().unwrap(), AlgorithmKind::Base);
        assert!("greedy".parse::<AlgorithmKind>().is_err());
    }

    #[test]
    fn test_exact_ignores_neutral_bits() {
        let requirement = ModRequirement::exact(ModMask::HIDDEN);
        assert!(requirement.is_satisfied_by(ModMask::HIDDEN | ModMask::SUDDEN_DEATH));
        assert!(requirement.is_satisfied_by(ModMask::HIDDEN | ModMask::PERFECT | ModMask::SUDDEN_DEATH));
        assert!(!requirement.is_satisfied_by(ModMask::HIDDEN | ModMask::HARD_ROCK));
        assert!(!requirement.is_satisfied_by(ModMask::NONE));
    }

    #[test]
    fn test_superset_allows_extras() {
        let requirement = ModRequirement::superset(ModMask::DOUBLE_TIME);
        assert!(requirement.is_satisfied_by(ModMask::DOUBLE_TIME | ModMask::HIDDEN));
        assert!(requirement.is_satisfied_by(ModMask::DOUBLE_TIME | ModMask::NIGHTCORE));
        assert!(!requirement.is_satisfied_by(ModMask::HIDDEN));
    }

    #[test]
    fn test_requires_mods() {
        let mut request = RecommendationRequest::new(Discipline::Osu);
        assert!(!request.requires_mods());
        request.mods = Some(ModRequirement::exact(ModMask::NONE));
        assert!(!request.requires_mods());
        request.mods = Some(ModRequirement::superset(ModMask::HIDDEN));
        assert!(request.requires_mods());
    }
}
