use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::models::{ModRequirement, ScoreRecord};

/// Default precision ceiling for tiered selection
pub const DEFAULT_SELECTION_CEILING: u8 = 8;

/// Charts a player must not be offered in this request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionSet {
    top_charts: HashSet<u32>,
    recently_suggested: HashSet<u32>,
}

impl ExclusionSet {
    pub fn new(top_charts: HashSet<u32>, recently_suggested: HashSet<u32>) -> Self {
        Self {
            top_charts,
            recently_suggested,
        }
    }

    pub fn contains(&self, beatmap_id: u32) -> bool {
        self.top_charts.contains(&beatmap_id) || self.recently_suggested.contains(&beatmap_id)
    }

    pub fn len(&self) -> usize {
        self.top_charts.union(&self.recently_suggested).count()
    }

    pub fn is_empty(&self) -> bool {
        self.top_charts.is_empty() && self.recently_suggested.is_empty()
    }
}

/// Drops excluded charts and incompatible modifiers.
///
/// Every surviving record is kept, including several scores on the same
/// chart, ordered by precision tier, best first.
pub fn filter_candidates(
    hits: Vec<ScoreRecord>,
    exclusion: &ExclusionSet,
    mods: Option<&ModRequirement>,
) -> Vec<ScoreRecord> {
    let mut candidates: Vec<ScoreRecord> = hits
        .into_iter()
        .filter(|r| !exclusion.contains(r.beatmap_id))
        .filter(|r| mods.map(|m| m.is_satisfied_by(r.mods)).unwrap_or(true))
        .collect();

    candidates.sort_by_key(|r| r.precision);
    candidates
}

/// Keeps the most precise record of each chart
pub fn best_per_chart(mut records: Vec<ScoreRecord>) -> Vec<ScoreRecord> {
    records.sort_by_key(|r| r.precision);
    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.beatmap_id));
    records
}

/// Picks uniformly at random among the candidates of the best populated precision tier
pub fn select_by_precision<R: Rng + ?Sized>(
    candidates: &[ScoreRecord],
    max_tier: u8,
    rng: &mut R,
) -> Option<ScoreRecord> {
    (1..=max_tier).find_map(|tier| {
        let in_tier: Vec<&ScoreRecord> = candidates.iter().filter(|r| r.precision == tier).collect();
        in_tier.choose(rng).map(|r| (*r).clone())
    })
}
