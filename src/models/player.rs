use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::{Discipline, ModMask};

/// Number of best scores that count toward a player's rating
pub const TOP_SCORE_LIMIT: usize = 100;

/// Per-rank decay applied to the weighted rating sum
const RANK_WEIGHT_DECAY: f64 = 0.95;

/// Player as resolved by the profile lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: u64,
    pub display_name: String,
    pub locale: String,
    /// Total rating (PP) of the player
    pub current_rating: f64,
}

/// One of the player's best scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopScore {
    pub score_id: u64,
    pub beatmap_id: u32,
    pub pp: f64,
    /// Accuracy in percent (0-100)
    pub accuracy: f64,
    pub mods: ModMask,
    pub star_rating: f64,
    pub date: DateTime<Utc>,
}

/// A dated point of the player's score history, as fed to progression analysis
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub pp: f64,
    pub date: DateTime<Utc>,
    pub accuracy: f64,
    pub mods: ModMask,
    pub star_rating: f64,
}

impl From<&TopScore> for HistoryEntry {
    fn from(score: &TopScore) -> Self {
        Self {
            pp: score.pp,
            date: score.date,
            accuracy: score.accuracy,
            mods: score.mods,
            star_rating: score.star_rating,
        }
    }
}

/// Rating gained by setting a new score worth `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateGain {
    pub value: f64,
    /// 1-based rank the new score would take
    pub rank: usize,
    pub gain: f64,
}

/// Best scores of one discipline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisciplineTop {
    pub chart_ids: HashSet<u32>,
    /// Sorted by pp, best first
    pub raw_scores: Vec<TopScore>,
    pub candidate_gains: Vec<CandidateGain>,
}

impl DisciplineTop {
    pub fn from_scores(mut scores: Vec<TopScore>) -> Self {
        scores.retain(|s| s.pp.is_finite());
        scores.sort_by(|a, b| b.pp.total_cmp(&a.pp));
        scores.truncate(TOP_SCORE_LIMIT);

        let chart_ids = scores.iter().map(|s| s.beatmap_id).collect();
        let values: Vec<f64> = scores.iter().map(|s| s.pp).collect();
        let candidate_gains = values
            .iter()
            .map(|&value| {
                let (rank, gain) = projected_gain(&values, value);
                CandidateGain { value, rank, gain }
            })
            .collect();

        Self {
            chart_ids,
            raw_scores: scores,
            candidate_gains,
        }
    }

    /// Rating gained if a new score worth `value` entered this list
    pub fn projected_gain(&self, value: f64) -> f64 {
        let values: Vec<f64> = self.raw_scores.iter().map(|s| s.pp).collect();
        projected_gain(&values, value).1
    }

    /// Score values ordered oldest to newest
    pub fn pp_by_date(&self) -> Vec<f64> {
        let mut scores: Vec<&TopScore> = self.raw_scores.iter().collect();
        scores.sort_by_key(|s| s.date);
        scores.into_iter().map(|s| s.pp).collect()
    }

    /// History entries ordered oldest to newest
    pub fn history(&self) -> Vec<HistoryEntry> {
        let mut history: Vec<HistoryEntry> = self.raw_scores.iter().map(HistoryEntry::from).collect();
        history.sort_by_key(|h| h.date);
        history
    }
}

/// Weighted rating sum of values sorted best first
fn weighted_sum(sorted_desc: &[f64]) -> f64 {
    sorted_desc
        .iter()
        .take(TOP_SCORE_LIMIT)
        .zip(0i32..)
        .map(|(pp, i)| pp * RANK_WEIGHT_DECAY.powi(i))
        .sum()
}

/// Returns the 1-based rank and rating gain of inserting `value` into `sorted_desc`
fn projected_gain(sorted_desc: &[f64], value: f64) -> (usize, f64) {
    let rank = sorted_desc.iter().take_while(|&&pp| pp >= value).count();
    let mut updated = sorted_desc.to_vec();
    updated.insert(rank, value);
    let gain = weighted_sum(&updated) - weighted_sum(sorted_desc);
    (rank + 1, gain.max(0.0))
}

/// Best scores of every discipline the player has played
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopPerformanceSet {
    pub disciplines: BTreeMap<Discipline, DisciplineTop>,
}

impl TopPerformanceSet {
    pub fn insert(&mut self, discipline: Discipline, scores: Vec<TopScore>) {
        self.disciplines
            .insert(discipline, DisciplineTop::from_scores(scores));
    }

    /// Charts already in the player's best scores; empty when the discipline is missing
    pub fn chart_ids(&self, discipline: Discipline) -> HashSet<u32> {
        self.disciplines
            .get(&discipline)
            .map(|top| top.chart_ids.clone())
            .unwrap_or_default()
    }

    pub fn pp_by_date(&self, discipline: Discipline) -> Vec<f64> {
        self.disciplines
            .get(&discipline)
            .map(DisciplineTop::pp_by_date)
            .unwrap_or_default()
    }

    pub fn projected_gain(&self, discipline: Discipline, value: f64) -> f64 {
        match self.disciplines.get(&discipline) {
            Some(top) => top.projected_gain(value),
            None => value.max(0.0),
        }
    }

    /// Date-ordered history per discipline
    pub fn histories(&self) -> BTreeMap<Discipline, Vec<HistoryEntry>> {
        self.disciplines
            .iter()
            .map(|(discipline, top)| (*discipline, top.history()))
            .collect()
    }
}
