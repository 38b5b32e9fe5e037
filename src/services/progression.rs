use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::models::{Discipline, HistoryEntry};
use crate::services::statistics::{
    excess_kurtosis, linear_slope, mean, skewness, std_dev,
};

/// Disciplines with fewer entries are skipped
pub const MIN_HISTORY: usize = 20;
/// Entries used for the recent trend
const RECENT_WINDOW: usize = 20;
/// A single score at or above this value counts as high-pp experience
pub const HIGH_PP_EXPERIENCE: f64 = 5000.0;
/// Flat bonus for disciplines that can borrow skill from an experienced one
const TRANSFER_BONUS: f64 = 10.0;
const BASE_INDEX: f64 = 60.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Diagnostics of one analyzed discipline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisciplineDiagnostics {
    /// PP per day over the whole history
    pub slope: f64,
    /// PP per day over the last entries
    pub recent_slope: f64,
    /// 0-100
    pub progression_index: f64,
    pub freshness_factor: f64,
    pub density_factor: f64,
    pub acc_consistency: f64,
    pub pp_consistency: f64,
    pub burst_detected: bool,
    pub experience_detected: bool,
    pub last_score_age_days: f64,
    pub best_score_age_days: f64,
}

/// Output of progression analysis, recomputed per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionResult {
    /// 0-100
    pub global_score: f64,
    pub per_discipline: BTreeMap<Discipline, DisciplineDiagnostics>,
    /// Disciplines with too little history to analyze
    pub skipped: Vec<Discipline>,
}

impl ProgressionResult {
    /// Result for a player without analyzable history
    pub fn empty() -> Self {
        Self {
            global_score: 0.0,
            per_discipline: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }
}

/// Weights used to fold per-discipline indexes into the global score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressionWeights {
    pub primary: Discipline,
    pub primary_weight: f64,
}

impl Default for ProgressionWeights {
    fn default() -> Self {
        Self {
            primary: Discipline::Osu,
            primary_weight: 1.2,
        }
    }
}

impl ProgressionWeights {
    fn weight(&self, discipline: Discipline) -> f64 {
        if discipline == self.primary {
            self.primary_weight
        } else {
            1.0
        }
    }
}

/// Turns a player's per-discipline score history into a progression signal.
///
/// Pure: the same histories and `now` always produce the same result.
#[derive(Debug, Clone, Default)]
pub struct ProgressionAnalyzer {
    weights: ProgressionWeights,
}

impl ProgressionAnalyzer {
    pub fn new(weights: ProgressionWeights) -> Self {
        Self { weights }
    }

    pub fn analyze(
        &self,
        histories: &BTreeMap<Discipline, Vec<HistoryEntry>>,
        now: DateTime<Utc>,
    ) -> ProgressionResult {
        let mut per_discipline = BTreeMap::new();
        let mut skipped = Vec::new();

        for (discipline, history) in histories {
            if history.len() < MIN_HISTORY {
                skipped.push(*discipline);
                continue;
            }
            per_discipline.insert(*discipline, analyze_discipline(history, now));
        }

        apply_skill_transfer(&mut per_discipline);

        let (weighted, total_weight) = per_discipline.iter().fold(
            (0.0, 0.0),
            |(sum, weights), (discipline, diagnostics)| {
                let w = self.weights.weight(*discipline);
                (sum + diagnostics.progression_index * w, weights + w)
            },
        );
        let global_score = if total_weight > 0.0 {
            sanitize_index(weighted / total_weight)
        } else {
            0.0
        };

        tracing::debug!(
            global_score,
            analyzed = per_discipline.len(),
            skipped = skipped.len(),
            "Progression analyzed"
        );

        ProgressionResult {
            global_score,
            per_discipline,
            skipped,
        }
    }
}

/// Experienced disciplines lift inexperienced ones
fn apply_skill_transfer(per_discipline: &mut BTreeMap<Discipline, DisciplineDiagnostics>) {
    let experienced: HashSet<Discipline> = per_discipline
        .iter()
        .filter(|(_, d)| d.experience_detected)
        .map(|(discipline, _)| *discipline)
        .collect();

    for (discipline, diagnostics) in per_discipline.iter_mut() {
        let others_experienced = experienced.iter().any(|other| other != discipline);
        if !diagnostics.experience_detected && others_experienced {
            diagnostics.progression_index = (diagnostics.progression_index + TRANSFER_BONUS).min(100.0);
        }
    }
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

fn analyze_discipline(history: &[HistoryEntry], now: DateTime<Utc>) -> DisciplineDiagnostics {
    let mut entries: Vec<&HistoryEntry> = history.iter().filter(|e| e.pp.is_finite()).collect();
    entries.sort_by_key(|e| e.date);

    let (first, last) = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (first.date, last.date),
        _ => return neutral_diagnostics(),
    };

    let pps: Vec<f64> = entries.iter().map(|e| e.pp).collect();
    let days: Vec<f64> = entries.iter().map(|e| days_between(first, e.date)).collect();
    let accuracies: Vec<f64> = entries.iter().map(|e| e.accuracy).collect();
    let stars: Vec<f64> = entries.iter().map(|e| e.star_rating).collect();

    // 1. trends
    let slope = linear_slope(&days, &pps);
    let recent_start = pps.len().saturating_sub(RECENT_WINDOW);
    let recent_slope = linear_slope(&days[recent_start..], &pps[recent_start..]);

    // 2. burst
    let burst_detected = recent_slope > 1.5 * slope || recent_slope > 0.4;

    // 3. recency and activity
    let last_score_age_days = days_between(last, now).max(0.0);
    let freshness_factor = (1.3 - last_score_age_days / 360.0).max(0.5);
    let days_span = days_between(first, last).max(1.0);
    let density_factor = (pps.len() as f64 / days_span * 30.0).clamp(0.6, 2.0);

    // 4. consistency
    let acc_consistency = 1.0 - (std_dev(&accuracies) / 10.0).clamp(0.0, 1.0);
    let pp_mean = mean(&pps);
    let pp_consistency = if pp_mean > 0.0 {
        1.0 - (std_dev(&pps) / pp_mean).clamp(0.0, 1.0)
    } else {
        1.0
    };

    // 5. shape of the distribution
    let challenge_level = std_dev(&stars).clamp(0.0, 1.5);
    let skew = skewness(&pps).abs().clamp(0.0, 2.0);
    let kurtosis = excess_kurtosis(&pps).abs().clamp(0.0, 2.0);
    let distinct_mods: HashSet<u32> = entries.iter().map(|e| e.mods.bits()).collect();
    let mod_diversity = distinct_mods.len() as f64 / entries.len() as f64;
    let overperforming_ratio = if pp_mean > 0.0 {
        pps.iter().filter(|&&pp| pp > 1.3 * pp_mean).count() as f64 / pps.len() as f64
    } else {
        0.0
    };

    let best = entries
        .iter()
        .max_by(|a, b| a.pp.total_cmp(&b.pp))
        .map(|e| e.date)
        .unwrap_or(last);
    let best_score_age_days = days_between(best, now).max(0.0);

    // 6. index
    let mut index = BASE_INDEX + slope * 12.0;
    index *= freshness_factor * density_factor * acc_consistency * pp_consistency;
    index *= 1.0 + 0.1 * mod_diversity + 0.05 * challenge_level;
    index *= 1.0 + 0.025 * (skew + kurtosis);
    if overperforming_ratio > 0.05 {
        index *= 1.0 + overperforming_ratio.min(0.5) * 0.2;
    }
    if best_score_age_days > 180.0 && recent_slope > 0.0 {
        index *= 1.1;
    }
    if burst_detected {
        index *= 1.15;
    }
    if recent_slope > 0.5 {
        index += 10.0;
    }

    DisciplineDiagnostics {
        slope,
        recent_slope,
        progression_index: sanitize_index(index),
        freshness_factor,
        density_factor,
        acc_consistency,
        pp_consistency,
        burst_detected,
        experience_detected: pps.iter().any(|&pp| pp >= HIGH_PP_EXPERIENCE),
        last_score_age_days,
        best_score_age_days,
    }
}

fn neutral_diagnostics() -> DisciplineDiagnostics {
    DisciplineDiagnostics {
        slope: 0.0,
        recent_slope: 0.0,
        progression_index: 0.0,
        freshness_factor: 0.5,
        density_factor: 0.6,
        acc_consistency: 1.0,
        pp_consistency: 1.0,
        burst_detected: false,
        experience_detected: false,
        last_score_age_days: 0.0,
        best_score_age_days: 0.0,
    }
}

fn sanitize_index(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
