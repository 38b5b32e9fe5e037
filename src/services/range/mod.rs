//! Search-window computation.
//!
//! Five interchangeable algorithms turn a player's rating, recent score
//! values and progression diagnostics into a `[min, max]` reward window.
//! They all share the same shape: a base width scaled from the rating, a
//! dimensionless skew built from momentum, spread and progression, and a
//! fixed fractional fallback when there is no usable history.

use serde::{Deserialize, Serialize};

use crate::models::AlgorithmKind;
use crate::services::progression::ProgressionResult;
use crate::services::statistics::{mean, quartiles};

mod aggressive;
mod balanced;
mod base;
mod conservative;
mod dynamic;

pub use aggressive::Aggressive;
pub use balanced::Balanced;
pub use base::Base;
pub use conservative::Conservative;
pub use dynamic::Dynamic;

/// The final adjustment never exceeds this share of the base width
const MAX_ADJUSTMENT_SHARE: f64 = 0.6;
/// Applied to the skew when several disciplines went stale
const STALE_PENALTY: f64 = 0.8;
const STALE_AFTER_DAYS: f64 = 1000.0;
const STALE_DISCIPLINES_FOR_PENALTY: usize = 2;
/// Entries averaged for the "recent" side of momentum
const MOMENTUM_WINDOW: usize = 10;
/// Best entries averaged into the reference value
const REFERENCE_WINDOW: usize = 10;

/// A reward window and the point inside it the algorithm aims for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeResult {
    pub min: f64,
    pub max: f64,
    /// Half-width of the window
    pub margin: f64,
    /// Dimensionless adjustment applied to the reference value
    pub skew: f64,
    pub target: f64,
}

impl RangeResult {
    /// Window of `margin` on both sides of `target`; `min` is floored at 0
    pub fn around(target: f64, margin: f64, skew: f64) -> Self {
        let target = if target.is_finite() { target.max(0.0) } else { 0.0 };
        let margin = if margin.is_finite() { margin.abs() } else { 0.0 };
        let min = (target - margin).max(0.0);
        let max = (target + margin).max(min);
        Self {
            min,
            max,
            margin,
            skew,
            target,
        }
    }

    /// Same width, centred on an explicit target
    pub fn recentered(&self, target: f64) -> Self {
        Self::around(target, self.margin, self.skew)
    }

    pub fn contains(&self, pp: f64) -> bool {
        pp >= self.min && pp <= self.max
    }
}

/// Common contract of every range computation variant
pub trait RangeAlgorithm: Send + Sync {
    fn kind(&self) -> AlgorithmKind;

    /// `recent_pp` holds the player's score values ordered oldest to newest
    fn compute(
        &self,
        current_rating: f64,
        recent_pp: &[f64],
        progression: &ProgressionResult,
    ) -> RangeResult;
}

static CONSERVATIVE: Conservative = Conservative;
static BALANCED: Balanced = Balanced;
static AGGRESSIVE: Aggressive = Aggressive;
static BASE: Base = Base;
static DYNAMIC: Dynamic = Dynamic;

/// Looks up the implementation of an algorithm
pub fn algorithm(kind: AlgorithmKind) -> &'static dyn RangeAlgorithm {
    match kind {
        AlgorithmKind::Conservative => &CONSERVATIVE,
        AlgorithmKind::Balanced => &BALANCED,
        AlgorithmKind::Aggressive => &AGGRESSIVE,
        AlgorithmKind::Base => &BASE,
        AlgorithmKind::Dynamic => &DYNAMIC,
    }
}

/// Inputs shared by every variant, derived once from history and progression
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Signals {
    /// Typical value of the player's best recent scores
    pub reference: f64,
    /// Relative change of the recent average against the whole history, [-1, 1]
    pub momentum: f64,
    /// Interquartile range over median, [0, 2]
    pub spread: f64,
    /// `(global_score - 50) / 100`
    pub progression_factor: f64,
    pub global_score: f64,
    pub burst: bool,
    /// High progression with a discipline played in the last month
    pub hot: bool,
    /// Old best score but the recent trend is climbing again
    pub dormant_accelerating: bool,
    pub stale_disciplines: usize,
}

impl Signals {
    /// `None` when there is no usable score history
    pub(crate) fn derive(recent_pp: &[f64], progression: &ProgressionResult) -> Option<Self> {
        let values: Vec<f64> = recent_pp
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .collect();
        if values.is_empty() {
            return None;
        }

        let historical = mean(&values);
        let recent = mean(&values[values.len().saturating_sub(MOMENTUM_WINDOW)..]);
        let momentum = if historical > 0.0 {
            ((recent - historical) / historical).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let (q1, median, q3) = quartiles(&values);
        let spread = if median > 0.0 {
            ((q3 - q1) / median).clamp(0.0, 2.0)
        } else {
            0.0
        };

        let mut best = values.clone();
        best.sort_by(|a, b| b.total_cmp(a));
        best.truncate(REFERENCE_WINDOW);
        let reference = mean(&best);

        let global_score = if progression.global_score.is_finite() {
            progression.global_score.clamp(0.0, 100.0)
        } else {
            0.0
        };

        let diagnostics = progression.per_discipline.values();
        let burst = diagnostics.clone().any(|d| d.burst_detected);
        let hot = global_score > 70.0 && diagnostics.clone().any(|d| d.last_score_age_days < 30.0);
        let dormant_accelerating = diagnostics
            .clone()
            .any(|d| d.best_score_age_days > 365.0 && d.recent_slope > 0.0 && d.recent_slope > d.slope);
        let stale_disciplines = diagnostics
            .filter(|d| d.last_score_age_days > STALE_AFTER_DAYS)
            .count();

        Some(Self {
            reference,
            momentum,
            spread,
            progression_factor: (global_score - 50.0) / 100.0,
            global_score,
            burst,
            hot,
            dormant_accelerating,
            stale_disciplines,
        })
    }

    /// Sum of the situational bonuses with per-algorithm magnitudes
    pub(crate) fn bonus(&self, burst: f64, hot: f64, dormant: f64) -> f64 {
        let mut total = 0.0;
        if self.burst {
            total += burst;
        }
        if self.hot {
            total += hot;
        }
        if self.dormant_accelerating {
            total += dormant;
        }
        total
    }
}

/// Ratings below zero or non-finite are treated as zero
pub(crate) fn sanitize_rating(current_rating: f64) -> f64 {
    if current_rating.is_finite() {
        current_rating.max(0.0)
    } else {
        0.0
    }
}

/// Log-scaled width: `coefficient * ln(1 + rating / 100)`, clamped
pub(crate) fn log_width(current_rating: f64, coefficient: f64, floor: f64, ceiling: f64) -> f64 {
    (coefficient * (1.0 + current_rating / 100.0).ln()).clamp(floor, ceiling)
}

/// Fixed fractional window around the rating, used without score history
pub(crate) fn fallback(current_rating: f64, fraction: f64) -> RangeResult {
    RangeResult::around(current_rating, current_rating * fraction, 0.0)
}

/// Turns a width and skew into the final window around the reference value
pub(crate) fn finish(signals: &Signals, base_range: f64, skew: f64) -> RangeResult {
    let skew = if signals.stale_disciplines >= STALE_DISCIPLINES_FOR_PENALTY {
        skew * STALE_PENALTY
    } else {
        skew
    };
    let limit = MAX_ADJUSTMENT_SHARE * base_range;
    let adjustment = (skew * base_range).clamp(-limit, limit);
    RangeResult::around(signals.reference + adjustment, base_range / 2.0, skew)
}
