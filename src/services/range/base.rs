use super::{fallback, finish, sanitize_rating, RangeAlgorithm, RangeResult, Signals};
use crate::models::AlgorithmKind;
use crate::services::progression::ProgressionResult;

const FLOOR: f64 = 50.0;
const CEILING: f64 = 400.0;
/// Width grows linearly with rating
const WIDTH_PER_RATING: f64 = 0.04;
const FALLBACK_FRACTION: f64 = 0.25;

/// Refined baseline: linear width, momentum and progression only, no situational bonuses
#[derive(Debug, Clone, Copy, Default)]
pub struct Base;

impl RangeAlgorithm for Base {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Base
    }

    fn compute(
        &self,
        current_rating: f64,
        recent_pp: &[f64],
        progression: &ProgressionResult,
    ) -> RangeResult {
        let rating = sanitize_rating(current_rating);
        let Some(signals) = Signals::derive(recent_pp, progression) else {
            return fallback(rating, FALLBACK_FRACTION);
        };

        let base_range = (rating * WIDTH_PER_RATING).clamp(FLOOR, CEILING);
        let skew = 0.5 * signals.momentum + 0.5 * signals.progression_factor;

        finish(&signals, base_range, skew)
    }
}
