use super::{fallback, finish, log_width, sanitize_rating, RangeAlgorithm, RangeResult, Signals};
use crate::models::AlgorithmKind;
use crate::services::progression::ProgressionResult;

const FLOOR: f64 = 60.0;
const CEILING: f64 = 450.0;
const WIDTH_COEFFICIENT: f64 = 35.0;
const FALLBACK_FRACTION: f64 = 0.35;

#[derive(Debug, Clone, Copy, Default)]
pub struct Balanced;

impl RangeAlgorithm for Balanced {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Balanced
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

        let base_range = log_width(rating, WIDTH_COEFFICIENT, FLOOR, CEILING);
        let skew = 0.45 * signals.momentum
            + 0.15 * signals.spread
            + 0.6 * signals.progression_factor
            + signals.bonus(0.06, 0.05, 0.04);

        finish(&signals, base_range, skew)
    }
}
