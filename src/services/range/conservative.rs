use super::{fallback, finish, log_width, sanitize_rating, RangeAlgorithm, RangeResult, Signals};
use crate::models::AlgorithmKind;
use crate::services::progression::ProgressionResult;

const FLOOR: f64 = 40.0;
const CEILING: f64 = 300.0;
const WIDTH_COEFFICIENT: f64 = 25.0;
const FALLBACK_FRACTION: f64 = 0.2;

/// Narrow window that follows the player's momentum cautiously
#[derive(Debug, Clone, Copy, Default)]
pub struct Conservative;

impl RangeAlgorithm for Conservative {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Conservative
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
        let skew = 0.3 * signals.momentum
            + 0.1 * signals.spread
            + 0.4 * signals.progression_factor
            + signals.bonus(0.04, 0.03, 0.02);

        finish(&signals, base_range, skew)
    }
}
