use super::{fallback, finish, log_width, sanitize_rating, RangeAlgorithm, RangeResult, Signals};
use crate::models::AlgorithmKind;
use crate::services::progression::ProgressionResult;

const FLOOR: f64 = 50.0;
const CEILING: f64 = 500.0;
const WIDTH_COEFFICIENT: f64 = 30.0;
const FALLBACK_FRACTION: f64 = 0.3;

/// Width and skew both scale with how fast the player is progressing.
///
/// Volatile histories (wide interquartile spread) amplify the momentum and
/// progression terms instead of shifting the window directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dynamic;

impl RangeAlgorithm for Dynamic {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Dynamic
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

        let growth = 0.8 + 0.6 * signals.global_score / 100.0;
        let base_range = (log_width(rating, WIDTH_COEFFICIENT, FLOOR, CEILING) * growth).clamp(FLOOR, CEILING);
        let volatility = signals.spread.min(1.0);
        let skew = (0.5 * signals.momentum + 0.6 * signals.progression_factor) * (1.0 + 0.5 * volatility)
            + signals.bonus(0.08, 0.06, 0.05);

        finish(&signals, base_range, skew)
    }
}
