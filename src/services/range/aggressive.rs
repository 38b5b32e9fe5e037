use super::{fallback, finish, log_width, sanitize_rating, RangeAlgorithm, RangeResult, Signals};
use crate::models::AlgorithmKind;
use crate::services::progression::ProgressionResult;

const FLOOR: f64 = 80.0;
const CEILING: f64 = 600.0;
const WIDTH_COEFFICIENT: f64 = 50.0;
const FALLBACK_FRACTION: f64 = 0.5;
/// Constant push above the player's current level
const UPWARD_BIAS: f64 = 0.1;

/// Wide window biased toward harder content
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggressive;

impl RangeAlgorithm for Aggressive {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Aggressive
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
        let skew = UPWARD_BIAS
            + 0.6 * signals.momentum
            + 0.2 * signals.spread
            + 0.8 * signals.progression_factor
            + signals.bonus(0.1, 0.08, 0.06);

        finish(&signals, base_range, skew)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::range::test_support::*;

    #[test]
    fn test_neutral_player_aims_above_reference() {
        let range = Aggressive.compute(3000.0, &flat_history(200.0, 30), &progression(50.0));
        assert!(range.target > 200.0);
        assert!(range.skew > 0.0);
    }
}
