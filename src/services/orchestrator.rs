use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{AlgorithmKind, RecommendationRequest, ScoreRecord, MAX_PRECISION_TIER},
    services::{
        progression::ProgressionResult,
        range::{self, RangeResult},
        score_index::{IndexQuery, ScoreIndex},
        selection::{best_per_chart, filter_candidates, select_by_precision, ExclusionSet},
    },
};

/// Strictness level of a search round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Strict,
    Relaxed,
    Forced,
}

impl Tier {
    pub const fn precision_threshold(self) -> u8 {
        match self {
            Tier::Strict => 8,
            Tier::Relaxed | Tier::Forced => 10,
        }
    }

    /// Allowed distance from an explicit target
    pub const fn margin(self) -> Option<f64> {
        match self {
            Tier::Strict => Some(15.0),
            Tier::Relaxed => Some(25.0),
            Tier::Forced => None,
        }
    }

    /// Offsets around the computed target when no explicit target is given
    pub const fn window(self) -> Option<(f64, f64)> {
        match self {
            Tier::Strict => Some((0.0, 28.0)),
            Tier::Relaxed => Some((-20.0, 50.0)),
            Tier::Forced => None,
        }
    }

    pub const fn next(self) -> Option<Tier> {
        match self {
            Tier::Strict => Some(Tier::Relaxed),
            Tier::Relaxed => Some(Tier::Forced),
            Tier::Forced => None,
        }
    }

    /// Worst precision tier selection may pick from
    pub fn selection_ceiling(self) -> u8 {
        self.precision_threshold().min(MAX_PRECISION_TIER)
    }

    /// Bounds a candidate's pp must fall in, `None` when any value is accepted
    pub fn acceptance_band(self, explicit_target: Option<f64>, computed_target: f64) -> Option<(f64, f64)> {
        match (explicit_target, self.margin(), self.window()) {
            (Some(target), Some(margin), _) => Some((target - margin, target + margin)),
            (None, _, Some((low, high))) => Some((computed_target + low, computed_target + high)),
            _ => None,
        }
    }

    /// Whether a candidate worth `pp` is close enough to what was asked for
    pub fn accepts(self, pp: f64, explicit_target: Option<f64>, computed_target: f64) -> bool {
        self.acceptance_band(explicit_target, computed_target)
            .map_or(true, |(low, high)| pp >= low && pp <= high)
    }
}

/// Telemetry for one (tier, algorithm) round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub tier: Tier,
    pub algorithm: AlgorithmKind,
    pub min: f64,
    pub max: f64,
    pub hits: usize,
    pub candidates: usize,
    pub eligible: usize,
}

/// A successful search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub record: ScoreRecord,
    pub tier: Tier,
    pub algorithm: AlgorithmKind,
    /// True when the strict tier did not produce the result
    pub relaxed_criteria: bool,
    pub range: RangeResult,
    pub attempts: Vec<Attempt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Found(Box<Recommendation>),
    /// Every tier and algorithm came back empty
    NotFound { attempts: Vec<Attempt> },
}

/// Everything a search needs about the player and the request
pub struct SearchContext<'a> {
    pub request: &'a RecommendationRequest,
    pub current_rating: f64,
    /// Player's score values ordered oldest to newest
    pub recent_pp: &'a [f64],
    pub progression: &'a ProgressionResult,
    pub exclusion: &'a ExclusionSet,
    pub event_id: &'a str,
}

/// Drives range computation, index queries and selection across escalating tiers
pub struct Orchestrator {
    index: Arc<dyn ScoreIndex>,
}

impl Orchestrator {
    pub fn new(index: Arc<dyn ScoreIndex>) -> Self {
        Self { index }
    }

    pub async fn recommend<R: Rng + Send>(
        &self,
        ctx: &SearchContext<'_>,
        rng: &mut R,
    ) -> AppResult<Outcome> {
        let mut attempts = Vec::new();
        let requested = ctx.request.algorithm;

        if let Some(kind) = requested {
            if let Some(found) = self.attempt(Tier::Strict, kind, ctx, rng, &mut attempts).await? {
                return Ok(Outcome::Found(Box::new(found)));
            }
            tracing::debug!(
                event_id = %ctx.event_id,
                algorithm = %kind,
                "Requested algorithm found nothing, falling back to full strategy"
            );
        }

        let mut tier = Some(Tier::Strict);
        while let Some(current) = tier {
            for kind in AlgorithmKind::ORDER {
                if current == Tier::Strict && requested == Some(kind) {
                    continue;
                }
                if let Some(found) = self.attempt(current, kind, ctx, rng, &mut attempts).await? {
                    return Ok(Outcome::Found(Box::new(found)));
                }
            }
            tier = current.next();
        }

        tracing::info!(
            event_id = %ctx.event_id,
            rounds = attempts.len(),
            "No candidate found after all tiers"
        );
        Ok(Outcome::NotFound { attempts })
    }

    async fn attempt<R: Rng + Send>(
        &self,
        tier: Tier,
        kind: AlgorithmKind,
        ctx: &SearchContext<'_>,
        rng: &mut R,
        attempts: &mut Vec<Attempt>,
    ) -> AppResult<Option<Recommendation>> {
        let request = ctx.request;
        let mut range = range::algorithm(kind).compute(ctx.current_rating, ctx.recent_pp, ctx.progression);
        if let Some(target) = request.target_pp {
            range = range.recentered(target);
        }

        // the scanned window always covers what this tier would accept
        let (min, max) = match tier.acceptance_band(request.target_pp, range.target) {
            Some((low, high)) => (range.min.min(low).max(0.0), range.max.max(high)),
            None => (range.min, range.max),
        };
        let query = IndexQuery {
            min,
            max,
            require_mods: request.requires_mods(),
            tempo: request.tempo,
            max_precision: tier.precision_threshold(),
        };

        let hits = match self.index.find_scores(&query, ctx.event_id).await {
            Ok(hits) => hits,
            Err(AppError::InvalidRange { min, max }) => {
                tracing::warn!(
                    event_id = %ctx.event_id,
                    tier = ?tier,
                    algorithm = %kind,
                    min,
                    max,
                    "Skipping round with invalid range"
                );
                attempts.push(Attempt {
                    tier,
                    algorithm: kind,
                    min,
                    max,
                    hits: 0,
                    candidates: 0,
                    eligible: 0,
                });
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let hit_count = hits.len();

        let candidates = filter_candidates(hits, ctx.exclusion, request.mods.as_ref());
        // every candidate is checked: precision order says nothing about target proximity
        let eligible: Vec<ScoreRecord> = best_per_chart(
            candidates
                .iter()
                .filter(|r| r.precision <= tier.precision_threshold())
                .filter(|r| tier.accepts(r.pp, request.target_pp, range.target))
                .cloned()
                .collect(),
        );

        attempts.push(Attempt {
            tier,
            algorithm: kind,
            min,
            max,
            hits: hit_count,
            candidates: candidates.len(),
            eligible: eligible.len(),
        });

        tracing::debug!(
            event_id = %ctx.event_id,
            tier = ?tier,
            algorithm = %kind,
            min,
            max,
            hits = hit_count,
            candidates = candidates.len(),
            eligible = eligible.len(),
            "Search round finished"
        );

        let Some(record) = select_by_precision(&eligible, tier.selection_ceiling(), rng) else {
            return Ok(None);
        };

        tracing::info!(
            event_id = %ctx.event_id,
            tier = ?tier,
            algorithm = %kind,
            beatmap_id = record.beatmap_id,
            pp = record.pp,
            precision = record.precision,
            "Candidate selected"
        );

        Ok(Some(Recommendation {
            record,
            tier,
            algorithm: kind,
            relaxed_criteria: tier != Tier::Strict,
            range,
            attempts: attempts.clone(),
        }))
    }
}
