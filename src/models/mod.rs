pub mod chart;
pub mod mods;
pub mod player;
pub mod recommendation;
pub mod score;

pub use chart::ChartMetadata;
pub use mods::ModMask;
pub use player::{
    CandidateGain, DisciplineTop, HistoryEntry, PlayerProfile, TopPerformanceSet, TopScore,
    TOP_SCORE_LIMIT,
};
pub use recommendation::{AlgorithmKind, ModMatch, ModRequirement, RecommendationRequest};
pub use score::{Discipline, ScoreRecord, MAX_PRECISION_TIER};
