use crate::{
    error::{AppError, AppResult},
    models::{ChartMetadata, Discipline, PlayerProfile, TopPerformanceSet, TopScore},
};

pub mod osu_api;

/// Game data provider abstraction
///
/// Everything the recommender needs from the game's public API: player
/// profiles, per-discipline best scores and chart metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GameDataProvider: Send + Sync {
    /// Resolves a player by name; `AppError::NotFound` when the name is unknown
    async fn get_user(&self, username: &str, discipline: Discipline) -> AppResult<PlayerProfile>;

    /// Best scores of one discipline, empty when the player never played it
    async fn get_top_scores(&self, user_id: u64, discipline: Discipline) -> AppResult<Vec<TopScore>>;

    async fn get_chart_metadata(&self, beatmap_id: u32) -> AppResult<ChartMetadata>;

    /// Fetch best scores of every discipline, one after another
    ///
    /// Runs inside the caller's future, so aborting the caller stops the
    /// remaining fetches. A failing discipline is logged and left out. Fails
    /// only when every discipline failed.
    async fn get_top_performance(&self, user_id: u64) -> AppResult<TopPerformanceSet> {
        let mut top = TopPerformanceSet::default();
        let mut failures = 0;

        for discipline in Discipline::ALL {
            match self.get_top_scores(user_id, discipline).await {
                Ok(scores) => {
                    if !scores.is_empty() {
                        top.insert(discipline, scores);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        discipline = %discipline,
                        provider = self.name(),
                        "Top score fetch failed"
                    );
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            tracing::warn!(
                success_count = Discipline::ALL.len() - failures,
                error_count = failures,
                "Partial top score fetch failure"
            );
        }

        if failures == Discipline::ALL.len() {
            return Err(AppError::ExternalApi(
                "Failed to fetch any top scores".to_string(),
            ));
        }

        Ok(top)
    }

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
