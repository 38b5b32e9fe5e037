//! Per-request worker.
//!
//! Each recommendation request runs as its own tokio task and reports back
//! over a channel. The pipeline is strictly sequential: top scores, progression,
//! exclusion set, tiered search, then metadata for the winning chart. The
//! parent owns the wall-clock budget and aborts the task when it runs out.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::{
    db::RequestStore,
    error::{AppError, AppResult},
    models::{Discipline, HistoryEntry, PlayerProfile, RecommendationRequest},
    services::{
        alerting::Alerter,
        orchestrator::{Orchestrator, Outcome, SearchContext},
        progression::{ProgressionAnalyzer, ProgressionResult, ProgressionWeights},
        providers::GameDataProvider,
        score_index::ScoreIndex,
        selection::ExclusionSet,
    },
};

pub mod messages;

use messages::{Locale, RecommendationText};

/// Buffer of the worker-to-parent channel
const CHANNEL_CAPACITY: usize = 8;

/// Everything a worker receives from its parent
#[derive(Debug, Clone)]
pub struct WorkerInput {
    pub request_id: String,
    pub player: PlayerProfile,
    pub request: RecommendationRequest,
}

/// One result emitted by a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub username: String,
    pub response: String,
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beatmap_id: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub timeout: Duration,
    /// Charts suggested within this window are excluded
    pub suggestion_retention: ChronoDuration,
    pub weights: ProgressionWeights,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            suggestion_retention: ChronoDuration::days(7),
            weights: ProgressionWeights::default(),
        }
    }
}

/// Collaborators shared by every worker
pub struct WorkerDeps {
    pub provider: Arc<dyn GameDataProvider>,
    pub index: Arc<dyn ScoreIndex>,
    pub store: Arc<dyn RequestStore>,
    pub alerter: Arc<dyn Alerter>,
    pub settings: WorkerSettings,
}

/// Parent side of a running worker
pub struct WorkerHandle {
    messages: mpsc::Receiver<WorkerMessage>,
    supervisor: JoinHandle<()>,
    pipeline: AbortHandle,
}

impl WorkerHandle {
    /// Drains messages until the worker exits.
    ///
    /// When the budget runs out the worker is aborted and an error is returned.
    pub async fn collect(mut self, budget: Duration) -> AppResult<Vec<WorkerMessage>> {
        let mut collected = Vec::new();
        let drained = tokio::time::timeout(budget, async {
            while let Some(message) = self.messages.recv().await {
                collected.push(message);
            }
        })
        .await;

        if drained.is_err() {
            self.pipeline.abort();
            self.supervisor.abort();
            return Err(AppError::Internal("Worker exceeded its time budget".to_string()));
        }
        Ok(collected)
    }
}

/// Starts a worker for one request
pub fn spawn(deps: Arc<WorkerDeps>, input: WorkerInput) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let pipeline = tokio::spawn(run_pipeline(deps.clone(), input.clone(), tx.clone()));
    let abort = pipeline.abort_handle();

    let supervisor = tokio::spawn(async move {
        let failure = match pipeline.await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) if e.is_panic() => format!("worker panicked: {}", e),
            Err(_) => return,
        };

        tracing::error!(
            request_id = %input.request_id,
            player = %input.player.display_name,
            error = %failure,
            "Worker failed"
        );
        deps.alerter
            .alert(&input.request_id, &input.player.display_name, &failure)
            .await;

        let locale = Locale::from_tag(&input.player.locale);
        let message = WorkerMessage {
            username: input.player.display_name.clone(),
            response: messages::internal_error(locale),
            request_id: input.request_id.clone(),
            success: false,
            beatmap_id: None,
        };
        if tx.send(message).await.is_err() {
            tracing::warn!(request_id = %input.request_id, "Parent stopped listening");
        }
    });

    WorkerHandle {
        messages: rx,
        supervisor,
        pipeline: abort,
    }
}

async fn run_pipeline(
    deps: Arc<WorkerDeps>,
    input: WorkerInput,
    tx: mpsc::Sender<WorkerMessage>,
) -> AppResult<()> {
    let WorkerInput {
        request_id,
        player,
        request,
    } = input;
    let discipline = request.discipline;
    let now = Utc::now();

    if let Err(e) = deps.store.mark_pending(&request_id, &player.display_name).await {
        tracing::warn!(request_id = %request_id, error = %e, "Failed to set pending marker");
    }

    tracing::info!(
        request_id = %request_id,
        player = %player.display_name,
        discipline = %discipline,
        rating = player.current_rating,
        "Worker started"
    );

    let top = deps.provider.get_top_performance(player.id).await?;
    let progression = load_progression(&deps, player.id, &top.histories(), now).await;

    let recent = deps
        .store
        .recent_suggestions(player.id, now - deps.settings.suggestion_retention)
        .await?;
    let exclusion = ExclusionSet::new(top.chart_ids(discipline), recent);
    let recent_pp = top.pp_by_date(discipline);

    tracing::debug!(
        request_id = %request_id,
        global_score = progression.global_score,
        excluded = exclusion.len(),
        history = recent_pp.len(),
        "Search context ready"
    );

    let ctx = SearchContext {
        request: &request,
        current_rating: player.current_rating,
        recent_pp: &recent_pp,
        progression: &progression,
        exclusion: &exclusion,
        event_id: &request_id,
    };
    let mut rng = StdRng::from_entropy();
    let outcome = Orchestrator::new(deps.index.clone())
        .recommend(&ctx, &mut rng)
        .await?;

    let locale = Locale::from_tag(&player.locale);
    let message = match outcome {
        Outcome::Found(found) => {
            let record = &found.record;
            let chart = deps.provider.get_chart_metadata(record.beatmap_id).await?;
            let gain = top.projected_gain(discipline, record.pp);

            tracing::info!(
                request_id = %request_id,
                player = %player.display_name,
                beatmap_id = record.beatmap_id,
                tier = ?found.tier,
                algorithm = %found.algorithm,
                relaxed = found.relaxed_criteria,
                rounds = found.attempts.len(),
                "Recommendation found"
            );

            if let Err(e) = deps
                .store
                .record_suggestion(player.id, record.beatmap_id, now)
                .await
            {
                tracing::warn!(request_id = %request_id, error = %e, "Failed to record suggestion");
            }

            WorkerMessage {
                username: player.display_name.clone(),
                response: messages::recommendation(
                    locale,
                    &RecommendationText {
                        chart: &chart,
                        mods: record.mods,
                        pp: record.pp,
                        gain,
                        relaxed: found.relaxed_criteria,
                    },
                ),
                request_id: request_id.clone(),
                success: true,
                beatmap_id: Some(record.beatmap_id),
            }
        }
        Outcome::NotFound { attempts } => {
            tracing::info!(
                request_id = %request_id,
                player = %player.display_name,
                rounds = attempts.len(),
                "No candidate found"
            );
            WorkerMessage {
                username: player.display_name.clone(),
                response: messages::not_found(locale),
                request_id: request_id.clone(),
                success: true,
                beatmap_id: None,
            }
        }
    };

    if tx.send(message).await.is_err() {
        tracing::warn!(request_id = %request_id, "Parent stopped listening");
    }

    if let Err(e) = deps.store.clear_pending(&request_id).await {
        tracing::warn!(request_id = %request_id, error = %e, "Failed to clear pending marker");
    }
    Ok(())
}

/// Cached progression when fresh, otherwise a new analysis
async fn load_progression(
    deps: &WorkerDeps,
    user_id: u64,
    histories: &BTreeMap<Discipline, Vec<HistoryEntry>>,
    now: DateTime<Utc>,
) -> ProgressionResult {
    match deps.store.cached_progression(user_id).await {
        Ok(Some(cached)) => return cached,
        Ok(None) => {}
        Err(e) => tracing::warn!(user_id, error = %e, "Progression cache unavailable"),
    }

    let progression = ProgressionAnalyzer::new(deps.settings.weights).analyze(histories, now);
    deps.store.store_progression(user_id, &progression).await;
    progression
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockRequestStore;
    use crate::models::{ChartMetadata, ModMask, ScoreRecord, TopPerformanceSet};
    use crate::services::alerting::MockAlerter;
    use crate::services::providers::MockGameDataProvider;
    use crate::services::score_index::MockScoreIndex;
    use std::collections::HashSet;

    fn player() -> PlayerProfile {
        PlayerProfile {
            id: 42,
            display_name: "tester".to_string(),
            locale: "en".to_string(),
            current_rating: 3000.0,
        }
    }

    fn chart(beatmap_id: u32) -> ChartMetadata {
        ChartMetadata {
            beatmap_id,
            title: "Song".to_string(),
            artist: "Artist".to_string(),
            version: "Insane".to_string(),
            creator: "mapper".to_string(),
            star_rating: 5.1,
            length_secs: 90,
            bpm: 180.0,
            approach_rate: 9.0,
            overall_difficulty: 8.0,
            circle_size: 4.0,
            drain: 5.0,
        }
    }

    fn quiet_store() -> MockRequestStore {
        let mut store = MockRequestStore::new();
        store.expect_mark_pending().returning(|_, _| Ok(()));
        store.expect_clear_pending().returning(|_| Ok(()));
        store.expect_cached_progression().returning(|_| Ok(None));
        store.expect_store_progression().returning(|_, _| ());
        store.expect_recent_suggestions().returning(|_, _| Ok(HashSet::new()));
        store
    }

    fn input() -> WorkerInput {
        let mut request = RecommendationRequest::new(Discipline::Osu);
        request.target_pp = Some(200.0);
        WorkerInput {
            request_id: "req-1".to_string(),
            player: player(),
            request,
        }
    }

    fn deps(
        provider: MockGameDataProvider,
        index: MockScoreIndex,
        store: MockRequestStore,
        alerter: MockAlerter,
    ) -> Arc<WorkerDeps> {
        Arc::new(WorkerDeps {
            provider: Arc::new(provider),
            index: Arc::new(index),
            store: Arc::new(store),
            alerter: Arc::new(alerter),
            settings: WorkerSettings::default(),
        })
    }

    #[tokio::test]
    async fn test_worker_reports_recommendation() {
        let mut provider = MockGameDataProvider::new();
        provider
            .expect_get_top_performance()
            .returning(|_| Ok(TopPerformanceSet::default()));
        provider
            .expect_get_chart_metadata()
            .returning(|id| Ok(chart(id)));

        let mut index = MockScoreIndex::new();
        index.expect_find_scores().returning(|_, _| {
            Ok(vec![ScoreRecord {
                score_id: 1,
                beatmap_id: 777,
                pp: 205.0,
                mods: ModMask::NONE,
                precision: 1,
                tempo: 1.0,
                date: Utc::now(),
            }])
        });

        let mut store = quiet_store();
        store
            .expect_record_suggestion()
            .withf(|user_id, beatmap_id, _| *user_id == 42 && *beatmap_id == 777)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut alerter = MockAlerter::new();
        alerter.expect_alert().never();

        let handle = spawn(deps(provider, index, store, alerter), input());
        let received = handle.collect(Duration::from_secs(5)).await.unwrap();

        assert_eq!(received.len(), 1);
        assert!(received[0].success);
        assert_eq!(received[0].beatmap_id, Some(777));
        assert_eq!(received[0].request_id, "req-1");
        assert!(received[0].response.contains("Artist - Song [Insane]"));
    }

    #[tokio::test]
    async fn test_worker_reports_not_found_as_success() {
        let mut provider = MockGameDataProvider::new();
        provider
            .expect_get_top_performance()
            .returning(|_| Ok(TopPerformanceSet::default()));
        provider.expect_get_chart_metadata().never();

        let mut index = MockScoreIndex::new();
        index.expect_find_scores().returning(|_, _| Ok(Vec::new()));

        let mut store = quiet_store();
        store.expect_record_suggestion().never();

        let mut alerter = MockAlerter::new();
        alerter.expect_alert().never();

        let handle = spawn(deps(provider, index, store, alerter), input());
        let received = handle.collect(Duration::from_secs(5)).await.unwrap();

        assert_eq!(received.len(), 1);
        assert!(received[0].success);
        assert_eq!(received[0].beatmap_id, None);
        assert_eq!(received[0].response, messages::not_found(Locale::En));
    }

    #[tokio::test]
    async fn test_store_failure_becomes_alerted_error_message() {
        let mut provider = MockGameDataProvider::new();
        provider
            .expect_get_top_performance()
            .returning(|_| Ok(TopPerformanceSet::default()));

        let mut index = MockScoreIndex::new();
        index.expect_find_scores().returning(|_, _| {
            Err(AppError::IndexQuery(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection reset",
            ))))
        });

        let mut alerter = MockAlerter::new();
        alerter
            .expect_alert()
            .withf(|request_id, username, _| request_id == "req-1" && username == "tester")
            .times(1)
            .returning(|_, _, _| ());

        let handle = spawn(deps(provider, index, quiet_store(), alerter), input());
        let received = handle.collect(Duration::from_secs(5)).await.unwrap();

        assert_eq!(received.len(), 1);
        assert!(!received[0].success);
        assert_eq!(received[0].response, messages::internal_error(Locale::En));
    }

    #[tokio::test]
    async fn test_panic_is_caught_and_alerted() {
        let mut provider = MockGameDataProvider::new();
        provider
            .expect_get_top_performance()
            .returning(|_| panic!("upstream exploded"));

        let mut alerter = MockAlerter::new();
        alerter
            .expect_alert()
            .withf(|_, _, error| error.contains("panicked"))
            .times(1)
            .returning(|_, _, _| ());

        let handle = spawn(
            deps(provider, MockScoreIndex::new(), quiet_store(), alerter),
            input(),
        );
        let received = handle.collect(Duration::from_secs(5)).await.unwrap();

        assert_eq!(received.len(), 1);
        assert!(!received[0].success);
    }

    #[tokio::test]
    async fn test_cached_progression_skips_analysis() {
        let mut provider = MockGameDataProvider::new();
        provider
            .expect_get_top_performance()
            .returning(|_| Ok(TopPerformanceSet::default()));

        let mut index = MockScoreIndex::new();
        index.expect_find_scores().returning(|_, _| Ok(Vec::new()));

        let mut store = MockRequestStore::new();
        store.expect_mark_pending().returning(|_, _| Ok(()));
        store.expect_clear_pending().returning(|_| Ok(()));
        store
            .expect_cached_progression()
            .times(1)
            .returning(|_| Ok(Some(ProgressionResult::empty())));
        store.expect_store_progression().never();
        store.expect_recent_suggestions().returning(|_, _| Ok(HashSet::new()));

        let mut alerter = MockAlerter::new();
        alerter.expect_alert().never();

        let handle = spawn(deps(provider, index, store, alerter), input());
        let received = handle.collect(Duration::from_secs(5)).await.unwrap();
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_localized_response() {
        let mut provider = MockGameDataProvider::new();
        provider
            .expect_get_top_performance()
            .returning(|_| Ok(TopPerformanceSet::default()));

        let mut index = MockScoreIndex::new();
        index.expect_find_scores().returning(|_, _| Ok(Vec::new()));

        let mut alerter = MockAlerter::new();
        alerter.expect_alert().never();

        let mut worker_input = input();
        worker_input.player.locale = "fr".to_string();

        let handle = spawn(deps(provider, index, quiet_store(), alerter), worker_input);
        let received = handle.collect(Duration::from_secs(5)).await.unwrap();
        assert_eq!(received[0].response, messages::not_found(Locale::Fr));
    }
}
