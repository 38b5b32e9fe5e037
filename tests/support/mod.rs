//! In-memory collaborators for integration tests
#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pp_recommender::{
    db::RequestStore,
    error::{AppError, AppResult},
    models::{
        ChartMetadata, Discipline, HistoryEntry, ModMask, PlayerProfile, ScoreRecord, TopScore,
    },
    services::{
        alerting::Alerter,
        progression::ProgressionResult,
        providers::GameDataProvider,
        score_index::{IndexQuery, RangeScanner, ScanChunk, ScoreIndexQuery},
    },
    worker::{WorkerDeps, WorkerSettings},
};

pub fn record(score_id: u64, beatmap_id: u32, pp: f64, precision: u8, mods: ModMask) -> ScoreRecord {
    ScoreRecord {
        score_id,
        beatmap_id,
        pp,
        mods,
        precision,
        tempo: mods.tempo(),
        date: Utc::now() - ChronoDuration::days(3),
    }
}

/// Score index held in memory, scanned the way the server-side script does
#[derive(Default)]
pub struct MemoryScanner {
    records: Vec<ScoreRecord>,
    pub scans: Mutex<usize>,
}

impl MemoryScanner {
    pub fn new(mut records: Vec<ScoreRecord>) -> Self {
        records.sort_by(|a, b| a.pp.total_cmp(&b.pp));
        Self {
            records,
            scans: Mutex::new(0),
        }
    }
}

#[async_trait::async_trait]
impl RangeScanner for MemoryScanner {
    async fn scan_chunk(
        &self,
        query: &IndexQuery,
        offset: usize,
        count: Option<usize>,
        limit: usize,
    ) -> AppResult<ScanChunk> {
        *self.scans.lock().unwrap() += 1;
        let window: Vec<&ScoreRecord> = self
            .records
            .iter()
            .filter(|r| r.pp >= query.min && r.pp <= query.max)
            .skip(offset)
            .take(count.unwrap_or(usize::MAX))
            .collect();
        let keys = window
            .iter()
            .filter(|r| query.accepts(r))
            .take(limit)
            .map(|r| r.index_key())
            .collect();
        Ok(ScanChunk {
            scanned: window.len(),
            keys,
        })
    }

    async fn hydrate(&self, keys: &[String]) -> AppResult<Vec<ScoreRecord>> {
        Ok(keys
            .iter()
            .filter_map(|key| self.records.iter().find(|r| &r.index_key() == key))
            .cloned()
            .collect())
    }
}

pub fn chart(beatmap_id: u32) -> ChartMetadata {
    ChartMetadata {
        beatmap_id,
        title: format!("Song {}", beatmap_id),
        artist: "Artist".to_string(),
        version: "Insane".to_string(),
        creator: "mapper".to_string(),
        star_rating: 5.4,
        length_secs: 125,
        bpm: 175.0,
        approach_rate: 9.3,
        overall_difficulty: 8.5,
        circle_size: 4.0,
        drain: 6.0,
    }
}

/// Provider answering from fixed data
#[derive(Clone, Default)]
pub struct StubProvider {
    pub users: HashMap<String, PlayerProfile>,
    pub top_scores: HashMap<Discipline, Vec<TopScore>>,
    pub delay: Option<Duration>,
    /// Top score fetches that ran to completion
    pub completed_fetches: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn with_player(player: PlayerProfile, scores: Vec<TopScore>) -> Self {
        let mut provider = Self::default();
        provider
            .users
            .insert(player.display_name.to_lowercase(), player);
        provider.top_scores.insert(Discipline::Osu, scores);
        provider
    }
}

#[async_trait::async_trait]
impl GameDataProvider for StubProvider {
    async fn get_user(&self, username: &str, _discipline: Discipline) -> AppResult<PlayerProfile> {
        self.users
            .get(&username.to_lowercase())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Player {} not found", username)))
    }

    async fn get_top_scores(&self, _user_id: u64, discipline: Discipline) -> AppResult<Vec<TopScore>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.top_scores.get(&discipline).cloned().unwrap_or_default())
    }

    async fn get_chart_metadata(&self, beatmap_id: u32) -> AppResult<ChartMetadata> {
        Ok(chart(beatmap_id))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub pending: Mutex<HashMap<String, String>>,
    pub pending_seen: Mutex<Vec<String>>,
    pub progression: Mutex<HashMap<u64, ProgressionResult>>,
    pub suggestions: Mutex<Vec<(u64, u32, DateTime<Utc>)>>,
}

#[async_trait::async_trait]
impl RequestStore for MemoryStore {
    async fn mark_pending(&self, request_id: &str, username: &str) -> AppResult<()> {
        self.pending
            .lock()
            .unwrap()
            .insert(request_id.to_string(), username.to_string());
        self.pending_seen.lock().unwrap().push(request_id.to_string());
        Ok(())
    }

    async fn clear_pending(&self, request_id: &str) -> AppResult<()> {
        self.pending.lock().unwrap().remove(request_id);
        Ok(())
    }

    async fn cached_progression(&self, user_id: u64) -> AppResult<Option<ProgressionResult>> {
        Ok(self.progression.lock().unwrap().get(&user_id).cloned())
    }

    async fn store_progression(&self, user_id: u64, progression: &ProgressionResult) {
        self.progression
            .lock()
            .unwrap()
            .insert(user_id, progression.clone());
    }

    async fn recent_suggestions(&self, user_id: u64, since: DateTime<Utc>) -> AppResult<HashSet<u32>> {
        Ok(self
            .suggestions
            .lock()
            .unwrap()
            .iter()
            .filter(|(user, _, at)| *user == user_id && *at >= since)
            .map(|(_, beatmap_id, _)| *beatmap_id)
            .collect())
    }

    async fn record_suggestion(&self, user_id: u64, beatmap_id: u32, at: DateTime<Utc>) -> AppResult<()> {
        self.suggestions
            .lock()
            .unwrap()
            .push((user_id, beatmap_id, at));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAlerter {
    pub alerts: Mutex<Vec<(String, String, String)>>,
}

#[async_trait::async_trait]
impl Alerter for RecordingAlerter {
    async fn alert(&self, request_id: &str, username: &str, error: &str) {
        self.alerts.lock().unwrap().push((
            request_id.to_string(),
            username.to_string(),
            error.to_string(),
        ));
    }
}

pub fn player(name: &str, rating: f64) -> PlayerProfile {
    PlayerProfile {
        id: 1001,
        display_name: name.to_string(),
        locale: "en".to_string(),
        current_rating: rating,
    }
}

/// Best scores on charts `1..=count`, oldest first, slowly climbing around `around`
pub fn top_scores(count: u32, around: f64) -> Vec<TopScore> {
    let start = Utc::now() - ChronoDuration::days(i64::from(count) * 3);
    (1..=count)
        .map(|i| TopScore {
            score_id: u64::from(i) * 1000,
            beatmap_id: i,
            pp: around - 10.0 + f64::from(i) * 0.5,
            accuracy: 97.5,
            mods: ModMask::NONE,
            star_rating: 5.5,
            date: start + ChronoDuration::days(i64::from(i) * 3),
        })
        .collect()
}

/// Shared handles on the collaborators behind a `WorkerDeps`
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub alerter: Arc<RecordingAlerter>,
    pub deps: Arc<WorkerDeps>,
}

pub fn harness(provider: StubProvider, records: Vec<ScoreRecord>, chunk_size: usize) -> Harness {
    harness_with_settings(provider, records, chunk_size, WorkerSettings::default())
}

pub fn harness_with_settings(
    provider: StubProvider,
    records: Vec<ScoreRecord>,
    chunk_size: usize,
    settings: WorkerSettings,
) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let alerter = Arc::new(RecordingAlerter::default());
    let index = ScoreIndexQuery::new(MemoryScanner::new(records), chunk_size, 50_000, true);
    let deps = Arc::new(WorkerDeps {
        provider: Arc::new(provider),
        index: Arc::new(index),
        store: store.clone(),
        alerter: alerter.clone(),
        settings,
    });
    Harness {
        store,
        alerter,
        deps,
    }
}

/// Histories keyed the way progression analysis expects them
pub fn histories(scores: &[TopScore]) -> BTreeMap<Discipline, Vec<HistoryEntry>> {
    let mut history: Vec<HistoryEntry> = scores.iter().map(HistoryEntry::from).collect();
    history.sort_by_key(|h| h.date);
    BTreeMap::from([(Discipline::Osu, history)])
}
