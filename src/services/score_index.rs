use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{ScoreRecord, MAX_PRECISION_TIER},
};

/// Precision ceiling applied whenever a modifier filter is requested
pub const MOD_PRECISION_CAP: u8 = 5;
/// Tolerance when matching a requested tempo
pub const TEMPO_TOLERANCE: f64 = 0.001;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_MAX_RESULTS: usize = 50_000;

/// A reward-value window plus the filters applied next to the data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexQuery {
    pub min: f64,
    pub max: f64,
    /// Only accept scores that carry at least one modifier
    pub require_mods: bool,
    pub tempo: Option<f64>,
    /// Worst precision tier the caller is willing to see
    pub max_precision: u8,
}

impl IndexQuery {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            require_mods: false,
            tempo: None,
            max_precision: MOD_PRECISION_CAP,
        }
    }

    /// Precision ceiling actually sent to the store
    pub fn effective_precision(&self) -> u8 {
        let ceiling = self.max_precision.min(MAX_PRECISION_TIER);
        if self.require_mods {
            ceiling.min(MOD_PRECISION_CAP)
        } else {
            ceiling
        }
    }

    /// Rejects windows that cannot be expressed as a score range
    pub fn validate(&self) -> AppResult<()> {
        let valid = self.min.is_finite() && self.max.is_finite() && self.min >= 0.0;
        let tempo_valid = self.tempo.map(|t| t.is_finite() && t > 0.0).unwrap_or(true);
        if valid && tempo_valid {
            Ok(())
        } else {
            Err(AppError::InvalidRange {
                min: self.min,
                max: self.max,
            })
        }
    }

    /// Whether a hydrated record satisfies every filter of this query
    pub fn accepts(&self, record: &ScoreRecord) -> bool {
        let in_window = record.pp >= self.min && record.pp <= self.max;
        let precise = record.precision >= 1 && record.precision <= self.effective_precision();
        let mods_ok = !self.require_mods || !record.mods.is_empty();
        let tempo_ok = self
            .tempo
            .map(|t| (record.tempo - t).abs() < TEMPO_TOLERANCE)
            .unwrap_or(true);
        in_window && precise && mods_ok && tempo_ok
    }
}

/// One invocation of the server-side range scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanChunk {
    /// Raw index rows visited, before filtering
    pub scanned: usize,
    /// Keys that passed the filters
    pub keys: Vec<String>,
}

/// Store-side primitives behind the score index
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RangeScanner: Send + Sync {
    /// Scans the index between `query.min` and `query.max`, starting at `offset`.
    ///
    /// `count` bounds the rows visited (`None` scans to the end of the window),
    /// `limit` bounds the keys returned.
    async fn scan_chunk(
        &self,
        query: &IndexQuery,
        offset: usize,
        count: Option<usize>,
        limit: usize,
    ) -> AppResult<ScanChunk>;

    /// Bulk field lookup; keys whose record vanished are skipped
    async fn hydrate(&self, keys: &[String]) -> AppResult<Vec<ScoreRecord>>;
}

/// Range lookup of previously observed community scores
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ScoreIndex: Send + Sync {
    async fn find_scores(&self, query: &IndexQuery, event_id: &str) -> AppResult<Vec<ScoreRecord>>;
}

/// Validates, paginates and hydrates range queries against a scanner
pub struct ScoreIndexQuery<S> {
    scanner: S,
    chunk_size: usize,
    max_results: usize,
    paginated: bool,
}

impl<S: RangeScanner> ScoreIndexQuery<S> {
    pub fn new(scanner: S, chunk_size: usize, max_results: usize, paginated: bool) -> Self {
        Self {
            scanner,
            chunk_size: chunk_size.max(1),
            max_results: max_results.max(1),
            paginated,
        }
    }

    /// Single invocation, unbounded scan capped at `max_results` keys
    async fn scan_once(&self, query: &IndexQuery) -> AppResult<Vec<String>> {
        let chunk = self
            .scanner
            .scan_chunk(query, 0, None, self.max_results)
            .await?;
        Ok(chunk.keys)
    }

    /// Repeated fixed-size scans until the window is exhausted or the cap is hit
    async fn scan_paginated(&self, query: &IndexQuery, event_id: &str) -> AppResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut offset = 0;
        let mut chunks = 0;

        loop {
            let remaining = self.max_results - keys.len();
            let chunk = self
                .scanner
                .scan_chunk(query, offset, Some(self.chunk_size), remaining)
                .await?;
            chunks += 1;
            keys.extend(chunk.keys);

            if chunk.scanned < self.chunk_size || keys.len() >= self.max_results {
                break;
            }
            offset += self.chunk_size;
        }

        keys.truncate(self.max_results);
        tracing::debug!(
            event_id = %event_id,
            chunks,
            keys = keys.len(),
            "Paginated index scan finished"
        );
        Ok(keys)
    }
}

#[async_trait::async_trait]
impl<S: RangeScanner> ScoreIndex for ScoreIndexQuery<S> {
    #[instrument(skip(self, query), fields(min = query.min, max = query.max))]
    async fn find_scores(&self, query: &IndexQuery, event_id: &str) -> AppResult<Vec<ScoreRecord>> {
        query.validate()?;

        if query.min > query.max {
            tracing::debug!(event_id = %event_id, "Inverted window, nothing to scan");
            return Ok(Vec::new());
        }

        let keys = if self.paginated {
            self.scan_paginated(query, event_id).await?
        } else {
            self.scan_once(query).await?
        };

        let mut records = Vec::with_capacity(keys.len());
        for batch in keys.chunks(self.chunk_size) {
            records.extend(self.scanner.hydrate(batch).await?);
        }

        // records may have changed between the scan and the hydration
        let hydrated = records.len();
        records.retain(|r| query.accepts(r));

        tracing::info!(
            event_id = %event_id,
            keys = keys.len(),
            hydrated,
            accepted = records.len(),
            require_mods = query.require_mods,
            max_precision = query.effective_precision(),
            "Score index query completed"
        );

        Ok(records)
    }
}
