use chrono::DateTime;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::collections::HashMap;

use crate::{
    error::AppResult,
    models::{ModMask, ScoreRecord, MAX_PRECISION_TIER},
    services::score_index::{IndexQuery, RangeScanner, ScanChunk},
};

/// Server-side range scan.
///
/// KEYS[1] is the sorted index; ARGV holds min, max, max_precision,
/// require_mods (1/0), tempo (0 for any), offset, count (0 for all) and the
/// key limit. Returns `{rows_scanned, accepted_keys}`. Precision tiers start at 1.
const SCAN_SCRIPT: &str = r#"
local max_precision = tonumber(ARGV[3])
local require_mods = ARGV[4] == '1'
local tempo = tonumber(ARGV[5])
local offset = tonumber(ARGV[6])
local count = tonumber(ARGV[7])
local limit = tonumber(ARGV[8])

if count <= 0 then
  count = -1
end

local members = redis.call('ZRANGEBYSCORE', KEYS[1], ARGV[1], ARGV[2], 'LIMIT', offset, count)
local keys = {}

for _, member in ipairs(members) do
  if #keys >= limit then
    break
  end
  local fields = redis.call('HMGET', member, 'precision', 'mods', 'tempo')
  local precision = tonumber(fields[1])
  local mods = tonumber(fields[2]) or 0
  local rate = tonumber(fields[3]) or 1
  if precision ~= nil and precision >= 1 and precision <= max_precision
      and (not require_mods or mods ~= 0)
      and (tempo <= 0 or math.abs(rate - tempo) < 0.001) then
    keys[#keys + 1] = member
  end
end

return {#members, keys}
"#;

/// Community score index: a sorted set of `score:{id}` members scored by pp,
/// each member naming a hash with the record's fields
#[derive(Clone)]
pub struct RedisScoreIndex {
    conn: ConnectionManager,
    key: String,
    script: Script,
}

impl RedisScoreIndex {
    pub async fn new(client: Client, key: String) -> AppResult<Self> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            key,
            script: Script::new(SCAN_SCRIPT),
        })
    }

    /// Adds or replaces records in the index
    pub async fn index_records(&self, records: &[ScoreRecord]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for record in records {
            let key = record.index_key();
            pipe.hset_multiple(&key, &record_fields(record)).ignore();
            pipe.zadd(&self.key, &key, record.pp).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::info!(records = records.len(), index = %self.key, "Score records indexed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl RangeScanner for RedisScoreIndex {
    async fn scan_chunk(
        &self,
        query: &IndexQuery,
        offset: usize,
        count: Option<usize>,
        limit: usize,
    ) -> AppResult<ScanChunk> {
        let mut conn = self.conn.clone();
        let (scanned, keys): (usize, Vec<String>) = self
            .script
            .key(&self.key)
            .arg(query.min)
            .arg(query.max)
            .arg(query.effective_precision())
            .arg(if query.require_mods { 1 } else { 0 })
            .arg(query.tempo.unwrap_or(0.0))
            .arg(offset)
            .arg(count.unwrap_or(0))
            .arg(limit)
            .invoke_async(&mut conn)
            .await?;

        Ok(ScanChunk { scanned, keys })
    }

    async fn hydrate(&self, keys: &[String]) -> AppResult<Vec<ScoreRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.hgetall(key);
        }

        let mut conn = self.conn.clone();
        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        let records = keys
            .iter()
            .zip(rows)
            .filter_map(|(key, fields)| {
                // the hash may have been removed after the scan
                if fields.is_empty() {
                    return None;
                }
                let record = parse_record(&fields);
                if record.is_none() {
                    tracing::warn!(key = %key, "Skipping malformed index record");
                }
                record
            })
            .collect();

        Ok(records)
    }
}

fn record_fields(record: &ScoreRecord) -> [(&'static str, String); 7] {
    [
        ("score_id", record.score_id.to_string()),
        ("beatmap_id", record.beatmap_id.to_string()),
        ("pp", record.pp.to_string()),
        ("mods", record.mods.bits().to_string()),
        ("precision", record.precision.to_string()),
        ("tempo", record.tempo.to_string()),
        ("date", record.date.timestamp().to_string()),
    ]
}

fn parse_record(fields: &HashMap<String, String>) -> Option<ScoreRecord> {
    let field = |name: &str| fields.get(name).map(String::as_str);
    let mods = ModMask(field("mods").unwrap_or("0").parse().ok()?);
    let precision: u8 = field("precision")?.parse().ok()?;
    if !(1..=MAX_PRECISION_TIER).contains(&precision) {
        return None;
    }

    Some(ScoreRecord {
        score_id: field("score_id")?.parse().ok()?,
        beatmap_id: field("beatmap_id")?.parse().ok()?,
        pp: field("pp")?.parse().ok()?,
        mods,
        precision,
        tempo: match field("tempo") {
            Some(t) => t.parse().ok()?,
            None => mods.tempo(),
        },
        date: DateTime::from_timestamp(field("date")?.parse().ok()?, 0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::score_index::{ScoreIndex, ScoreIndexQuery};
    use chrono::Utc;

    fn record(score_id: u64, pp: f64, precision: u8, mods: ModMask) -> ScoreRecord {
        ScoreRecord {
            score_id,
            beatmap_id: 9_000 + score_id as u32,
            pp,
            mods,
            precision,
            tempo: mods.tempo(),
            date: DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap(),
        }
    }

    #[test]
    fn test_fields_parse_back() {
        let original = record(1, 212.5, 3, ModMask::HIDDEN | ModMask::DOUBLE_TIME);
        let fields: HashMap<String, String> = record_fields(&original)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(parse_record(&fields), Some(original));
    }

    #[test]
    fn test_missing_tempo_derived_from_mods() {
        let fields: HashMap<String, String> = [
            ("score_id", "5"),
            ("beatmap_id", "6"),
            ("pp", "100"),
            ("mods", "256"),
            ("precision", "2"),
            ("date", "1700000000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let parsed = parse_record(&fields).unwrap();
        assert_eq!(parsed.tempo, 0.75);
    }

    #[test]
    fn test_precision_outside_tiers_rejected() {
        for precision in ["0", "10"] {
            let mut fields: HashMap<String, String> = record_fields(&record(7, 150.0, 1, ModMask::NONE))
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            fields.insert("precision".to_string(), precision.to_string());
            assert_eq!(parse_record(&fields), None, "precision {}", precision);
        }
    }

    #[test]
    fn test_malformed_record_rejected() {
        let fields: HashMap<String, String> =
            [("score_id".to_string(), "abc".to_string())].into_iter().collect();
        assert_eq!(parse_record(&fields), None);
    }

    async fn index(key: &str) -> RedisScoreIndex {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = crate::db::create_redis_client(&redis_url).unwrap();
        RedisScoreIndex::new(client, key.to_string()).await.unwrap()
    }

    async fn cleanup(index: &RedisScoreIndex, records: &[ScoreRecord]) {
        let mut conn = index.conn.clone();
        let mut pipe = redis::pipe();
        pipe.del(&index.key).ignore();
        for record in records {
            pipe.del(record.index_key()).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_script_filters_next_to_data() {
        let index = index("test:scores:filters").await;
        let records = vec![
            record(101, 150.0, 2, ModMask::NONE),
            record(102, 160.0, 7, ModMask::HIDDEN),
            record(103, 170.0, 3, ModMask::DOUBLE_TIME),
            record(104, 400.0, 1, ModMask::NONE),
        ];
        index.index_records(&records).await.unwrap();

        let mut query = IndexQuery::new(100.0, 200.0);
        query.max_precision = 8;
        let chunk = index.scan_chunk(&query, 0, None, 100).await.unwrap();
        assert_eq!(chunk.scanned, 3);
        assert_eq!(chunk.keys.len(), 3);

        query.require_mods = true;
        let chunk = index.scan_chunk(&query, 0, None, 100).await.unwrap();
        assert_eq!(chunk.keys, vec!["score:103".to_string()]);

        query.require_mods = false;
        query.tempo = Some(1.5);
        let chunk = index.scan_chunk(&query, 0, None, 100).await.unwrap();
        assert_eq!(chunk.keys, vec!["score:103".to_string()]);

        cleanup(&index, &records).await;
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_paginated_query_matches_single_scan() {
        let index = index("test:scores:pages").await;
        let records: Vec<ScoreRecord> = (0..25)
            .map(|i| record(200 + i, 100.0 + i as f64, (i % 9 + 1) as u8, ModMask::NONE))
            .collect();
        index.index_records(&records).await.unwrap();

        let mut query = IndexQuery::new(100.0, 130.0);
        query.max_precision = 5;

        let paged = ScoreIndexQuery::new(index.clone(), 4, 1000, true)
            .find_scores(&query, "evt")
            .await
            .unwrap();
        let single = ScoreIndexQuery::new(index.clone(), 4, 1000, false)
            .find_scores(&query, "evt")
            .await
            .unwrap();

        assert_eq!(paged.len(), single.len());
        assert!(paged.iter().all(|r| r.precision <= 5));

        cleanup(&index, &records).await;
    }
}
