/// Game API v2 provider
///
/// API Flow:
/// 1. Profile: /users/{name}/{mode}?key=username → id, country, total pp
/// 2. Best scores: /users/{id}/scores/best?mode={mode}&limit=100
/// 3. Chart metadata: /beatmaps/{id}
///
/// Profiles and chart metadata are cached; best scores are always fetched fresh.
use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::Deserialize;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        ChartMetadata, Discipline, ModMask, PlayerProfile, TopScore, TOP_SCORE_LIMIT,
    },
    services::providers::GameDataProvider,
};

#[derive(Debug, Deserialize)]
struct ApiStatistics {
    #[serde(default)]
    pp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: u64,
    username: String,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    statistics: Option<ApiStatistics>,
}

impl From<ApiUser> for PlayerProfile {
    fn from(user: ApiUser) -> Self {
        let locale = user
            .country_code
            .as_deref()
            .map(locale_for_country)
            .unwrap_or("en");
        Self {
            id: user.id,
            display_name: user.username,
            locale: locale.to_string(),
            current_rating: user.statistics.and_then(|s| s.pp).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiScoreBeatmap {
    id: u32,
    #[serde(default)]
    difficulty_rating: f64,
}

#[derive(Debug, Deserialize)]
struct ApiScore {
    id: u64,
    #[serde(default)]
    pp: Option<f64>,
    /// Fraction in [0, 1]
    accuracy: f64,
    #[serde(default)]
    mods: Vec<String>,
    created_at: DateTime<Utc>,
    beatmap: ApiScoreBeatmap,
}

impl From<ApiScore> for TopScore {
    fn from(score: ApiScore) -> Self {
        // modifiers without a stable bit (lazer-only ones) are dropped
        let mods = score
            .mods
            .iter()
            .filter_map(|acronym| ModMask::from_acronyms(acronym).ok())
            .fold(ModMask::NONE, |acc, m| acc | m);
        Self {
            score_id: score.id,
            beatmap_id: score.beatmap.id,
            pp: score.pp.unwrap_or(0.0),
            accuracy: score.accuracy * 100.0,
            mods,
            star_rating: score.beatmap.difficulty_rating,
            date: score.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiBeatmapset {
    title: String,
    artist: String,
    creator: String,
}

#[derive(Debug, Deserialize)]
struct ApiBeatmap {
    id: u32,
    version: String,
    difficulty_rating: f64,
    total_length: u32,
    #[serde(default)]
    bpm: f64,
    #[serde(default)]
    ar: f64,
    /// Overall difficulty
    #[serde(default)]
    accuracy: f64,
    #[serde(default)]
    cs: f64,
    #[serde(default)]
    drain: f64,
    beatmapset: ApiBeatmapset,
}

impl From<ApiBeatmap> for ChartMetadata {
    fn from(beatmap: ApiBeatmap) -> Self {
        Self {
            beatmap_id: beatmap.id,
            title: beatmap.beatmapset.title,
            artist: beatmap.beatmapset.artist,
            version: beatmap.version,
            creator: beatmap.beatmapset.creator,
            star_rating: beatmap.difficulty_rating,
            length_secs: beatmap.total_length,
            bpm: beatmap.bpm,
            approach_rate: beatmap.ar,
            overall_difficulty: beatmap.accuracy,
            circle_size: beatmap.cs,
            drain: beatmap.drain,
        }
    }
}

/// Message language for a two-letter country code
pub fn locale_for_country(country_code: &str) -> &'static str {
    match country_code.to_ascii_uppercase().as_str() {
        "FR" | "BE" | "LU" | "MC" | "SN" | "CI" => "fr",
        "ES" | "MX" | "AR" | "CO" | "CL" | "PE" | "VE" | "EC" | "UY" | "PY" | "BO" | "CR"
        | "GT" | "DO" | "PA" | "SV" | "HN" | "NI" => "es",
        _ => "en",
    }
}

#[derive(Clone)]
pub struct OsuApiProvider {
    http_client: HttpClient,
    api_url: String,
    token: String,
    cache: Cache,
    profile_ttl: u64,
    chart_ttl: u64,
}

impl OsuApiProvider {
    pub fn new(cache: Cache, api_url: String, token: String, profile_ttl: u64, chart_ttl: u64) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            cache,
            profile_ttl,
            chart_ttl,
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> AppResult<Response> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        Ok(response)
    }
}

/// Turns a non-success response into an error
async fn ensure_success(response: Response) -> AppResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::ExternalApi(format!(
        "Game API returned status {}: {}",
        status, body
    )))
}

#[async_trait::async_trait]
impl GameDataProvider for OsuApiProvider {
    async fn get_user(&self, username: &str, discipline: Discipline) -> AppResult<PlayerProfile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::InvalidInput("Username cannot be empty".to_string()));
        }

        cached!(
            self.cache,
            CacheKey::Profile(discipline, username.to_string()),
            self.profile_ttl,
            async move {
                let path = format!("/users/{}/{}", username, discipline.api_mode());
                let response = self.get(&path, &[("key", "username")]).await?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Err(AppError::NotFound(format!("Player {} not found", username)));
                }

                let user: ApiUser = ensure_success(response).await?.json().await?;
                let profile = PlayerProfile::from(user);

                tracing::info!(
                    username = %username,
                    user_id = profile.id,
                    rating = profile.current_rating,
                    provider = "osu_api",
                    "Player resolved"
                );

                Ok(profile)
            }
        )
    }

    async fn get_top_scores(&self, user_id: u64, discipline: Discipline) -> AppResult<Vec<TopScore>> {
        let path = format!("/users/{}/scores/best", user_id);
        let limit = TOP_SCORE_LIMIT.to_string();
        let response = self
            .get(&path, &[("mode", discipline.api_mode()), ("limit", limit.as_str())])
            .await?;

        // players who never touched a discipline have no data for it
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(user_id, discipline = %discipline, "No scores for discipline");
            return Ok(Vec::new());
        }

        let scores: Vec<ApiScore> = ensure_success(response).await?.json().await?;
        let top: Vec<TopScore> = scores.into_iter().map(TopScore::from).collect();

        tracing::info!(
            user_id,
            discipline = %discipline,
            scores = top.len(),
            provider = "osu_api",
            "Top scores fetched"
        );

        Ok(top)
    }

    async fn get_chart_metadata(&self, beatmap_id: u32) -> AppResult<ChartMetadata> {
        cached!(
            self.cache,
            CacheKey::Chart(beatmap_id),
            self.chart_ttl,
            async move {
                let path = format!("/beatmaps/{}", beatmap_id);
                let response = self.get(&path, &[]).await?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Err(AppError::NotFound(format!("Chart {} not found", beatmap_id)));
                }

                let beatmap: ApiBeatmap = ensure_success(response).await?.json().await?;
                Ok(ChartMetadata::from(beatmap))
            }
        )
    }

    fn name(&self) -> &'static str {
        "osu_api"
    }
}
