use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{AlgorithmKind, Discipline, ModMask, ModRequirement, RecommendationRequest},
    worker::{self, WorkerInput, WorkerMessage},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationBody {
    pub username: String,
    /// Defaults to osu
    pub discipline: Option<String>,
    pub algorithm: Option<String>,
    pub target_pp: Option<f64>,
    /// Acronym string such as "HDDT" or "NM"
    pub mods: Option<String>,
    /// Compare modifiers exactly instead of allowing extra ones
    #[serde(default)]
    pub exact_mods: bool,
    pub tempo: Option<f64>,
}

impl RecommendationBody {
    /// Validates the body and builds the worker request
    pub fn into_request(self) -> AppResult<(String, RecommendationRequest)> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::InvalidInput("Username cannot be empty".to_string()));
        }

        let discipline = match self.discipline.as_deref() {
            Some(d) => d.parse::<Discipline>().map_err(AppError::InvalidInput)?,
            None => Discipline::Osu,
        };

        let mut request = RecommendationRequest::new(discipline);

        request.algorithm = self
            .algorithm
            .as_deref()
            .map(str::parse::<AlgorithmKind>)
            .transpose()
            .map_err(AppError::InvalidInput)?;

        if let Some(target) = self.target_pp {
            if !target.is_finite() || target < 0.0 {
                return Err(AppError::InvalidInput(format!("Invalid target pp: {}", target)));
            }
            request.target_pp = Some(target);
        }

        if let Some(mods) = self.mods.as_deref() {
            let mask = ModMask::from_acronyms(mods)?;
            request.mods = Some(if self.exact_mods {
                ModRequirement::exact(mask)
            } else {
                ModRequirement::superset(mask)
            });
        }

        if let Some(tempo) = self.tempo {
            if !tempo.is_finite() || tempo <= 0.0 {
                return Err(AppError::InvalidInput(format!("Invalid tempo: {}", tempo)));
            }
            request.tempo = Some(tempo);
        }

        Ok((username, request))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub request_id: String,
    pub messages: Vec<WorkerMessage>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Resolves the player, runs a worker for the request and returns what it reported
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<RecommendationBody>,
) -> AppResult<Json<RecommendationResponse>> {
    let (username, request) = body.into_request()?;
    let player = state
        .deps
        .provider
        .get_user(&username, request.discipline)
        .await?;

    tracing::info!(
        request_id = %request_id,
        player = %player.display_name,
        discipline = %request.discipline,
        "Recommendation requested"
    );

    let handle = worker::spawn(
        state.deps.clone(),
        WorkerInput {
            request_id: request_id.to_string(),
            player,
            request,
        },
    );
    let messages = handle.collect(state.deps.settings.timeout).await?;

    Ok(Json(RecommendationResponse {
        request_id: request_id.to_string(),
        messages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModMatch;

    fn body(json: Value) -> RecommendationBody {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_minimal_body_defaults() {
        let (username, request) = body(json!({ "username": " whitecat " })).into_request().unwrap();
        assert_eq!(username, "whitecat");
        assert_eq!(request, RecommendationRequest::new(Discipline::Osu));
    }

    #[test]
    fn test_full_body() {
        let (_, request) = body(json!({
            "username": "p",
            "discipline": "mania",
            "algorithm": "refined",
            "target_pp": 250.0,
            "mods": "HDDT",
            "exact_mods": true,
            "tempo": 1.5
        }))
        .into_request()
        .unwrap();

        assert_eq!(request.discipline, Discipline::Mania);
        assert_eq!(request.algorithm, Some(AlgorithmKind::Base));
        assert_eq!(request.target_pp, Some(250.0));
        let mods = request.mods.unwrap();
        assert_eq!(mods.mode, ModMatch::Exact);
        assert_eq!(mods.mask, ModMask::HIDDEN | ModMask::DOUBLE_TIME);
        assert_eq!(request.tempo, Some(1.5));
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let cases = vec![
            json!({ "username": "" }),
            json!({ "username": "p", "discipline": "drums" }),
            json!({ "username": "p", "algorithm": "greedy" }),
            json!({ "username": "p", "mods": "XYZ" }),
            json!({ "username": "p", "target_pp": -1.0 }),
            json!({ "username": "p", "tempo": 0.0 }),
        ];
        for case in cases {
            let result = body(case.clone()).into_request();
            assert!(matches!(result, Err(AppError::InvalidInput(_))), "{}", case);
        }
    }
}
