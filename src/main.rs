use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pp_recommender::{
    api::{create_router, AppState},
    config::Config,
    db::{create_redis_client, Cache, RedisRequestStore, RedisScoreIndex},
    services::{
        alerting::LogAlerter,
        progression::ProgressionWeights,
        providers::osu_api::OsuApiProvider,
        score_index::ScoreIndexQuery,
    },
    worker::{WorkerDeps, WorkerSettings},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pp_recommender=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_handle) = Cache::new(redis_client.clone()).await;

    let scanner = RedisScoreIndex::new(redis_client, config.score_index_key.clone())
        .await
        .context("Failed to connect to the score index")?;
    let index = ScoreIndexQuery::new(
        scanner,
        config.index_chunk_size,
        config.index_max_results,
        config.index_paginated,
    );

    let provider = OsuApiProvider::new(
        cache.clone(),
        config.game_api_url.clone(),
        config.game_api_token.clone(),
        config.profile_cache_ttl,
        config.chart_cache_ttl,
    );

    let store = RedisRequestStore::new(
        cache,
        config.pending_marker_ttl,
        config.progression_cache_ttl,
        config.suggestion_retention_days,
    );

    let deps = WorkerDeps {
        provider: Arc::new(provider),
        index: Arc::new(index),
        store: Arc::new(store),
        alerter: Arc::new(LogAlerter),
        settings: WorkerSettings {
            timeout: Duration::from_secs(config.worker_timeout_secs),
            suggestion_retention: chrono::Duration::days(config.suggestion_retention_days),
            weights: ProgressionWeights {
                primary: config.primary_discipline()?,
                primary_weight: config.primary_discipline_weight,
            },
        },
    };

    let app = create_router(AppState::new(deps)).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(address = %addr, index = %config.score_index_key, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cache_handle.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
