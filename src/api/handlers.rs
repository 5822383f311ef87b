//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.
//!
//! The engine API is synchronous and only holds a shard lock for the
//! duration of one call, so handlers invoke it directly.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::cache::CacheEngine;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache engine
    pub cache: Arc<CacheEngine>,
}

impl AppState {
    /// Creates a new AppState around an engine.
    pub fn new(cache: CacheEngine) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(CacheEngine::new(config.cache.clone())?))
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair with optional cost and TTL. A write the admission
/// policy turns away still answers 200 with `admitted: false`.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidKey(error_msg));
    }

    let ttl = req.ttl_duration();
    let admitted = state
        .cache
        .set(req.key.as_bytes(), req.value.into_bytes(), req.cost, ttl)?;
    if !admitted {
        debug!(key = %req.key, "set not admitted");
    }

    Ok(Json(SetResponse::new(req.key, admitted)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get(key.as_bytes())?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    let value = String::from_utf8(value)
        .map_err(|_| CacheError::Internal(format!("value of '{}' is not UTF-8", key)))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Idempotent: deleting an absent key answers 200 with `removed: false`.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let removed = state.cache.delete(key.as_bytes())?;

    Ok(Json(DeleteResponse::new(key, removed)))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear();
    Json(ClearResponse::cleared())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
