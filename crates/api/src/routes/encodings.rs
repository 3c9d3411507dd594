//! Encoding Map Routes

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::{ApiError, AppState};

/// Response of `POST /encodings/reload`
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub generation: u64,
    pub fingerprint: String,
    pub entries: usize,
    pub model_loaded: bool,
}

/// Re-read the persisted encoding map and model and swap them in.
///
/// Answers 503 when the loaded model was trained with a different map.
pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>, ApiError> {
    let map = state.encodings.reload()?.ok_or_else(|| {
        ApiError::Unavailable(format!(
            "no encoding map at {}",
            state.encodings.path().display()
        ))
    })?;
    let model_loaded = state.engine.load()?;
    if model_loaded {
        state.serving_pair()?;
    }

    let generation = state.encodings.generation();
    metrics::gauge!("encoding_map_generation").set(generation as f64);
    info!("Reloaded encoding map, generation {}", generation);

    Ok(Json(ReloadResponse {
        generation,
        fingerprint: map.fingerprint.clone(),
        entries: map.len(),
        model_loaded,
    }))
}
