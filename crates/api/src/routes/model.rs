//! Model Routes

use axum::{extract::State, Json};
use dataset::TargetKind;
use inference_engine::DelayModel;
use serde::Serialize;
use std::sync::Arc;

use crate::{ApiError, AppState};

/// One ranked feature
#[derive(Debug, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Response of `GET /model/importance`
#[derive(Debug, Serialize)]
pub struct ImportanceResponse {
    pub target: TargetKind,
    pub features: Vec<FeatureImportance>,
}

/// Feature importances of the current model, most important first
pub async fn importance(State(state): State<Arc<AppState>>) -> Result<Json<ImportanceResponse>, ApiError> {
    let model = state.engine.model()?;
    let features = model
        .feature_importance()?
        .into_iter()
        .map(|(feature, importance)| FeatureImportance { feature, importance })
        .collect();

    Ok(Json(ImportanceResponse {
        target: model.target(),
        features,
    }))
}
