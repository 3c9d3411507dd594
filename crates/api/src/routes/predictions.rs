//! Prediction Routes

use axum::{extract::State, Json};
use data_cleaner::RawRow;
use dataset::Dataset;
use feature_engine::statistics::round_to;
use inference_engine::{DelayModel, InferenceEngine, Prediction};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::{ApiError, AppState};

/// Response of `POST /predict`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictResponse {
    MinorDelay {
        #[serde(rename = "Atraso menor")]
        is_minor: bool,
        #[serde(rename = "Probabilidad atraso menor (%)")]
        probability_pct: f64,
    },
    DelayMinutes {
        #[serde(rename = "Atraso menor")]
        is_minor: bool,
        #[serde(rename = "Retraso (min)")]
        minutes: f64,
    },
}

impl From<Prediction> for PredictResponse {
    fn from(prediction: Prediction) -> Self {
        let is_minor = prediction.is_minor_delay();
        match prediction {
            Prediction::MinorDelay { probability } => PredictResponse::MinorDelay {
                is_minor,
                probability_pct: round_to(probability * 100.0, 2),
            },
            Prediction::DelayMinutes { minutes } => PredictResponse::DelayMinutes {
                is_minor,
                minutes: round_to(minutes, 2),
            },
        }
    }
}

/// Predict the delay of one flight
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<PredictResponse>, ApiError> {
    let result = predict_flight(&state, &payload);
    let outcome = match &result {
        Ok(_) => "ok",
        Err(ApiError::BadRequest(_)) => "bad_request",
        Err(ApiError::UnknownCategory { .. }) => "unknown_category",
        Err(ApiError::Unavailable(_)) => "unavailable",
        Err(ApiError::Internal(_)) => "error",
    };
    metrics::counter!("predictions_total", "outcome" => outcome).increment(1);
    result.map(Json)
}

fn predict_flight(state: &AppState, payload: &Map<String, Value>) -> Result<PredictResponse, ApiError> {
    let row = raw_row(payload)?;
    let (model, map) = state.serving_pair()?;

    let mut dataset = Dataset::from_request(&row)?;
    dataset.encode_for_inference(&map)?;
    let (features, _) = dataset.split_target(model.target())?;

    let prediction = InferenceEngine::predict_with(&model, &features)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("model returned no prediction".to_string()))?;
    debug!("Prediction {:?}", prediction);
    Ok(prediction.into())
}

/// Flatten a JSON object into a raw row. Nulls are treated as absent.
pub fn raw_row(payload: &Map<String, Value>) -> Result<RawRow, ApiError> {
    let mut row = RawRow::new();
    for (key, value) in payload {
        let raw = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ApiError::BadRequest(format!(
                    "field {} must be a scalar value",
                    key
                )))
            }
        };
        row.insert(key.as_str(), raw);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_row_from_payload() {
        let payload = json!({ "Fecha_I": "2017-01-01 23:30:00", "DIA": 1, "OPERA": "Grupo LATAM", "Fecha-O": null });
        let row = raw_row(payload.as_object().unwrap()).unwrap();
        assert_eq!(row.get("DIA"), Some("1"));
        assert_eq!(row.get("Fecha_I"), Some("2017-01-01 23:30:00"));
        assert_eq!(row.get("Fecha-O"), None);
    }

    #[test]
    fn test_nested_value_rejected() {
        let payload = json!({ "OPERA": ["a", "b"] });
        assert!(matches!(
            raw_row(payload.as_object().unwrap()),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_response_shape() {
        let response = PredictResponse::from(Prediction::MinorDelay { probability: 0.87654 });
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({ "Atraso menor": true, "Probabilidad atraso menor (%)": 87.65 })
        );

        let response = PredictResponse::from(Prediction::DelayMinutes { minutes: 42.123 });
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({ "Atraso menor": false, "Retraso (min)": 42.12 })
        );
    }
}
