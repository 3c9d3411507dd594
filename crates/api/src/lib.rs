//! Flight Delay API Server
//!
//! HTTP front end over the persisted encoding map and delay model.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use feature_engine::EncodingMap;
use inference_engine::{InferenceEngine, LinearModel};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::Arc;
use storage::EncodingStore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod config;
mod error;
pub mod routes;
pub mod training;

pub use self::config::ServiceConfig;
pub use error::ApiError;
pub use training::{run_training, TrainingRun};

/// Application state shared across handlers
pub struct AppState {
    /// Current encoding map snapshot
    pub encodings: EncodingStore,
    /// Current model snapshot
    pub engine: InferenceEngine,
    /// Prometheus renderer, `None` when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(encodings: EncodingStore, engine: InferenceEngine, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            encodings,
            engine,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Load the persisted encoding map and model named by the configuration
    pub fn open(config: &ServiceConfig, metrics: Option<PrometheusHandle>) -> Result<Self, ApiError> {
        let encodings = EncodingStore::open(&config.encoding_map_path)?;
        let engine = InferenceEngine::open(&config.model_path)?;
        metrics::gauge!("encoding_map_generation").set(encodings.generation() as f64);
        Ok(Self::new(encodings, engine, metrics))
    }

    /// Current model and encoding map, refusing a pair fitted in different runs
    pub fn serving_pair(&self) -> Result<(Arc<LinearModel>, Arc<EncodingMap>), ApiError> {
        let model = self.engine.model()?;
        let map = self
            .encodings
            .snapshot()?
            .ok_or(dataset::DatasetError::EncodingMapMissing)?;

        let trained_with = model.artifact().and_then(|a| a.encoding_fingerprint.as_deref());
        if trained_with != Some(map.fingerprint.as_str()) {
            return Err(ApiError::Unavailable(format!(
                "model was trained with encoding map {} but {} is loaded",
                trained_with.unwrap_or("<unknown>"),
                map.fingerprint
            )));
        }
        Ok((model, map))
    }
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub encoding_map_generation: u64,
    pub model_loaded: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/predict", post(routes::predictions::predict))
        .route("/encodings/reload", post(routes::encodings::reload))
        .route("/model/importance", get(routes::model::importance))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Status handler
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: format!("Service is operational at: {}.", Local::now().naive_local()),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        encoding_map_generation: state.encodings.generation(),
        model_loaded: state.engine.is_loaded(),
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::OK, String::new()),
    }
}

/// Initialize logging; `RUST_LOG` overrides the `info` default
pub fn init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

/// Run the server
pub async fn run_server(config: &ServiceConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let state = Arc::new(AppState::open(config, Some(handle))?);
    let app = create_router(state);

    info!("Starting API server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
