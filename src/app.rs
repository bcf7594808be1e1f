use crate::analysis::{AnalysisResult, MediaAnalysisService, MediaSource, MediaType};
use crate::config::Config;
use crate::error::ServiceError;
use crate::gemini::{GeminiClient, GenerativeApi};
use crate::recommend::{resolve_candidates, HashtagRecommender, RecommendResults};
use crate::store::HashtagStore;
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub analysis: Arc<MediaAnalysisService>,
    pub recommender: Arc<HashtagRecommender>,
    pub store: Arc<HashtagStore>,
    pub persist_hashtags: bool,
}

impl AppState {
    pub fn new(backend: Arc<dyn GenerativeApi>, store: HashtagStore, persist_hashtags: bool) -> Self {
        Self {
            analysis: Arc::new(MediaAnalysisService::new(backend.clone())),
            recommender: Arc::new(HashtagRecommender::new(backend)),
            store: Arc::new(store),
            persist_hashtags,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    file_url: Option<String>,
    file_path: Option<String>,
    media_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendRequest {
    words: Option<Vec<String>>,
    hashtags: Option<Vec<String>>,
    hashtags_file_path: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    ok: bool,
    #[serde(flatten)]
    result: AnalysisResult,
}

#[derive(Serialize)]
struct RecommendResponse {
    ok: bool,
    results: RecommendResults,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let backend: Arc<dyn GenerativeApi> = Arc::new(GeminiClient::new(&config));
    info!("Using Gemini model {}", config.model);
    info!("Hashtag store at {}", config.hashtags_path.display());
    if config.persist_hashtags {
        info!("Hashtags from /analyze will be appended to the store");
    }

    let state = AppState::new(
        backend,
        HashtagStore::new(config.hashtags_path.clone()),
        config.persist_hashtags,
    );
    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/recommend", post(handle_recommend))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn handle_analyze(State(state): State<AppState>, body: Bytes) -> Response {
    match analyze(&state, &body).await {
        Ok(result) => (StatusCode::OK, Json(AnalyzeResponse { ok: true, result })).into_response(),
        Err(e) => {
            warn!("Analyze failed: {}", e);
            e.into_response()
        }
    }
}

async fn analyze(state: &AppState, body: &[u8]) -> Result<AnalysisResult, ServiceError> {
    let req: AnalyzeRequest = parse_body(body)?;
    let media_type: MediaType = req
        .media_type
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or("image")
        .parse()?;
    let source = MediaSource::from_request(req.file_url.as_deref(), req.file_path.as_deref())?;

    let result = state.analysis.analyze(&source, media_type).await?;

    if state.persist_hashtags {
        if let Err(e) = state.store.append(&result.hashtags_clean).await {
            warn!(
                "Failed to save hashtags to {}: {}",
                state.store.path().display(),
                e
            );
        }
    }
    Ok(result)
}

async fn handle_recommend(State(state): State<AppState>, body: Bytes) -> Response {
    match recommend(&state, &body).await {
        Ok(results) => (StatusCode::OK, Json(RecommendResponse { ok: true, results })).into_response(),
        Err(e) => {
            warn!("Recommend failed: {}", e);
            e.into_response()
        }
    }
}

async fn recommend(state: &AppState, body: &[u8]) -> Result<RecommendResults, ServiceError> {
    let req: RecommendRequest = parse_body(body)?;
    let words = req.words.unwrap_or_default();
    let override_path = req
        .hashtags_file_path
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    let hashtags = resolve_candidates(req.hashtags, override_path, &state.store).await?;
    info!(
        "Recommending for {} words against {} hashtags",
        words.len(),
        hashtags.len()
    );
    Ok(state.recommender.recommend(&words, &hashtags).await)
}

/// Unparseable or falsy JSON bodies (`null`, `false`, `0`, `""`, `[]`) count as `{}`.
/// Anything else must be an object of the right shape.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ServiceError> {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    match value {
        Value::Object(_) => serde_json::from_value(value)
            .map_err(|e| ServiceError::invalid(format!("Malformed request body: {}", e))),
        v if is_falsy(&v) => Ok(T::default()),
        _ => Err(ServiceError::invalid(
            "Malformed request body: expected a JSON object",
        )),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
