//! HTTP control surface for the engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/start` | Bind to a workspace: `{path, remoteStoreUrl?, remoteStoreApiKey?}` |
//! | `POST` | `/stop` | Unbind (idempotent) |
//! | `POST` | `/clear` | Unbind; `400` when nothing is bound |
//! | `POST` | `/search` | `{query, top_k?, path_prefix?}` → ranked hits |
//! | `GET`  | `/status` | `running` or `not_started`, with root and file count |
//! | `POST` | `/shutdown` | Stop the engine and exit the server gracefully |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_started", "message": "engine not started" } }
//! ```
//!
//! Error codes: `not_found` (404), `not_started` (400),
//! `remote_store_init` (500), `remote_store` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::models::{ActionResponse, SearchHit, SearchRequest, StartRequest, StatusResponse};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    shutdown: CancellationToken,
}

/// Starts the control surface on `[server].bind` and runs until Ctrl-C or
/// `POST /shutdown`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::new(config.clone())?);
    let listener = TcpListener::bind(&config.server.bind).await?;
    serve(listener, engine, CancellationToken::new()).await
}

/// Serve on an already-bound listener.
///
/// Returns once `shutdown` is cancelled (by the caller or `POST /shutdown`)
/// or Ctrl-C is received, after stopping the engine.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<Engine>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "Control surface listening");

    let app = router(engine.clone(), shutdown.clone());
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received");
                }
            }
        })
        .await?;

    engine.stop().await;
    info!("Control surface stopped");
    Ok(())
}

pub fn router(engine: Arc<Engine>, shutdown: CancellationToken) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/start", post(handle_start))
        .route("/stop", post(handle_stop))
        .route("/clear", post(handle_clear))
        .route("/search", post(handle_search))
        .route("/status", get(handle_status))
        .route("/shutdown", post(handle_shutdown))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { engine, shutdown })
}

// ============ Error response ============

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_started"`).
    pub code: String,
    pub message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let (status, code) = match &err {
            EngineError::PathNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            EngineError::NotStarted => (StatusCode::BAD_REQUEST, "not_started"),
            EngineError::RemoteStoreInit(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "remote_store_init")
            }
            EngineError::RemoteStoreOperation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "remote_store")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            warn!(code, error = %err, "Request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ Lifecycle ============

async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    // Runs detached so a caller that gives up mid-scan does not abort the start.
    let engine = state.engine.clone();
    let task = tokio::spawn(async move { engine.start(Path::new(&req.path), req.remote()).await });
    match task.await {
        Ok(result) => result?,
        Err(err) => {
            return Err(AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: err.to_string(),
            })
        }
    }
    Ok(Json(ActionResponse::new("started")))
}

async fn handle_stop(State(state): State<AppState>) -> Json<ActionResponse> {
    state.engine.stop().await;
    Json(ActionResponse::new("stopped"))
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<ActionResponse>, AppError> {
    state.engine.clear().await?;
    Ok(Json(ActionResponse::new("cleared")))
}

async fn handle_shutdown(State(state): State<AppState>) -> Json<ActionResponse> {
    info!("Shutdown requested");
    state.shutdown.cancel();
    Json(ActionResponse::new("shutting_down"))
}

// ============ Queries ============

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let hits = state
        .engine
        .search(&req.query, req.top_k, req.path_prefix.as_deref())
        .await?;
    Ok(Json(hits))
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.engine.status().await)
}

// ============ GET /health ============

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// The crate version from `Cargo.toml`.
    pub version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_mapping() {
        let err = AppError::from(EngineError::NotStarted);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "not_started");

        let err = AppError::from(EngineError::PathNotFound(PathBuf::from("/nope")));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "not_found");

        let err = AppError::from(EngineError::RemoteStoreInit("refused".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "remote_store_init");
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "not_started".to_string(),
                message: "engine not started".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({ "error": { "code": "not_started", "message": "engine not started" } })
        );
    }
}
