//! HTTP front end over one shared simulation session.
//!
//! Routes:
//! - `POST /init` `{ "procedure"?: id }` start (or restart) a session
//! - `POST /switch-procedure` `{ "procedure": id }`
//! - `POST /step` run one cycle
//! - `POST /rollback` restore the store to the last checkpoint
//! - `GET /state` current snapshot
//! - `POST /question` `{ "question": text }`
//! - `GET /health`
//!
//! The session lives behind one mutex; every operation runs on a blocking
//! worker thread so validation never stalls the runtime.

use crate::config::{MissingFiles, SimulatorConfig};
use crate::models::{CycleOutcome, SessionSnapshot};
use crate::session::SessionController;
use crate::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// `None` until `/init` succeeds
    pub session: Arc<Mutex<Option<SessionController>>>,
    pub config: Arc<SimulatorConfig>,
}

impl AppState {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            config: Arc::new(config),
        }
    }
}

/// Errors returned to clients as `{"error": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Simulator not initialized")]
    NotInitialized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<MissingFiles>() {
            Some(missing) => ApiError::BadRequest(missing.to_string()),
            None => ApiError::Internal(err),
        }
    }
}

impl From<crate::error::SimError> for ApiError {
    fn from(err: crate::error::SimError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotInitialized | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct InitRequest {
    #[serde(default)]
    pub procedure: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SwitchRequest {
    #[serde(default)]
    pub procedure: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResponse {
    pub rolled_back: bool,
    pub state: SessionSnapshot,
}

/// Build the router; separate from [`serve`] so tests can drive it directly
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/init", post(init))
        .route("/switch-procedure", post(switch_procedure))
        .route("/step", post(step))
        .route("/rollback", post(rollback))
        .route("/state", get(current_state))
        .route("/question", post(question))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: SimulatorConfig, host: &str, port: u16) -> Result<()> {
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "http server listening");
    println!("✓ Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Run `f` against the live session on a blocking thread
async fn with_session<T, F>(state: &AppState, f: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce(&mut SessionController) -> std::result::Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let session = Arc::clone(&state.session);
    tokio::task::spawn_blocking(move || {
        let mut guard = session
            .lock()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("session lock poisoned")))?;
        let controller = guard.as_mut().ok_or(ApiError::NotInitialized)?;
        f(controller)
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))?
}

async fn health_check() -> &'static str {
    "OK"
}

async fn init(
    State(state): State<AppState>,
    body: Option<Json<InitRequest>>,
) -> ApiResult<SessionSnapshot> {
    let procedure = body
        .and_then(|Json(req)| req.procedure)
        .unwrap_or_else(|| state.config.initial_procedure.clone());
    let config = Arc::clone(&state.config);
    let session = Arc::clone(&state.session);

    let snapshot = tokio::task::spawn_blocking(move || {
        let mut controller = config.open_session(&procedure)?;
        controller.validate_now()?;
        let snapshot = controller.get_state();

        let mut guard = session
            .lock()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("session lock poisoned")))?;
        *guard = Some(controller);
        Ok::<_, ApiError>(snapshot)
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))??;

    Ok(Json(snapshot))
}

async fn switch_procedure(
    State(state): State<AppState>,
    body: Option<Json<SwitchRequest>>,
) -> ApiResult<SessionSnapshot> {
    let procedure = body.and_then(|Json(req)| req.procedure);
    let snapshot = with_session(&state, move |controller| {
        let procedure = procedure
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::BadRequest("No procedure specified".into()))?;
        if !controller.switch_procedure(&procedure)? {
            return Err(ApiError::BadRequest(format!("Unknown procedure: {}", procedure)));
        }
        controller.validate_now()?;
        Ok(controller.get_state())
    })
    .await?;
    Ok(Json(snapshot))
}

async fn step(State(state): State<AppState>) -> ApiResult<CycleOutcome> {
    let outcome = with_session(&state, |controller| Ok(controller.run_cycle()?)).await?;
    Ok(Json(outcome))
}

async fn rollback(State(state): State<AppState>) -> ApiResult<RollbackResponse> {
    let response = with_session(&state, |controller| {
        let rolled_back = controller.rollback();
        Ok(RollbackResponse {
            rolled_back,
            state: controller.get_state(),
        })
    })
    .await?;
    Ok(Json(response))
}

async fn current_state(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    let snapshot = with_session(&state, |controller| Ok(controller.get_state())).await?;
    Ok(Json(snapshot))
}

async fn question(
    State(state): State<AppState>,
    body: Option<Json<QuestionRequest>>,
) -> ApiResult<QuestionResponse> {
    let text = body.map(|Json(req)| req.question).unwrap_or_default();
    let answer = with_session(&state, move |controller| Ok(controller.answer_question(&text))).await?;
    Ok(Json(QuestionResponse { answer }))
}
