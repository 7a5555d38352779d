//! HTTP surface — REST API for the habit engine
//!
//! JSON over HTTP. The fronting application authenticates the user and
//! forwards the identity in the `x-user-id` header; session handling lives
//! outside this service.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::generator::RitualGateway;
use crate::recorder::{self, RecordOutcome};
use crate::stats;
use crate::store::{ActionVersion, Store};
use crate::streak;

/// Shared state for all handlers
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Store>,
    pub gateway: Arc<RitualGateway>,
    pub free_goal_limit: u32,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub async fn serve(bind_addr: &str, state: ApiState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Habit engine listening on http://{bind_addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/rituals/generate", post(generate_ritual))
        .route("/api/rituals/complete", post(complete_action))
        .route("/api/rituals/systems", get(list_systems))
        .route("/api/rituals/stats", get(weekly_stats))
        .route("/api/rituals/insight", post(weekly_insight))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// --- API Types ---

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Deserialize)]
struct GenerateRequest {
    goal: String,
    #[serde(default = "default_pillar")]
    pillar: String,
    #[serde(default = "default_language")]
    language: String,
}

#[derive(Serialize)]
struct GenerateResponse {
    status: &'static str,
    goal_id: String,
    system_id: String,
}

#[derive(Deserialize)]
struct CompleteRequest {
    action_id: String,
    #[serde(default = "default_mood")]
    mood: String,
}

#[derive(Serialize)]
struct CompleteResponse {
    status: &'static str,
    version: ActionVersion,
}

#[derive(Serialize)]
struct SystemEntry {
    /// Micro-action id — what `complete` takes
    id: String,
    goal_title: String,
    system_title: String,
    action_ideal: String,
    action_bad_day: String,
    duration_minutes: i64,
    completed: bool,
    due_today: bool,
    streak: u32,
}

#[derive(Deserialize)]
struct InsightRequest {
    #[serde(default = "default_language")]
    language: String,
}

#[derive(Serialize)]
struct InsightResponse {
    insight: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

fn default_pillar() -> String {
    "general".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_mood() -> String {
    "normal".to_string()
}

// --- Handlers ---

/// Generate a ritual for a goal and persist it atomically.
async fn generate_ritual(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    let user_id = require_user(&headers)?;
    let goal = req.goal.trim().to_string();
    if goal.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "invalid_request",
                message: "goal must not be empty".into(),
            }),
        ));
    }

    let plan = state
        .gateway
        .generate_ritual(&goal, &req.pillar, &req.language)
        .await;
    let created = state
        .store
        .create_ritual(&user_id, &goal, &req.pillar, &plan, state.free_goal_limit)
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            status: "success",
            goal_id: created.goal_id,
            system_id: created.system_id,
        }),
    ))
}

/// Record a completion for today. Replays resolve to `already_recorded`.
async fn complete_action(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let today = chrono::Utc::now().date_naive();

    let outcome = recorder::record_completion(&state.store, &user_id, &req.action_id, &req.mood, today)
        .map_err(error_response)?;

    let response = match outcome {
        RecordOutcome::Recorded { version } => CompleteResponse {
            status: "success",
            version,
        },
        RecordOutcome::AlreadyRecorded { version } => CompleteResponse {
            status: "already_recorded",
            version,
        },
    };
    Ok(Json(response))
}

/// Active goals flattened to one entry per micro-action, with today's
/// completion flag and the owning system's streak.
async fn list_systems(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SystemEntry>>, ApiError> {
    let user_id = require_user(&headers)?;
    let today = chrono::Utc::now().date_naive();

    let bundles = state.store.active_goals(&user_id).map_err(error_response)?;
    let completed_today = state
        .store
        .completed_action_ids_on(&user_id, today)
        .map_err(error_response)?;

    let mut entries = Vec::new();
    for bundle in bundles {
        for system_bundle in bundle.systems {
            let system = &system_bundle.system;
            let streak = streak::current_streak(&state.store, &user_id, &system.id, today)
                .map_err(error_response)?;
            let due_today = system.is_due_on(today);
            for action in system_bundle.actions {
                entries.push(SystemEntry {
                    completed: completed_today.contains(&action.id),
                    id: action.id,
                    goal_title: bundle.goal.title.clone(),
                    system_title: system.title.clone(),
                    action_ideal: action.action_ideal,
                    action_bad_day: action.action_bad_day,
                    duration_minutes: action.duration_minutes,
                    due_today,
                    streak,
                });
            }
        }
    }
    Ok(Json(entries))
}

/// Last 7 ISO dates mapped to completion counts, zero-filled.
async fn weekly_stats(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<BTreeMap<String, i64>>, ApiError> {
    let user_id = require_user(&headers)?;
    let today = chrono::Utc::now().date_naive();

    let series = stats::weekly_stats(&state.store, &user_id, today).map_err(error_response)?;
    let heatmap: BTreeMap<String, i64> = series
        .into_iter()
        .map(|d| (d.date.format("%Y-%m-%d").to_string(), d.count))
        .collect();
    Ok(Json(heatmap))
}

/// Best-effort coaching summary of the last 7 days.
async fn weekly_insight(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<InsightRequest>,
) -> Result<Json<InsightResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let today = chrono::Utc::now().date_naive();

    let series = stats::weekly_stats(&state.store, &user_id, today).map_err(error_response)?;
    let insight = state.gateway.weekly_insight(&series, &req.language).await;
    Ok(Json(InsightResponse { insight }))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// --- Helpers ---

fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "missing_user",
                message: "x-user-id header is required".into(),
            }),
        ))
}

fn error_response(err: EngineError) -> ApiError {
    match err {
        EngineError::NotFound(what) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "not_found",
                message: format!("{what} not found"),
            }),
        ),
        EngineError::PlanLimitExceeded => (
            StatusCode::FORBIDDEN,
            Json(ErrorBody {
                error: "plan_limit",
                message: "Active goal limit reached for your plan. Upgrade to add more goals."
                    .into(),
            }),
        ),
        // The recorder resolves Conflict to already_recorded before it gets
        // here; kept for completeness.
        EngineError::Conflict => (
            StatusCode::CONFLICT,
            Json(ErrorBody {
                error: "conflict",
                message: "already recorded".into(),
            }),
        ),
        EngineError::CollaboratorUnavailable(e) => {
            warn!("collaborator error reached the API layer: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: "unavailable",
                    message: "generation backend unavailable".into(),
                }),
            )
        }
        EngineError::Storage(e) => {
            warn!("storage error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "internal",
                    message: "internal storage error".into(),
                }),
            )
        }
    }
}
