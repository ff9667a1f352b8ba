// Admin API handlers
// Request/response types and handlers behind the /admin-api routes
//
// Numan Thabit 2025 Nov

use super::{AppState, DEFAULT_LOG_LIMIT, MAX_LOG_LIMIT};
use crate::metrics as prom;
use crate::registry::{
    failover_budget_for, ConfigUpdate, RegistryConfig, SessionRef, SessionView, TestOutcome,
};
use crate::telemetry::{RequestLog, Stats};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::warn;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(message: impl Display) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "rejected admin request body");
        bad_request("Invalid request body")
    })
}

fn parse_path<T>(path: Result<Path<T>, PathRejection>, message: &str) -> Result<T, ApiError> {
    path.map(|Path(v)| v).map_err(|e| {
        warn!(error = %e, "rejected admin path parameter");
        bad_request(message)
    })
}

fn parse_query<T>(query: Result<Query<T>, QueryRejection>, message: &str) -> Result<T, ApiError> {
    query.map(|Query(v)| v).map_err(|e| {
        warn!(error = %e, "rejected admin query string");
        bad_request(message)
    })
}

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus exposition
pub async fn metrics() -> Result<String, (StatusCode, String)> {
    prom::render().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[derive(Debug, Serialize)]
pub struct StatusConfig {
    pub address: String,
    pub proxy: Option<String>,
    #[serde(flatten)]
    pub tunables: RegistryConfig,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub session_count: usize,
    pub retry_count: usize,
    pub sessions: Vec<SessionView>,
    pub models: Vec<String>,
    pub config: StatusConfig,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let registry = &state.registry;
    let sessions = registry.list().await;
    Json(StatusResponse {
        status: "ok",
        session_count: sessions.len(),
        retry_count: failover_budget_for(sessions.len()),
        sessions,
        models: registry.models().to_vec(),
        config: StatusConfig {
            address: registry.address().to_string(),
            proxy: registry.proxy().map(str::to_string),
            tunables: registry.config().await,
        },
    })
}

#[derive(Debug, Deserialize)]
pub struct AddSessionRequest {
    pub session_key: String,
    pub org_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub status: &'static str,
    pub session_count: usize,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub async fn add_session(
    State(state): State<AppState>,
    body: Result<Json<AddSessionRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let req = parse_body(body)?;
    let added = state
        .registry
        .add(req.session_key, req.org_id)
        .await
        .map_err(bad_request)?;
    Ok(Json(MutationResponse {
        status: "added",
        session_count: added.value,
        persisted: added.is_saved(),
        warning: added.warning(),
    }))
}

pub async fn remove_session(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> Result<Json<MutationResponse>, ApiError> {
    let index: i64 = index.parse().map_err(|_| bad_request("Invalid index"))?;
    if index < 0 {
        return Err(bad_request("Index out of range"));
    }
    let removed = state
        .registry
        .remove(index as usize)
        .await
        .map_err(bad_request)?;
    Ok(Json(MutationResponse {
        status: "removed",
        session_count: removed.value,
        persisted: removed.is_saved(),
        warning: removed.warning(),
    }))
}

pub async fn remove_session_by_id(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let id = parse_path(id, "Invalid session id")?;
    let removed = state
        .registry
        .remove_by_id(id)
        .await
        .map_err(bad_request)?;
    Ok(Json(MutationResponse {
        status: "removed",
        session_count: removed.value,
        persisted: removed.is_saved(),
        warning: removed.warning(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TestSessionRequest {
    pub session_key: Option<String>,
    pub index: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TestSessionResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

pub async fn test_session(
    State(state): State<AppState>,
    body: Result<Json<TestSessionRequest>, JsonRejection>,
) -> Result<Json<TestSessionResponse>, ApiError> {
    let req = parse_body(body)?;
    let reference = SessionRef::from_parts(req.session_key, req.index)
        .ok_or_else(|| bad_request("Invalid session key or index"))?;
    let outcome = state.registry.test(reference).await.map_err(bad_request)?;
    Ok(Json(match outcome {
        TestOutcome::Valid { org_id } => TestSessionResponse {
            status: "ok",
            message: "Session is valid".to_string(),
            org_id: Some(org_id),
        },
        TestOutcome::Unreachable { message } => TestSessionResponse {
            status: "error",
            message,
            org_id: None,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct UpdateConfigResponse {
    pub status: &'static str,
    pub message: String,
    pub persisted: bool,
    pub config: RegistryConfig,
}

pub async fn update_config(
    State(state): State<AppState>,
    body: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<Json<UpdateConfigResponse>, ApiError> {
    let update = parse_body(body)?;
    let updated = state
        .registry
        .update_config(update)
        .await
        .map_err(bad_request)?;
    let message = match updated.warning() {
        None => "Config saved successfully".to_string(),
        Some(err) => format!("Config updated in memory (could not save to file: {err})"),
    };
    Ok(Json(UpdateConfigResponse {
        status: "updated",
        message,
        persisted: updated.is_saved(),
        config: updated.value,
    }))
}

pub async fn stats(State(state): State<AppState>) -> Json<Stats> {
    Json(state.telemetry.stats().await)
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<String>,
}

/// Clamp `?limit=` to `1..=MAX_LOG_LIMIT`; unparsable values use the default.
fn log_limit(raw: Option<&str>) -> usize {
    match raw.map(|s| s.trim().parse::<i64>()) {
        None | Some(Err(_)) => DEFAULT_LOG_LIMIT,
        Some(Ok(n)) if n <= 0 => MAX_LOG_LIMIT,
        Some(Ok(n)) => (n as usize).min(MAX_LOG_LIMIT),
    }
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<RequestLog>,
    pub count: usize,
}

pub async fn logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let query = parse_query(query, "Invalid query")?;
    let logs = state
        .telemetry
        .recent(log_limit(query.limit.as_deref()))
        .await;
    Ok(Json(LogsResponse {
        count: logs.len(),
        logs,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn logs_in_range(
    State(state): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let query = parse_query(query, "Invalid time range")?;
    let logs = state.telemetry.range(query.start, query.end).await;
    Ok(Json(LogsResponse {
        count: logs.len(),
        logs,
    }))
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn clear_logs(State(state): State<AppState>) -> Json<ClearResponse> {
    state.telemetry.clear().await;
    Json(ClearResponse {
        status: "cleared",
        message: "All logs have been cleared",
    })
}
