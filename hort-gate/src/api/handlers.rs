//! HTTP request handlers
//!
//! Implements the scan endpoints for RFID terminals. Handlers stay
//! thin: parse, call the engine, serialize. The taxonomy-to-status
//! mapping happens once, in `ApiError`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use hort_common::Error;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::api::device_auth::DeviceContext;
use crate::engine::{OutcomeAction, ScanOutcome, ScanRequest};
use crate::store::{DeviceStore, SessionStore};
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckinRequest {
    #[serde(default)]
    student_rfid: String,
    action: Option<String>,
    room_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CheckinResponse {
    student_id: i64,
    student_name: String,
    action: String,
    visit_id: Option<i64>,
    room_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_room: Option<String>,
    processed_at: DateTime<Utc>,
    message: String,
    status: String,
    daily_checkout_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_students: Option<i64>,
}

impl CheckinResponse {
    fn from_outcome(outcome: ScanOutcome, processed_at: DateTime<Utc>) -> Self {
        Self {
            student_id: outcome.subject_id,
            student_name: outcome.subject_name,
            action: outcome.action.as_str().to_string(),
            visit_id: outcome.visit_id,
            room_name: outcome.room_name,
            previous_room: if outcome.action == OutcomeAction::Transferred {
                outcome.previous_room
            } else {
                None
            },
            processed_at,
            message: outcome.message,
            status: "success".to_string(),
            daily_checkout_available: outcome.daily_checkout_available,
            active_students: outcome.active_students,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    device_id: i64,
    device_name: String,
    status: String,
    last_seen: DateTime<Utc>,
    is_online: bool,
    ping_time: DateTime<Utc>,
    session_active: bool,
}

#[derive(Debug, Serialize)]
pub struct DeviceStatusResponse {
    device_id: i64,
    device_name: String,
    status: String,
    last_seen: Option<DateTime<Utc>>,
    is_online: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    status: String,
    message: String,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Wraps the shared error taxonomy for the HTTP boundary. User-visible
/// kinds keep their message; internal kinds are logged and reported
/// generically.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::InvalidRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Error::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            Error::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            Error::CapacityExceeded { .. } => (StatusCode::CONFLICT, self.0.to_string()),
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                error!("Request failed: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                status: "error".to_string(),
                message,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Scan Endpoints
// ============================================================================

/// POST /checkin - Process one RFID scan event
pub async fn checkin(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
    Json(req): Json<CheckinRequest>,
) -> Result<Json<CheckinResponse>, ApiError> {
    let scan = ScanRequest {
        tag: req.student_rfid,
        action: req.action,
        room_id: req.room_id,
    };

    let outcome = state.engine.handle_scan(&device.0, &scan).await?;
    Ok(Json(CheckinResponse::from_outcome(outcome, Utc::now())))
}

/// POST /ping - Device liveness heartbeat
///
/// Refreshes the device's last-seen timestamp and, when a session is
/// bound to the device, that session's activity timestamp.
pub async fn ping(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
) -> Result<Json<PingResponse>, ApiError> {
    let now = Utc::now();
    let store = state.engine.store();

    store.touch_device(device.0.id, now).await?;

    let session = store.session_for_device(device.0.id).await?;
    let session_active = session.is_some();
    if let Some(session) = &session {
        if let Err(e) = store.touch_session(session.id, now).await {
            warn!(
                session_id = session.id,
                "Session liveness refresh on ping failed: {}", e
            );
        }
    }

    Ok(Json(PingResponse {
        device_id: device.0.id,
        device_name: device.0.name.clone(),
        status: "ok".to_string(),
        last_seen: now,
        is_online: true,
        ping_time: now,
        session_active,
    }))
}

/// GET /status - Device identity and state
pub async fn device_status(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
) -> Json<DeviceStatusResponse> {
    let window = state.config.device_online_window_secs as i64;
    let is_online = device
        .0
        .last_seen
        .map(|seen| (Utc::now() - seen).num_seconds() <= window)
        .unwrap_or(false);

    Json(DeviceStatusResponse {
        device_id: device.0.id,
        device_name: device.0.name.clone(),
        status: "ok".to_string(),
        last_seen: device.0.last_seen,
        is_online,
    })
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "hort-gate".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
