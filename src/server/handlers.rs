//! The HTTP endpoints for lobby lifecycle, readiness, and matchmaking.
//! No rate limiting or distributed-lock coordination; a single process
//! owns all lobby state.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::matchmaking::MatchOutcome;
use crate::protocol::{CoreError, ErrorKind, LobbyView};

use super::AppState;

/// Extracted from the `X-Device-ID` header present on every request.
fn device_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("X-Device-ID")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError(ErrorKind::Unauthenticated.into()))
}

/// Wraps `CoreError` so it can be returned directly from an axum handler.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl From<ErrorKind> for ApiError {
    fn from(kind: ErrorKind) -> Self {
        ApiError(kind.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
    status_code: u16,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: ErrorKind,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &self.0 {
            CoreError::Known(k) => k.description().to_string(),
            CoreError::Unexpected(err) => {
                tracing::error!(error = %err, "internal error");
                ErrorKind::Internal.description().to_string()
            }
        };
        let body = ErrorBody {
            success: false,
            error: ErrorDetail { kind, message },
            status_code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize, Default)]
pub struct JoinRequest {
    pub code: String,
}

#[derive(Deserialize, Default)]
pub struct ReadyRequest {
    pub is_ready: bool,
}

#[derive(Serialize)]
pub struct LobbyResponse {
    pub success: bool,
    pub lobby: LobbyView,
    pub message: String,
}

#[derive(Serialize)]
pub struct SimpleResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby: Option<LobbyView>,
}

#[derive(Serialize)]
pub struct FindMatchResponse {
    pub success: bool,
    pub in_queue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby: Option<LobbyView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<u64>,
    pub message: String,
}

#[derive(Serialize)]
pub struct QueueStatusResponse {
    pub success: bool,
    pub in_queue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_time: Option<u64>,
}

pub async fn create_lobby(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LobbyResponse>, ApiError> {
    let device = device_id(&headers)?;
    let lobby = state.registry.create(device).await?;
    Ok(Json(LobbyResponse {
        success: true,
        lobby: lobby.view(),
        message: "lobby created".to_string(),
    }))
}

pub async fn join_lobby(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<JoinRequest>,
) -> Result<Json<LobbyResponse>, ApiError> {
    let device = device_id(&headers)?;
    let lobby = state.registry.join(device, &req.code).await?;
    Ok(Json(LobbyResponse {
        success: true,
        lobby: lobby.view(),
        message: "joined lobby".to_string(),
    }))
}

pub async fn leave_lobby(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SimpleResponse>, ApiError> {
    let device = device_id(&headers)?;
    state.registry.leave(&device, false).await?;
    Ok(Json(SimpleResponse {
        success: true,
        message: "left lobby".to_string(),
    }))
}

pub async fn set_ready(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ReadyRequest>,
) -> Result<Json<LobbyResponse>, ApiError> {
    let device = device_id(&headers)?;
    let lobby = state.registry.set_ready(&device, req.is_ready).await?;
    Ok(Json(LobbyResponse {
        success: true,
        lobby: lobby.view(),
        message: "ready state updated".to_string(),
    }))
}

pub async fn lobby_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let device = device_id(&headers)?;
    let lobby = state.registry.status(&device).await;
    Ok(Json(StatusResponse {
        success: true,
        lobby: lobby.map(|l| l.view()),
    }))
}

pub async fn find_match(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FindMatchResponse>, ApiError> {
    let device = device_id(&headers)?;
    match state.queue.find_match(device).await? {
        MatchOutcome::Queued { position, eta_seconds } => Ok(Json(FindMatchResponse {
            success: true,
            in_queue: true,
            lobby: None,
            queue_position: Some(position),
            estimated_wait_time: Some(eta_seconds),
            message: "waiting for an opponent".to_string(),
        })),
        MatchOutcome::Paired(lobby) => Ok(Json(FindMatchResponse {
            success: true,
            in_queue: false,
            lobby: Some(lobby.view()),
            queue_position: None,
            estimated_wait_time: None,
            message: "match found".to_string(),
        })),
    }
}

pub async fn leave_queue(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SimpleResponse>, ApiError> {
    let device = device_id(&headers)?;
    state.queue.leave_queue(&device).await;
    Ok(Json(SimpleResponse {
        success: true,
        message: "left queue".to_string(),
    }))
}

pub async fn queue_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QueueStatusResponse>, ApiError> {
    let device = device_id(&headers)?;
    let status = state.queue.queue_status(&device).await;
    Ok(Json(QueueStatusResponse {
        success: true,
        in_queue: status.in_queue,
        queue_position: status.position,
        estimated_wait_time: status.eta_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_device_id_header_is_unauthenticated() {
        let headers = HeaderMap::new();
        let err = device_id(&headers).unwrap_err();
        assert_eq!(err.0.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn empty_device_id_header_is_unauthenticated() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Device-ID", HeaderValue::from_static(""));
        let err = device_id(&headers).unwrap_err();
        assert_eq!(err.0.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn present_device_id_header_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Device-ID", HeaderValue::from_static("device-1"));
        assert_eq!(device_id(&headers).unwrap(), "device-1");
    }
}
