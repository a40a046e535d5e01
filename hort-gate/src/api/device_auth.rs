//! Device authentication middleware
//!
//! Every scan endpoint is called by a registered terminal. The token
//! from the `X-Device-Token` header is resolved against the devices
//! table and the matching row is attached to the request; requests
//! without a resolvable token never reach a handler.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hort_common::db::models::Device;
use hort_common::Error;
use tracing::error;

use crate::api::handlers::ApiError;
use crate::store::DeviceStore;
use crate::AppState;

/// Header carrying the device token
pub const DEVICE_TOKEN_HEADER: &str = "x-device-token";

/// The authenticated scanning terminal, attached as a request extension
#[derive(Debug, Clone)]
pub struct DeviceContext(pub Device);

pub async fn device_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(DEVICE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(token) = token else {
        return ApiError::from(Error::Unauthorized("missing device token".to_string()))
            .into_response();
    };

    match state.engine.store().device_by_token(&token).await {
        Ok(Some(device)) => {
            request.extensions_mut().insert(DeviceContext(device));
            next.run(request).await
        }
        Ok(None) => ApiError::from(Error::Unauthorized("unknown device token".to_string()))
            .into_response(),
        Err(e) => {
            error!("Device lookup failed: {}", e);
            ApiError::from(e).into_response()
        }
    }
}
