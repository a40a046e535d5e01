//! HTTP API for hort-gate

pub mod device_auth;
pub mod handlers;

pub use device_auth::{device_auth_middleware, DeviceContext, DEVICE_TOKEN_HEADER};
