//! Application-wide error types.
//!
//! Errors are recovered at the narrowest scope that can still produce a
//! meaningful response; anything that reaches the handler boundary is
//! converted into a plain response here and never propagates to the
//! transport layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::upstream::UpstreamError;

/// Errors surfaced by the request pipeline.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("request blocked: {message}")]
    Blocked { status: u16, message: String },

    #[error("invalid fragment target: {0}")]
    BadFragment(String),

    #[error("request body too large")]
    BodyTooLarge,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(e) => e.status_code(),
            ProxyError::Blocked { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS)
            }
            ProxyError::BadFragment(_) => StatusCode::BAD_REQUEST,
            ProxyError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Never leak internal detail to the client.
            ProxyError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}
