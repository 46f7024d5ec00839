//! Error responses for the management routes.
//!
//! Every failure is answered with a plain-text body and the status code
//! the device management tools expect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rlpa_gateway::{LockError, ManagementError, ShellError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown id or wrong `Password` header
    #[error("Unauthorized")]
    Unauthorized,

    #[error("bad request")]
    BadRequest { reason: String },

    #[error(transparent)]
    Management(#[from] ManagementError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Management(e) => match e {
                ManagementError::SessionNotFound => StatusCode::NOT_FOUND,
                ManagementError::Lock(LockError::NotShellMode) => StatusCode::BAD_GATEWAY,
                ManagementError::Lock(LockError::AlreadyLocked) => StatusCode::CONFLICT,
                ManagementError::Lock(LockError::NotLocked) => StatusCode::IM_A_TEAPOT,
                ManagementError::Shell(ShellError::NotShellMode) => StatusCode::BAD_GATEWAY,
                ManagementError::Shell(ShellError::Busy) => StatusCode::CONFLICT,
                ManagementError::Shell(ShellError::Open(_)) => StatusCode::BAD_GATEWAY,
                ManagementError::Shell(ShellError::Closed) => StatusCode::NOT_FOUND,
            },
        }
    }

    /// Response text. Spawn failures are reported without the OS detail.
    pub fn body(&self) -> String {
        match self {
            Self::Management(ManagementError::Shell(ShellError::Open(_))) => {
                "failed to open lpac".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::BadRequest { reason } => debug!(reason = %reason, "rejected request body"),
            other => debug!(error = %other, "management request failed"),
        }
        (self.status(), self.body()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlpa_gateway::GatewayError;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED, "Unauthorized"),
            (
                ManagementError::SessionNotFound.into(),
                StatusCode::NOT_FOUND,
                "rlpa client disconnected",
            ),
            (
                ManagementError::Lock(LockError::NotShellMode).into(),
                StatusCode::BAD_GATEWAY,
                "rlpa client not in shell mode",
            ),
            (
                ManagementError::Lock(LockError::NotLocked).into(),
                StatusCode::IM_A_TEAPOT,
                "API not locked",
            ),
            (
                ManagementError::Shell(ShellError::Busy).into(),
                StatusCode::CONFLICT,
                "already has one lpac shell running",
            ),
            (
                ManagementError::Shell(ShellError::Open(GatewayError::SessionClosed)).into(),
                StatusCode::BAD_GATEWAY,
                "failed to open lpac",
            ),
        ];

        for (error, status, body) in cases {
            assert_eq!(error.status(), status, "{error:?}");
            assert_eq!(error.body(), body);
        }
    }
}
