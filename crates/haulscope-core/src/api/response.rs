//! Response envelopes and error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::error::Error;

/// Success envelope, `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct Data<T> {
    /// Payload
    pub data: T,
}

impl<T> Data<T> {
    /// Wrap `data` as a JSON response body
    pub fn json(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

impl Error {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::PermissionDenied | Error::ScopeUnsupported(_) => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Database(_) | Error::Config(_) | Error::Internal(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Error::PermissionDenied | Error::ScopeUnsupported(_) => "permission denied".to_string(),
            _ if status.is_server_error() => {
                error!(error = %self, "Request failed");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::auth("invalid token"), StatusCode::UNAUTHORIZED)]
    #[case(Error::validation("invalid trip id"), StatusCode::BAD_REQUEST)]
    #[case(Error::PermissionDenied, StatusCode::FORBIDDEN)]
    #[case(Error::ScopeUnsupported(crate::models::Role::Driver), StatusCode::FORBIDDEN)]
    #[case(Error::not_found("trip", "1"), StatusCode::NOT_FOUND)]
    #[case(Error::internal("pool closed"), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(Error::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_status_mapping(#[case] error: Error, #[case] status: StatusCode) {
        assert_eq!(error.into_response().status(), status);
    }

    #[tokio::test]
    async fn test_internal_error_body_is_opaque() {
        let response = Error::internal("relation \"secret_table\" does not exist").into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value, json!({ "error": "internal error" }));
    }
}
