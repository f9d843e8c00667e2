//! HTTP response mapping for [`BimcostError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::BimcostError;

impl BimcostError {
    /// HTTP status used when this error crosses the API boundary.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::UploadRejected {
                too_large: true, ..
            } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UploadRejected { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Submission { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotReady { .. } => StatusCode::CONFLICT,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Credential(_) | Self::NoProviderAvailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::ProviderTimeout { .. } | Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upload { .. }
            | Self::ForgeApi { .. }
            | Self::ProviderApi { .. }
            | Self::Network(_)
            | Self::ParseResponse(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_)
            | Self::ConfigInvalid { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BimcostError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.error_code(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}
