use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::ai::AiError;
use crate::bids::BidError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            _ => AppError::internal(value),
        }
    }
}

impl From<BidError> for AppError {
    fn from(value: BidError) -> Self {
        match value {
            BidError::InvalidTransition { .. } => AppError::conflict(value.to_string()),
            _ => AppError::bad_request(value.to_string()),
        }
    }
}

impl From<AiError> for AppError {
    fn from(value: AiError) -> Self {
        match value {
            AiError::MissingApiKey | AiError::InvalidRequest(_) => {
                AppError::bad_request(value.to_string())
            }
            _ => AppError::bad_gateway(value.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bids::BidStatus;

    #[test]
    fn maps_domain_errors_to_statuses() {
        let transition: AppError = BidError::InvalidTransition {
            from: BidStatus::Paid,
            to: BidStatus::Won,
        }
        .into();
        assert_eq!(transition.status(), StatusCode::CONFLICT);
        assert_eq!(transition.message(), "cannot move bid from paid to won");

        let missing: AppError = BidError::MissingField("city").into();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let not_found: AppError = diesel::result::Error::NotFound.into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upstream_ai_failures_keep_their_message() {
        let upstream: AppError = AiError::Upstream {
            status: Some(503),
            message: "The model is overloaded. Please try again later.".into(),
        }
        .into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            upstream.message(),
            "The model is overloaded. Please try again later."
        );

        let missing_key: AppError = AiError::MissingApiKey.into();
        assert_eq!(missing_key.status(), StatusCode::BAD_REQUEST);
    }
}
