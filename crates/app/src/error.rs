use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use boxoffice_models::ValidationError;
use boxoffice_reservation::ReservationError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No credentials, or credentials that have expired
    #[error("{0}")]
    Unauthorized(String),

    /// Credentials are valid but do not allow this
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The caller gave up waiting for a contended event; safe to retry
    #[error("{0}")]
    Busy(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.0)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ReservationError> for ApiError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::EventNotFound(_) => ApiError::not_found("Event"),
            ReservationError::InsufficientStock { .. } => ApiError::BadRequest("No tickets available".to_string()),
            ReservationError::Cancelled { .. } => {
                ApiError::Busy("Ticket sales for this event are busy, please try again".to_string())
            }
            ReservationError::Storage(e) => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                "Internal server error".to_string()
            }
            ApiError::Busy(m) => {
                tracing::warn!("Busy: {m}");
                m.clone()
            }
            ApiError::Unauthorized(m) | ApiError::Forbidden(m) => {
                tracing::info!("Auth error: {m}");
                m.clone()
            }
            ApiError::BadRequest(m) | ApiError::NotFound(m) => {
                tracing::debug!("Client error: {m}");
                m.clone()
            }
        };

        (self.status_code(), Json(json!({ "message": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
