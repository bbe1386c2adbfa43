use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use webhook_core::error::{DeliveryError, DeliveryErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Delivery(#[from] DeliveryError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Missing Bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Delivery(e) => (status_for_kind(e.kind), e.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing Bearer token".to_string()),
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired token".to_string())
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

fn status_for_kind(kind: DeliveryErrorKind) -> StatusCode {
    match kind {
        DeliveryErrorKind::ResourceNotFound => StatusCode::NOT_FOUND,
        DeliveryErrorKind::ResourceAlreadyExists => StatusCode::CONFLICT,
        DeliveryErrorKind::InvalidSignature
        | DeliveryErrorKind::MissingSignature
        | DeliveryErrorKind::InvalidSignatureFormat => StatusCode::UNAUTHORIZED,
        DeliveryErrorKind::Configuration => StatusCode::BAD_REQUEST,
        DeliveryErrorKind::StorageConflict => StatusCode::CONFLICT,
        DeliveryErrorKind::TransportUnavailable | DeliveryErrorKind::PublishTimeout => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DeliveryErrorKind::WebhookProcessing
        | DeliveryErrorKind::PermanentDeliveryFailure
        | DeliveryErrorKind::RetriableDeliveryFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
