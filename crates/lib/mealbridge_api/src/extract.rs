//! Request extractors.

use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;
use tracing::debug;

use crate::error::AppError;

/// `axum::Json` whose rejections answer 400 with the standard error body
/// instead of axum's plain-text 415/422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("request body rejected: {rejection}");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Expected a request body with Content-Type: application/json"
            }
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::JsonDataError(_) => {
                "Request body is missing required fields or has invalid values"
            }
            _ => "Request body could not be read",
        };
        AppError::Validation(message.into())
    }
}
