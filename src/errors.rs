use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::admission::AdmissionError;
use crate::services::pricing::PricingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("{0}")]
    Guard(String),

    #[error("not allowed to act on this booking")]
    Forbidden,

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn guard(message: impl Into<String>) -> Self {
        AppError::Guard(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation",
            AppError::Admission(_) => "admission",
            AppError::Guard(_) => "guard",
            AppError::Forbidden => "authorization",
            AppError::Unauthorized => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                "collaborator"
            }
            AppError::Config(_) => "config",
        }
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::validation(err.field(), err.to_string())
    }
}

const JSON_DATA_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// Splits a serde error such as `check_in_date: input contains invalid
/// characters at line 1 column 40` into the offending field and the message.
fn field_of(detail: &str, fallback: &str) -> (String, String) {
    let detail = detail.strip_prefix(JSON_DATA_PREFIX).unwrap_or(detail);
    if let Some(rest) = detail.strip_prefix("missing field `") {
        if let Some((field, _)) = rest.split_once('`') {
            return (field.to_string(), detail.to_string());
        }
    }
    match detail.split_once(": ") {
        Some((path, message)) if !path.is_empty() && !path.contains(' ') => {
            (path.to_string(), message.to_string())
        }
        _ => (fallback.to_string(), detail.to_string()),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => {
                let (field, message) = field_of(&e.body_text(), "body");
                AppError::Validation { field, message }
            }
            JsonRejection::JsonSyntaxError(_) => {
                AppError::validation("body", "request body is not valid JSON")
            }
            JsonRejection::MissingJsonContentType(_) => {
                AppError::validation("body", "expected `Content-Type: application/json`")
            }
            other => AppError::validation("body", other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        let text = rejection.body_text();
        let detail = text
            .strip_prefix("Failed to deserialize query string: ")
            .unwrap_or(&text);
        let (field, message) = field_of(detail, "query");
        AppError::Validation { field, message }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Admission(_) => StatusCode::BAD_REQUEST,
            AppError::Guard(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({ "error": self.to_string(), "kind": self.kind() });
        match &self {
            AppError::Validation { field, .. } => {
                body["field"] = serde_json::Value::String(field.clone());
            }
            AppError::Admission(reason) => {
                body["reason"] = serde_json::Value::String(reason.code().to_string());
            }
            _ => {}
        }
        (status, axum::Json(body)).into_response()
    }
}
