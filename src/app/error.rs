use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::Error as SqlxError;

/// Application error type for unified error handling across the app.
#[derive(Debug)]
pub enum AppError {
    /// Project missing or not accessible (404 Not Found)
    NotFound,

    /// Structural bundle violations (400 Bad Request), reported all at once
    Validation(Vec<String>),

    /// Bundle version differs from the one supported (400 Bad Request)
    SchemaVersionMismatch { expected: String, found: String },

    /// Import transaction aborted (500 Internal Server Error)
    ImportFailed(String),

    /// Database errors (500 Internal Server Error)
    Database(SqlxError),

    /// Generic internal errors (500 Internal Server Error)
    Internal,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::SchemaVersionMismatch { .. } => "SCHEMA_VERSION_MISMATCH",
            AppError::ImportFailed(_) => "IMPORT_FAILED",
            AppError::Database(_) | AppError::Internal => "INTERNAL",
        }
    }
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message, details) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string(), None),
            AppError::Validation(violations) => (
                StatusCode::BAD_REQUEST,
                format!("Bundle failed validation ({} problems)", violations.len()),
                Some(violations),
            ),
            AppError::SchemaVersionMismatch { expected, found } => (
                StatusCode::BAD_REQUEST,
                format!("Unsupported bundle version {}; expected {}", found, expected),
                None,
            ),
            AppError::ImportFailed(cause) => {
                tracing::error!(%cause, "import failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Import failed: {}", cause),
                    None,
                )
            }
            AppError::Database(err) => {
                tracing::error!(%err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
            ),
        };

        let body = match details {
            Some(details) => json!({ "error": message, "code": code, "details": details }),
            None => json!({ "error": message, "code": code }),
        };

        (status, Json(body)).into_response()
    }
}
