// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use std::fmt;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request with a single message
    BadRequest(String),

    // 400 Bad Request with per-field messages
    Validation(Map<String, Value>),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
}

impl AppError {
    /// Single field validation failure.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(field.to_string(), json!([message.into()]));
        AppError::Validation(map)
    }

    pub fn unauthenticated() -> Self {
        AppError::AuthError("Authentication credentials were not provided.".to_string())
    }

    pub fn invalid_token() -> Self {
        AppError::AuthError("Invalid token.".to_string())
    }

    /// Maps unique-constraint violations to field errors; anything else is a 500.
    pub fn from_db(err: sqlx::Error, constraints: &[(&str, &str, &str)]) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                if let Some(name) = db_err.constraint() {
                    for (constraint, field, message) in constraints {
                        if *constraint == name {
                            return AppError::field(field, *message);
                        }
                    }
                }
            }
        }
        AppError::from(err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Internal Server Error" }),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "errors": msg })),
            AppError::Validation(map) => (StatusCode::BAD_REQUEST, Value::Object(map)),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, json!({ "detail": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "detail": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "detail": msg })),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(flatten_validation(&errors))
    }
}

/// Turns validator output into `{"field": ["message", ...]}`.
/// Nested structs become objects, list items become `{"<index>": {...}}`.
fn flatten_validation(errors: &ValidationErrors) -> Map<String, Value> {
    let mut map = Map::new();
    for (field, kind) in errors.errors() {
        let value = match kind {
            ValidationErrorsKind::Field(list) => Value::Array(
                list.iter()
                    .map(|e| {
                        let message = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value ({}).", e.code));
                        Value::String(message)
                    })
                    .collect(),
            ),
            ValidationErrorsKind::Struct(inner) => Value::Object(flatten_validation(inner)),
            ValidationErrorsKind::List(items) => Value::Object(
                items
                    .iter()
                    .map(|(index, inner)| (index.to_string(), Value::Object(flatten_validation(inner))))
                    .collect(),
            ),
        };
        map.insert(field.to_string(), value);
    }
    map
}
