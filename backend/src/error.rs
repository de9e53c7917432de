use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::models::material::ConstraintError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Constraint violation: {0}")]
    Constraint(#[from] ConstraintError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn material_not_found() -> Self {
        AppError::NotFound("Material not found".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation(e) => {
                let mut messages: Vec<String> = e
                    .field_errors()
                    .into_iter()
                    .map(|(field, errors)| {
                        let msgs: Vec<&str> = errors
                            .iter()
                            .filter_map(|err| err.message.as_ref().map(|m| m.as_ref()))
                            .collect();
                        if msgs.is_empty() {
                            let codes: Vec<&str> =
                                errors.iter().map(|err| err.code.as_ref()).collect();
                            format!("{}: {}", field, codes.join(", "))
                        } else {
                            format!("{}: {}", field, msgs.join(", "))
                        }
                    })
                    .collect();
                // field_errors() is a HashMap; keep the message stable.
                messages.sort();
                (StatusCode::BAD_REQUEST, messages.join("; "))
            }
            AppError::Constraint(e) => {
                tracing::warn!("Constraint violation: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::Database(e) => {
                // The database constraints back up the model layer; surface them as 400.
                if let sqlx::Error::Database(ref db_err) = e {
                    if let Some(code) = db_err.code() {
                        let message = match code.as_ref() {
                            "23505" => Some("Material code must be unique."),
                            "23503" => Some("Referenced supplier does not exist"),
                            "23514" => Some("Material violates a record constraint"),
                            "23502" => Some("A required field is missing"),
                            _ => None,
                        };
                        if let Some(message) = message {
                            tracing::warn!("Database constraint violation: {}", db_err.message());
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(json!({ "error": message })),
                            )
                                .into_response();
                        }
                    }
                }
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".into())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
