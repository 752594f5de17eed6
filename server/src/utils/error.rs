use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::reservation::ReservationError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The target is not in a state that allows the operation.
    /// `spot` names the contended spot when there is one.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        spot: Option<String>,
    },

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

impl AppError {
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
            spot: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } | AppError::LockTimeout(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::LockTimeout(_) => "LOCK_TIMEOUT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Whether repeating the same request may succeed later. Only contention
    /// on a spot qualifies; duplicate names or refused deletes never clear up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Conflict { spot: Some(_), .. } | AppError::LockTimeout(_)
        )
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            _ => {
                warn!(code = self.code(), message = %self, "Request rejected");
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EventNotFound(id) => {
                AppError::NotFound(format!("Event with id '{}' was not found", id))
            }
            StoreError::SpotNotFound(spot) => {
                AppError::NotFound(format!("Spot '{}' was not found", spot))
            }
            StoreError::SpotUnavailable(spot) => AppError::Conflict {
                message: format!("Spot '{}' is already reserved", spot),
                spot: Some(spot),
            },
            StoreError::DuplicateSpotName(name) => AppError::conflict(format!(
                "A spot named '{}' already exists for this event",
                name
            )),
            StoreError::EventHasReservations(id) => AppError::conflict(format!(
                "Event '{}' has reserved spots and cannot be deleted",
                id
            )),
            StoreError::LockTimeout => {
                AppError::LockTimeout("Timed out waiting for the requested spots".to_string())
            }
            StoreError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::EmptyBatch => {
                AppError::ValidationError("At least one spot must be requested".to_string())
            }
            ReservationError::EventNotFound(id) => {
                AppError::NotFound(format!("Event with id '{}' was not found", id))
            }
            ReservationError::SpotNotFound(spot) => {
                AppError::NotFound(format!("Spot '{}' was not found in this event", spot))
            }
            ReservationError::SpotUnavailable(spot) => AppError::Conflict {
                message: format!("Spot '{}' is already reserved", spot),
                spot: Some(spot),
            },
            ReservationError::LockTimeout => AppError::LockTimeout(
                "Timed out waiting for the requested spots, try again".to_string(),
            ),
            ReservationError::Store(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let details = match &self {
            AppError::Conflict {
                spot: Some(spot), ..
            } => Some(json!({ "spot": spot, "retryable": self.is_retryable() })),
            _ if self.is_retryable() => Some(json!({ "retryable": true })),
            _ => None,
        };

        // Driver details stay in the logs.
        let public_message = match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::LockTimeout(msg)
            | AppError::Conflict { message: msg, .. } => msg,
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        error_response(code, public_message, details, status)
    }
}
