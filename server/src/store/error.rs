//! Errors raised by Catalog Store backends.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event {0} does not exist")]
    EventNotFound(Uuid),

    /// A spot addressed by id or by name is missing from its event.
    #[error("spot '{0}' does not exist")]
    SpotNotFound(String),

    /// The spot is already reserved.
    #[error("spot '{0}' is already reserved")]
    SpotUnavailable(String),

    #[error("a spot named '{0}' already exists in this event")]
    DuplicateSpotName(String),

    #[error("event {0} has reserved spots")]
    EventHasReservations(Uuid),

    /// Exclusive access to the targeted spots was not obtained in time.
    #[error("timed out waiting for spot locks")]
    LockTimeout,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
