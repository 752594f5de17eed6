use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Failure of a batch reservation. No variant implies a partial write.
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error("no spots requested")]
    EmptyBatch,

    #[error("event {0} does not exist")]
    EventNotFound(Uuid),

    #[error("spot '{0}' does not exist in this event")]
    SpotNotFound(String),

    #[error("spot '{0}' is already reserved")]
    SpotUnavailable(String),

    #[error("timed out waiting for spot locks")]
    LockTimeout,

    #[error(transparent)]
    Store(StoreError),
}

impl ReservationError {
    /// Conflicts may clear up with a different spot set or a later attempt;
    /// everything else is bad input or an infrastructure fault.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReservationError::SpotUnavailable(_) | ReservationError::LockTimeout
        )
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EventNotFound(id) => ReservationError::EventNotFound(id),
            StoreError::SpotNotFound(name) => ReservationError::SpotNotFound(name),
            StoreError::SpotUnavailable(name) => ReservationError::SpotUnavailable(name),
            StoreError::LockTimeout => ReservationError::LockTimeout,
            other => ReservationError::Store(other),
        }
    }
}
