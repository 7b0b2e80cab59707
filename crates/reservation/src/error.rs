use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReservationError {
    /// No event with this id existed when the reservation ran.
    #[error("Event {0} not found")]
    EventNotFound(String),

    /// The event exists but has fewer tickets left than requested. Nothing was written.
    #[error("Not enough tickets for event {event_id}: requested {requested}, available {available}")]
    InsufficientStock {
        event_id: String,
        requested: u32,
        available: i64,
    },

    /// The caller's deadline passed while still queued behind earlier reservations.
    #[error("Gave up waiting for event {event_id} after {waited:?}")]
    Cancelled { event_id: String, waited: Duration },

    /// The store failed. The count is unchanged.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ReservationError {
    /// Only storage failures are worth retrying; the rest are final for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReservationError::Storage(_))
    }
}
