use std::num::NonZeroU32;

use anyhow::Result;
use async_trait::async_trait;
use boxoffice_models::Event;

/// Outcome of [`EventStore::conditional_decrement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    Applied,
    InsufficientStock { available: i64 },
    NotFound,
}

/// Durable home of the available-ticket counter.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>>;

    /// Subtracts `quantity` only if at least that many tickets remain, as one
    /// atomic step with respect to every other writer of the same event.
    async fn conditional_decrement(&self, event_id: &str, quantity: NonZeroU32) -> Result<Decrement>;
}

