use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ReservationError;
use crate::store::{Decrement, EventStore};

type Turns = DashMap<String, Turn>;

/// One event's mutex plus the number of slots that joined it and have not yet
/// dropped. The count only changes under the entry's shard lock.
#[derive(Default)]
struct Turn {
    lock: Arc<Mutex<()>>,
    holders: usize,
}

/// Serializes reservations per event id.
///
/// Each contended event id maps to a fair mutex; waiters are granted the turn
/// in the order they started waiting. An entry lives only while at least one
/// reservation for that id is queued or executing.
pub struct ReservationQueue<S> {
    store: S,
    turns: Turns,
}

impl<S: EventStore> ReservationQueue<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            turns: DashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Event ids with a reservation currently queued or executing.
    pub fn contended_events(&self) -> usize {
        self.turns.len()
    }

    /// Takes `quantity` tickets from the event, waiting behind any earlier
    /// reservation for the same event.
    pub async fn reserve(&self, event_id: &str, quantity: NonZeroU32) -> Result<(), ReservationError> {
        debug!(event_id, quantity = quantity.get(), "reservation queued");
        self.exclusive(event_id, self.execute(event_id, quantity)).await
    }

    /// Runs `work` holding the event's turn, so it neither interleaves with nor
    /// overtakes reservations for that event. Other writers of the event row
    /// (vendor edits, deletes) go through here.
    pub async fn exclusive<F: Future>(&self, event_id: &str, work: F) -> F::Output {
        let slot = self.join(event_id);
        let _turn = slot.turn.lock().await;
        work.await
    }

    /// Like [`reserve`](Self::reserve), but gives up with
    /// [`ReservationError::Cancelled`] if the turn has not come within `timeout`.
    /// The deadline covers only the wait; a reservation that started executing
    /// always reports its real outcome.
    pub async fn reserve_with_timeout(
        &self,
        event_id: &str,
        quantity: NonZeroU32,
        timeout: Duration,
    ) -> Result<(), ReservationError> {
        let slot = self.join(event_id);
        debug!(event_id, quantity = quantity.get(), "reservation queued");
        let Ok(_turn) = tokio::time::timeout(timeout, slot.turn.lock()).await else {
            debug!(event_id, ?timeout, "reservation abandoned while queued");
            return Err(ReservationError::Cancelled {
                event_id: event_id.to_owned(),
                waited: timeout,
            });
        };
        self.execute(event_id, quantity).await
    }

    fn join(&self, event_id: &str) -> Slot<'_> {
        let mut entry = self.turns.entry(event_id.to_owned()).or_default();
        entry.holders += 1;
        Slot {
            turns: &self.turns,
            event_id: event_id.to_owned(),
            turn: entry.lock.clone(),
        }
    }

    /// Read, check, decrement. Caller must hold the event's turn.
    async fn execute(&self, event_id: &str, quantity: NonZeroU32) -> Result<(), ReservationError> {
        debug!(event_id, quantity = quantity.get(), "reservation executing");
        let outcome = self.read_check_decrement(event_id, quantity).await;
        match &outcome {
            Ok(()) => debug!(event_id, quantity = quantity.get(), "reservation succeeded"),
            Err(ReservationError::Storage(e)) => warn!(event_id, "reservation storage failure: {e:#}"),
            Err(e) => debug!(event_id, quantity = quantity.get(), "reservation failed: {e}"),
        }
        outcome
    }

    async fn read_check_decrement(&self, event_id: &str, quantity: NonZeroU32) -> Result<(), ReservationError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| ReservationError::EventNotFound(event_id.to_owned()))?;

        if event.available_tickets < i64::from(quantity.get()) {
            return Err(ReservationError::InsufficientStock {
                event_id: event_id.to_owned(),
                requested: quantity.get(),
                available: event.available_tickets,
            });
        }

        // Another process may have written between the read and here.
        match self.store.conditional_decrement(event_id, quantity).await? {
            Decrement::Applied => Ok(()),
            Decrement::InsufficientStock { available } => Err(ReservationError::InsufficientStock {
                event_id: event_id.to_owned(),
                requested: quantity.get(),
                available,
            }),
            Decrement::NotFound => Err(ReservationError::EventNotFound(event_id.to_owned())),
        }
    }
}

/// A caller's place in an event's queue. Dropping it, on any exit path,
/// removes the map entry once the last holder has left.
struct Slot<'a> {
    turns: &'a Turns,
    event_id: String,
    turn: Arc<Mutex<()>>,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        // Joins and leaves both count under the shard lock, so the last one out
        // sees zero no matter when the Arc clones themselves are released.
        self.turns.remove_if_mut(&self.event_id, |_, turn| {
            turn.holders -= 1;
            turn.holders == 0
        });
    }
}
