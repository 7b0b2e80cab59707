use std::num::NonZeroU32;

use anyhow::Result;
use async_trait::async_trait;
use boxoffice_models::Event;
use dashmap::DashMap;

use crate::store::{Decrement, EventStore};

/// In-process [`EventStore`]. Each decrement runs under the map's shard lock,
/// which gives it the same all-or-nothing behaviour as the SQL conditional update.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: DashMap<String, Event>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: Event) {
        self.events.insert(event.id.clone(), event);
    }

    pub fn remove(&self, event_id: &str) -> Option<Event> {
        self.events.remove(event_id).map(|(_, event)| event)
    }

    pub fn available(&self, event_id: &str) -> Option<i64> {
        self.events.get(event_id).map(|e| e.available_tickets)
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        Ok(self.events.get(event_id).map(|e| e.value().clone()))
    }

    async fn conditional_decrement(&self, event_id: &str, quantity: NonZeroU32) -> Result<Decrement> {
        let Some(mut event) = self.events.get_mut(event_id) else {
            return Ok(Decrement::NotFound);
        };
        let quantity = i64::from(quantity.get());
        if event.available_tickets < quantity {
            return Ok(Decrement::InsufficientStock {
                available: event.available_tickets,
            });
        }
        event.available_tickets -= quantity;
        Ok(Decrement::Applied)
    }
}
