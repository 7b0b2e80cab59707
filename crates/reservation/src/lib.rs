//! Per-event serialized ticket reservation.
//!
//! Every decrement of an event's available-ticket count goes through a
//! [`ReservationQueue`]. Requests for the same event run one at a time in
//! arrival order; requests for different events never wait on each other.
//! The [`EventStore`] behind the queue must also make its decrement
//! conditional, so a second process writing the same table cannot oversell.

mod error;
mod memory;
mod queue;
mod store;

pub use error::ReservationError;
pub use memory::MemoryEventStore;
pub use queue::ReservationQueue;
pub use store::{Decrement, EventStore};
