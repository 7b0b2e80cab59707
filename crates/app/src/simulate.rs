//! `boxoffice simulate`: a burst of buyers against one event held in memory.

use std::num::NonZeroU32;
use std::sync::Arc;

use boxoffice_models::Event;
use boxoffice_reservation::{MemoryEventStore, ReservationError, ReservationQueue};
use tokio::task::JoinSet;
use tracing::info;

const EVENT_ID: &str = "simulated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SaleReport {
    pub accepted: usize,
    pub refused: usize,
    pub sold: i64,
    pub remaining: i64,
}

/// Seeds an event with `tickets`, starts `buyers` reservations of `quantity`
/// at once and tallies what the queue let through.
pub(crate) async fn run(tickets: u32, buyers: usize, quantity: NonZeroU32) -> anyhow::Result<SaleReport> {
    let store = MemoryEventStore::new();
    store.insert(Event {
        id: EVENT_ID.to_string(),
        name: "Simulated sale".to_string(),
        date: "2099-01-01".to_string(),
        time: "20:00".to_string(),
        price: 0.0,
        available_tickets: i64::from(tickets),
        location: "nowhere".to_string(),
        category: "simulation".to_string(),
        vendor_id: "simulator".to_string(),
    });
    let queue = Arc::new(ReservationQueue::new(store));
    info!(tickets, buyers, quantity = quantity.get(), "simulating sale");

    let mut tasks = JoinSet::new();
    for _ in 0..buyers {
        let queue = queue.clone();
        tasks.spawn(async move { queue.reserve(EVENT_ID, quantity).await });
    }

    let (mut accepted, mut refused) = (0, 0);
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(()) => accepted += 1,
            Err(ReservationError::InsufficientStock { .. }) => refused += 1,
            Err(e) => return Err(e.into()),
        }
    }

    let remaining = queue.store().available(EVENT_ID).unwrap_or_default();
    Ok(SaleReport {
        accepted,
        refused,
        sold: i64::from(tickets) - remaining,
        remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(q: u32) -> NonZeroU32 {
        NonZeroU32::new(q).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn three_buyers_two_tickets() {
        let report = run(2, 3, n(1)).await.unwrap();
        assert_eq!(
            report,
            SaleReport { accepted: 2, refused: 1, sold: 2, remaining: 0 }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn oversubscribed_sale_stops_at_the_stock() {
        let report = run(10, 50, n(3)).await.unwrap();
        assert_eq!(report.accepted, 3);
        assert_eq!(report.refused, 47);
        assert_eq!(report.sold, 9);
        assert_eq!(report.remaining, 1);
    }
}
