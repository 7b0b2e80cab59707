use std::num::NonZeroU32;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use boxoffice_models::{Event, EventFilter, EventStats, Ticket, TicketStatus};
use boxoffice_reservation::{Decrement, EventStore};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    info!("Connected to database: {database_url}");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Migrations applied");
    Ok(())
}

const EVENT_COLUMNS: &str =
    "id, name, date, time, price, available_tickets, location, category, vendor_id";

const TICKET_COLUMNS: &str =
    "id, event_id, customer_name, customer_email, quantity, purchase_date, status";

// --- Events ---

pub async fn insert_event(pool: &SqlitePool, event: &Event) -> Result<()> {
    sqlx::query(
        "INSERT INTO events (id, name, date, time, price, available_tickets, location, category, vendor_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.id)
    .bind(&event.name)
    .bind(&event.date)
    .bind(&event.time)
    .bind(event.price)
    .bind(event.available_tickets)
    .bind(&event.location)
    .bind(&event.category)
    .bind(&event.vendor_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_event(pool: &SqlitePool, event_id: &str) -> Result<Option<Event>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?");
    let event = sqlx::query_as::<_, Event>(&sql)
        .bind(event_id)
        .fetch_optional(pool)
        .await?;
    Ok(event)
}

pub async fn list_events(pool: &SqlitePool, filter: &EventFilter) -> Result<Vec<Event>> {
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1=1"));
    if let Some(category) = filter.category.as_deref() {
        query.push(" AND category = ").push_bind(category);
    }
    if let Some(vendor_id) = filter.vendor_id.as_deref() {
        query.push(" AND vendor_id = ").push_bind(vendor_id);
    }
    query.push(" ORDER BY date, time");

    let events = query.build_query_as::<Event>().fetch_all(pool).await?;
    Ok(events)
}

/// Overwrites every editable column. Returns false if the event is gone.
pub async fn update_event(pool: &SqlitePool, event: &Event) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE events SET name = ?, date = ?, time = ?, price = ?, available_tickets = ?, \
            location = ?, category = ?, updated_at = datetime('now') \
         WHERE id = ?",
    )
    .bind(&event.name)
    .bind(&event.date)
    .bind(&event.time)
    .bind(event.price)
    .bind(event.available_tickets)
    .bind(&event.location)
    .bind(&event.category)
    .bind(&event.id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_event(pool: &SqlitePool, event_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(event_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Takes `quantity` tickets in a single statement that only matches while
/// enough remain. When nothing matched, a second read tells a missing event
/// apart from a sold-out one.
pub async fn conditional_decrement(pool: &SqlitePool, event_id: &str, quantity: NonZeroU32) -> Result<Decrement> {
    let quantity = i64::from(quantity.get());
    let result = sqlx::query(
        "UPDATE events SET available_tickets = available_tickets - ?, updated_at = datetime('now') \
         WHERE id = ? AND available_tickets >= ?",
    )
    .bind(quantity)
    .bind(event_id)
    .bind(quantity)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(Decrement::Applied);
    }

    let available: Option<i64> = sqlx::query_scalar("SELECT available_tickets FROM events WHERE id = ?")
        .bind(event_id)
        .fetch_optional(pool)
        .await?;
    Ok(match available {
        Some(available) => Decrement::InsufficientStock { available },
        None => Decrement::NotFound,
    })
}

/// Sold counts every ticket row for the event regardless of payment status.
pub async fn event_stats(pool: &SqlitePool, event: &Event) -> Result<EventStats> {
    let sold: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM tickets WHERE event_id = ?")
        .bind(&event.id)
        .fetch_one(pool)
        .await?;
    Ok(EventStats {
        event_id: event.id.clone(),
        total_tickets: event.available_tickets + sold,
        sold_tickets: sold,
        available_tickets: event.available_tickets,
        revenue: sold as f64 * event.price,
    })
}

// --- Tickets ---

pub async fn insert_ticket(pool: &SqlitePool, ticket: &Ticket) -> Result<()> {
    sqlx::query(
        "INSERT INTO tickets (id, event_id, customer_name, customer_email, quantity, purchase_date, status) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&ticket.id)
    .bind(&ticket.event_id)
    .bind(&ticket.customer_name)
    .bind(&ticket.customer_email)
    .bind(ticket.quantity)
    .bind(&ticket.purchase_date)
    .bind(ticket.status.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_ticket(pool: &SqlitePool, ticket_id: &str) -> Result<Option<Ticket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?");
    let ticket = sqlx::query_as::<_, Ticket>(&sql)
        .bind(ticket_id)
        .fetch_optional(pool)
        .await?;
    Ok(ticket)
}

pub async fn list_tickets_for_event(pool: &SqlitePool, event_id: &str) -> Result<Vec<Ticket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE event_id = ? ORDER BY purchase_date DESC");
    let tickets = sqlx::query_as::<_, Ticket>(&sql)
        .bind(event_id)
        .fetch_all(pool)
        .await?;
    Ok(tickets)
}

pub async fn list_tickets_by_email(pool: &SqlitePool, email: &str) -> Result<Vec<Ticket>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE customer_email = ? ORDER BY purchase_date DESC");
    let tickets = sqlx::query_as::<_, Ticket>(&sql)
        .bind(email)
        .fetch_all(pool)
        .await?;
    Ok(tickets)
}

pub async fn update_ticket_status(pool: &SqlitePool, ticket_id: &str, status: TicketStatus) -> Result<bool> {
    let result = sqlx::query("UPDATE tickets SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(ticket_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- Reservation store ---

/// [`EventStore`] over the `events` table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        get_event(&self.pool, event_id).await
    }

    async fn conditional_decrement(&self, event_id: &str, quantity: NonZeroU32) -> Result<Decrement> {
        conditional_decrement(&self.pool, event_id, quantity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_reservation::{ReservationError, ReservationQueue};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn test_pool() -> SqlitePool {
        // Every in-memory connection is its own database, so pin the pool to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    fn event(id: &str, category: &str, vendor_id: &str, available: i64) -> Event {
        Event {
            id: id.to_string(),
            name: format!("Event {id}"),
            date: "2031-05-01".to_string(),
            time: "18:00".to_string(),
            price: 12.5,
            available_tickets: available,
            location: "Main Hall".to_string(),
            category: category.to_string(),
            vendor_id: vendor_id.to_string(),
        }
    }

    fn ticket(id: &str, event_id: &str, email: &str, quantity: i64, purchase_date: &str) -> Ticket {
        Ticket {
            id: id.to_string(),
            event_id: event_id.to_string(),
            customer_name: "Grace".to_string(),
            customer_email: email.to_string(),
            quantity,
            purchase_date: purchase_date.to_string(),
            status: TicketStatus::Pending,
        }
    }

    fn n(q: u32) -> NonZeroU32 {
        NonZeroU32::new(q).unwrap()
    }

    #[tokio::test]
    async fn event_crud() {
        let pool = test_pool().await;
        let mut e = event("e1", "music", "v1", 50);
        insert_event(&pool, &e).await.unwrap();
        assert_eq!(get_event(&pool, "e1").await.unwrap(), Some(e.clone()));

        e.name = "Renamed".to_string();
        e.available_tickets = 60;
        assert!(update_event(&pool, &e).await.unwrap());
        assert_eq!(get_event(&pool, "e1").await.unwrap().unwrap().available_tickets, 60);

        assert!(delete_event(&pool, "e1").await.unwrap());
        assert!(!delete_event(&pool, "e1").await.unwrap());
        assert!(get_event(&pool, "e1").await.unwrap().is_none());
        assert!(!update_event(&pool, &e).await.unwrap());
    }

    #[tokio::test]
    async fn list_events_filters() {
        let pool = test_pool().await;
        insert_event(&pool, &event("e1", "music", "v1", 1)).await.unwrap();
        insert_event(&pool, &event("e2", "sport", "v1", 1)).await.unwrap();
        insert_event(&pool, &event("e3", "music", "v2", 1)).await.unwrap();

        let all = list_events(&pool, &EventFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let music = EventFilter { category: Some("music".to_string()), vendor_id: None };
        assert_eq!(list_events(&pool, &music).await.unwrap().len(), 2);

        let music_v2 = EventFilter { category: Some("music".to_string()), vendor_id: Some("v2".to_string()) };
        let found = list_events(&pool, &music_v2).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "e3");
    }

    #[tokio::test]
    async fn conditional_decrement_outcomes() {
        let pool = test_pool().await;
        insert_event(&pool, &event("e1", "music", "v1", 3)).await.unwrap();

        assert_eq!(conditional_decrement(&pool, "e1", n(2)).await.unwrap(), Decrement::Applied);
        assert_eq!(
            conditional_decrement(&pool, "e1", n(2)).await.unwrap(),
            Decrement::InsufficientStock { available: 1 }
        );
        assert_eq!(get_event(&pool, "e1").await.unwrap().unwrap().available_tickets, 1);
        assert_eq!(conditional_decrement(&pool, "missing", n(1)).await.unwrap(), Decrement::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn queue_over_sqlite_sells_exactly_the_stock() {
        let pool = test_pool().await;
        insert_event(&pool, &event("E1", "music", "v1", 2)).await.unwrap();
        let queue = Arc::new(ReservationQueue::new(SqliteStore::new(pool.clone())));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.reserve("E1", n(1)).await })
            })
            .collect();

        let mut ok = 0;
        let mut short = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(ReservationError::InsufficientStock { .. }) => short += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, short), (2, 1));
        assert_eq!(get_event(&pool, "E1").await.unwrap().unwrap().available_tickets, 0);
    }

    #[tokio::test]
    async fn tickets_and_stats() {
        let pool = test_pool().await;
        let e = event("e1", "music", "v1", 10);
        insert_event(&pool, &e).await.unwrap();

        insert_ticket(&pool, &ticket("t1", "e1", "a@x.io", 2, "2031-01-01T10:00:00Z")).await.unwrap();
        insert_ticket(&pool, &ticket("t2", "e1", "b@x.io", 3, "2031-01-02T10:00:00Z")).await.unwrap();
        insert_ticket(&pool, &ticket("t3", "e2", "a@x.io", 1, "2031-01-03T10:00:00Z")).await.unwrap();

        let for_event = list_tickets_for_event(&pool, "e1").await.unwrap();
        assert_eq!(for_event.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), ["t2", "t1"]);

        let for_email = list_tickets_by_email(&pool, "a@x.io").await.unwrap();
        assert_eq!(for_email.len(), 2);

        assert!(update_ticket_status(&pool, "t1", TicketStatus::Paid).await.unwrap());
        assert_eq!(get_ticket(&pool, "t1").await.unwrap().unwrap().status, TicketStatus::Paid);
        assert!(!update_ticket_status(&pool, "nope", TicketStatus::Paid).await.unwrap());

        let stats = event_stats(&pool, &e).await.unwrap();
        assert_eq!(stats.sold_tickets, 5);
        assert_eq!(stats.total_tickets, 15);
        assert_eq!(stats.available_tickets, 10);
        assert!((stats.revenue - 62.5).abs() < f64::EPSILON);
    }
}
