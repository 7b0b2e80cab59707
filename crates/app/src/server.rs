use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, patch, post},
};
use boxoffice_config::Config;
use boxoffice_db::SqliteStore;
use boxoffice_reservation::ReservationQueue;
use jsonwebtoken::DecodingKey;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth;
use crate::handlers::{self, events, tickets};
use crate::version_string;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    /// Sole path for taking tickets out of an event.
    pub reservations: Arc<ReservationQueue<SqliteStore>>,
    pub jwt_key: Arc<DecodingKey>,
    pub reserve_timeout: Duration,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt_secret: &str, reserve_timeout: Duration) -> Self {
        Self {
            reservations: Arc::new(ReservationQueue::new(SqliteStore::new(pool.clone()))),
            pool,
            jwt_key: Arc::new(auth::decoding_key(jwt_secret)),
            reserve_timeout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/{id}",
            get(events::get_event).put(events::update_event).delete(events::delete_event),
        )
        .route("/events/{id}/tickets", get(events::event_tickets))
        .route("/events/{id}/stats", get(events::event_stats))
        .route("/tickets/purchase", post(tickets::purchase_ticket))
        .route("/tickets/validate/{id}", get(tickets::validate_ticket))
        .route("/tickets/email/{email}", get(tickets::tickets_by_email))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}/status", patch(tickets::update_ticket_status));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: &Config, pool: SqlitePool) -> anyhow::Result<()> {
    info!("boxoffice v{}", version_string());

    let state = AppState::new(pool, &config.jwt_secret, config.reserve_timeout);
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
