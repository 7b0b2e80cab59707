use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use boxoffice_models::{Event, EventFilter, EventStats, EventUpdate, NewEvent, Ticket};
use serde_json::{Value, json};
use tracing::info;

use super::now;
use crate::auth::Vendor;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(boxoffice_db::list_events(&state.pool, &filter).await?))
}

pub async fn get_event(State(state): State<AppState>, Path(event_id): Path<String>) -> ApiResult<Json<Event>> {
    boxoffice_db::get_event(&state.pool, &event_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Event"))
}

pub async fn create_event(
    State(state): State<AppState>,
    vendor: Vendor,
    body: Result<Json<NewEvent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = body?;
    let event = body.into_event(uuid::Uuid::new_v4().to_string(), vendor.id);
    event.validate(now())?;

    boxoffice_db::insert_event(&state.pool, &event).await?;
    info!(event_id = %event.id, vendor_id = %event.vendor_id, "Event created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Event created successfully", "event": event })),
    ))
}

/// Runs under the event's reservation turn so a stock edit cannot interleave
/// with an in-flight sale.
pub async fn update_event(
    State(state): State<AppState>,
    vendor: Vendor,
    Path(event_id): Path<String>,
    body: Result<Json<EventUpdate>, JsonRejection>,
) -> ApiResult<Json<Event>> {
    let Json(update) = body?;
    state
        .reservations
        .exclusive(&event_id, async {
            let mut event = owned_event(&state, &vendor, &event_id, "update this event").await?;
            event.apply(update);
            event.validate(now())?;

            if !boxoffice_db::update_event(&state.pool, &event).await? {
                return Err(ApiError::not_found("Event"));
            }
            info!(event_id = %event.id, "Event updated");
            Ok::<_, ApiError>(Json(event))
        })
        .await
}

pub async fn delete_event(
    State(state): State<AppState>,
    vendor: Vendor,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .reservations
        .exclusive(&event_id, async {
            owned_event(&state, &vendor, &event_id, "delete this event").await?;
            if !boxoffice_db::delete_event(&state.pool, &event_id).await? {
                return Err(ApiError::not_found("Event"));
            }
            info!(%event_id, "Event deleted");
            Ok::<_, ApiError>(Json(json!({ "message": "Event deleted successfully" })))
        })
        .await
}

pub async fn event_tickets(
    State(state): State<AppState>,
    vendor: Vendor,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Vec<Ticket>>> {
    owned_event(&state, &vendor, &event_id, "access this event").await?;
    Ok(Json(boxoffice_db::list_tickets_for_event(&state.pool, &event_id).await?))
}

pub async fn event_stats(
    State(state): State<AppState>,
    vendor: Vendor,
    Path(event_id): Path<String>,
) -> ApiResult<Json<EventStats>> {
    let event = owned_event(&state, &vendor, &event_id, "view event stats").await?;
    Ok(Json(boxoffice_db::event_stats(&state.pool, &event).await?))
}

async fn owned_event(state: &AppState, vendor: &Vendor, event_id: &str, action: &str) -> ApiResult<Event> {
    let event = boxoffice_db::get_event(&state.pool, event_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    vendor.ensure_owns(&event.vendor_id, action)?;
    Ok(event)
}
