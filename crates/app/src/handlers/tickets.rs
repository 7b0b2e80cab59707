use std::num::NonZeroU32;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use boxoffice_models::{PurchaseRequest, Ticket, TicketStatus, TicketValidation};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use super::now;
use crate::auth::Vendor;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Reserves stock first and only then writes the ticket row.
pub async fn purchase_ticket(
    State(state): State<AppState>,
    body: Result<Json<PurchaseRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = body.map_err(|_| {
        ApiError::BadRequest("Event ID, customer name, email and quantity are required".to_string())
    })?;
    request.validate()?;
    let quantity = u32::try_from(request.quantity)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| ApiError::BadRequest("Quantity is too large".to_string()))?;

    state
        .reservations
        .reserve_with_timeout(&request.event_id, quantity, state.reserve_timeout)
        .await?;

    let ticket = Ticket {
        id: uuid::Uuid::new_v4().to_string(),
        event_id: request.event_id,
        customer_name: request.customer_name.trim().to_string(),
        customer_email: request.customer_email,
        quantity: request.quantity,
        purchase_date: chrono::Utc::now().to_rfc3339(),
        status: TicketStatus::Pending,
    };
    if let Err(e) = boxoffice_db::insert_ticket(&state.pool, &ticket).await {
        // Stock is already gone at this point and nothing gives it back.
        error!(
            event_id = %ticket.event_id,
            quantity = ticket.quantity,
            "Reserved tickets but failed to record the purchase: {e:#}"
        );
        return Err(e.into());
    }
    info!(ticket_id = %ticket.id, event_id = %ticket.event_id, quantity = ticket.quantity, "Ticket purchased");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Ticket created successfully", "ticket": ticket })),
    ))
}

pub async fn get_ticket(State(state): State<AppState>, Path(ticket_id): Path<String>) -> ApiResult<Json<Ticket>> {
    boxoffice_db::get_ticket(&state.pool, &ticket_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Ticket"))
}

/// A ticket is good for entry once paid and while its event has not started.
pub async fn validate_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<Json<TicketValidation>> {
    let ticket = boxoffice_db::get_ticket(&state.pool, &ticket_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;
    if ticket.status != TicketStatus::Paid {
        return Err(ApiError::BadRequest("Ticket not paid".to_string()));
    }

    let event = boxoffice_db::get_event(&state.pool, &ticket.event_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    if event.starts_at().is_none_or(|starts_at| starts_at < now()) {
        return Err(ApiError::BadRequest("Event has expired".to_string()));
    }

    Ok(Json(TicketValidation { valid: true, ticket, event }))
}

pub async fn tickets_by_email(State(state): State<AppState>, Path(email): Path<String>) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(boxoffice_db::list_tickets_by_email(&state.pool, &email).await?))
}

#[derive(Deserialize)]
pub struct StatusBody {
    status: Option<String>,
}

pub async fn update_ticket_status(
    State(state): State<AppState>,
    _vendor: Vendor,
    Path(ticket_id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let status: TicketStatus = body
        .status
        .ok_or_else(|| ApiError::BadRequest("Status is required".to_string()))?
        .parse()?;

    if !boxoffice_db::update_ticket_status(&state.pool, &ticket_id, status).await? {
        return Err(ApiError::not_found("Ticket"));
    }
    let ticket = boxoffice_db::get_ticket(&state.pool, &ticket_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;
    info!(%ticket_id, %status, "Ticket status updated");

    Ok(Json(json!({ "message": "Ticket status updated successfully", "ticket": ticket })))
}
