use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// A business-rule violation in a request body. The message is safe to show to
/// the client as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// --- Events ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub date: String,
    pub time: String,
    pub price: f64,
    pub available_tickets: i64,
    pub location: String,
    pub category: String,
    pub vendor_id: String,
}

impl Event {
    /// Start of the event, or `None` if the stored date/time do not parse.
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        parse_start(&self.date, &self.time).ok()
    }

    /// Checks every field rule. `now` is the local wall-clock time the event must
    /// not precede.
    pub fn validate(&self, now: NaiveDateTime) -> Result<(), ValidationError> {
        require(&self.name, "Name is required")?;
        require(&self.date, "Date is required")?;
        require(&self.time, "Time is required")?;
        if self.price < 0.0 || self.price.is_nan() {
            return Err(ValidationError::new("Price must be positive"));
        }
        if self.available_tickets < 0 {
            return Err(ValidationError::new("Available tickets must be positive"));
        }
        require(&self.location, "Location is required")?;
        require(&self.category, "Category is required")?;
        require(&self.vendor_id, "Vendor ID is required")?;

        let starts_at = parse_start(&self.date, &self.time)?;
        if starts_at < now {
            return Err(ValidationError::new("Event date must be in the future"));
        }
        Ok(())
    }

    /// Applies the fields present in `update`. The id and the owning vendor never change.
    pub fn apply(&mut self, update: EventUpdate) {
        if let Some(v) = update.name { self.name = v; }
        if let Some(v) = update.date { self.date = v; }
        if let Some(v) = update.time { self.time = v; }
        if let Some(v) = update.price { self.price = v; }
        if let Some(v) = update.available_tickets { self.available_tickets = v; }
        if let Some(v) = update.location { self.location = v; }
        if let Some(v) = update.category { self.category = v; }
    }
}

/// Body of `POST /api/events`. The vendor comes from the caller's identity, not the body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    pub date: String,
    pub time: String,
    pub price: f64,
    pub available_tickets: i64,
    pub location: String,
    pub category: String,
}

impl NewEvent {
    pub fn into_event(self, id: String, vendor_id: String) -> Event {
        Event {
            id,
            name: self.name,
            date: self.date,
            time: self.time,
            price: self.price,
            available_tickets: self.available_tickets,
            location: self.location,
            category: self.category,
            vendor_id,
        }
    }
}

/// Partial update for `PUT /api/events/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub price: Option<f64>,
    pub available_tickets: Option<i64>,
    pub location: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    pub category: Option<String>,
    pub vendor_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub event_id: String,
    pub total_tickets: i64,
    pub sold_tickets: i64,
    pub available_tickets: i64,
    pub revenue: f64,
}

// --- Tickets ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Paid,
    Failed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Paid => "paid",
            TicketStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "paid" => Ok(TicketStatus::Paid),
            "failed" => Ok(TicketStatus::Failed),
            _ => Err(ValidationError::new("Invalid ticket status")),
        }
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub event_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub quantity: i64,
    pub purchase_date: String,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
}

/// Body of `POST /api/tickets/purchase`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub event_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub quantity: i64,
}

impl PurchaseRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.event_id, "Event ID is required")?;
        if self.customer_name.trim().chars().count() < 2 {
            return Err(ValidationError::new("Customer name must be at least 2 characters long"));
        }
        if !is_valid_email(&self.customer_email) {
            return Err(ValidationError::new("Valid email is required"));
        }
        if self.quantity < 1 {
            return Err(ValidationError::new("Quantity must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketValidation {
    pub valid: bool,
    pub ticket: Ticket,
    pub event: Event,
}

// --- Helpers ---

fn require(value: &str, message: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(message))
    } else {
        Ok(())
    }
}

fn parse_start(date: &str, time: &str) -> Result<NaiveDateTime, ValidationError> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| ValidationError::new("Date must be formatted as YYYY-MM-DD"))?;
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT)
        .map_err(|_| ValidationError::new("Time must be formatted as HH:MM"))?;
    Ok(date.and_time(time))
}

/// Same shape as `^[^\s@]+@[^\s@]+\.[^\s@]+$`: one `@`, no whitespace, and a dot
/// with something on both sides somewhere in the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
