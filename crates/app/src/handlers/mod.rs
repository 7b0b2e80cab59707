pub mod events;
pub mod tickets;

use axum::Json;
use serde_json::json;

use crate::version_string;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": version_string()
    }))
}

/// Local wall-clock time, the frame event dates and times are written in.
pub(crate) fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}
