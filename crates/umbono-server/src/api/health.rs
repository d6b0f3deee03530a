//! Liveness probe

use axum::Json;
use serde_json::{json, Value};

/// Report that the process is up and the classifier finished bootstrapping
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
