// ABOUTME: Service info and health check endpoints
// ABOUTME: Unauthenticated and independent of the database

use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use hellafresh_core::{API_VERSION, SERVICE_NAME};

pub async fn service_info() -> Json<Value> {
    Json(json!({
        "message": "Welcome to HellaFresh API",
        "version": API_VERSION,
        "status": "active"
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": API_VERSION,
        "timestamp": Utc::now().timestamp()
    }))
}
