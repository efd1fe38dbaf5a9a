// ABOUTME: Cross-cutting HTTP layers for the server binary
// ABOUTME: Panic recovery with the same structured error body the API uses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;
use uuid::Uuid;

/// Create a panic handler that returns consistent error responses
pub fn create_panic_handler(
) -> CatchPanicLayer<fn(Box<dyn std::any::Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(handle_panic as fn(_) -> Response)
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let panic_message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic occurred"
    };

    error!(
        request_id = %request_id,
        panic_message = %panic_message,
        audit = true,
        "Server panic occurred"
    );

    let error_response = json!({
        "success": false,
        "error": {
            "code": "INTERNAL_ERROR",
            "message": "An internal server error occurred"
        },
        "request_id": request_id
    });

    (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response)).into_response()
}
