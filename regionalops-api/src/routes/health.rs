/// Health check endpoint
///
/// Reports that the server is running and whether Supabase Auth answers.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "supabase": "connected"
/// }
/// ```
///
/// `status` is `degraded` when Supabase cannot be reached. Always `200`.

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Supabase reachability
    pub supabase: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.supabase.health().await;
    if !connected {
        tracing::warn!("Supabase health check failed");
    }

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        supabase: if connected { "connected" } else { "unreachable" }.to_string(),
    })
}
