use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use dirgate_directory::check_directory;
use serde::Serialize;
use tracing::warn;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub directory: &'static str,
    pub uptime_seconds: u64,
    pub checked_at: DateTime<Utc>,
}

/// GET /api/health
///
/// Unauthenticated. Binds with the service account; 503 when that fails.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let reachable = match check_directory(state.connector.as_ref(), &state.config).await {
        Ok(()) => true,
        Err(e) => {
            warn!(directory = state.connector.name(), error = %e, "Directory health check failed");
            false
        }
    };

    let status = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthStatus {
            status: if reachable { "ok" } else { "degraded" },
            version: dirgate_core::VERSION,
            directory: if reachable { "reachable" } else { "unreachable" },
            uptime_seconds: state.metrics.uptime_seconds(),
            checked_at: Utc::now(),
        }),
    )
}
