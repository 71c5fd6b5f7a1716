//! Prometheus metrics for dirgate
//!
//! Exposes metrics at `/metrics` endpoint in Prometheus format.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;
use tracing::debug;

use crate::server::AppState;

/// Metric names
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "dirgate_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "dirgate_http_request_duration_seconds";

    // API operation metrics
    pub const API_OPERATIONS_TOTAL: &str = "dirgate_api_operations_total";
    pub const API_OPERATION_ERRORS_TOTAL: &str = "dirgate_api_operation_errors_total";

    // System metrics
    pub const UPTIME_SECONDS: &str = "dirgate_uptime_seconds";
    pub const INFO: &str = "dirgate_info";
}

/// Admin API operations, keyed by route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    Login,

    ListUsers,
    CreateUser,
    GetUser,
    UpdateUser,
    DeleteUser,
    ChangePassword,

    ListGroups,
    CreateGroup,
    GetGroup,
    UpdateGroup,
    DeleteGroup,
}

impl ApiOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::ListUsers => "ListUsers",
            Self::CreateUser => "CreateUser",
            Self::GetUser => "GetUser",
            Self::UpdateUser => "UpdateUser",
            Self::DeleteUser => "DeleteUser",
            Self::ChangePassword => "ChangePassword",
            Self::ListGroups => "ListGroups",
            Self::CreateGroup => "CreateGroup",
            Self::GetGroup => "GetGroup",
            Self::UpdateGroup => "UpdateGroup",
            Self::DeleteGroup => "DeleteGroup",
        }
    }

    /// Detect operation from HTTP method and matched route
    pub fn from_route(method: &Method, route: &str) -> Option<Self> {
        match (method.as_str(), route) {
            ("GET", "/api/login") => Some(Self::Login),

            ("GET", "/api/users") => Some(Self::ListUsers),
            ("POST", "/api/users") => Some(Self::CreateUser),
            ("PUT", "/api/users/password") => Some(Self::ChangePassword),
            ("GET", "/api/users/{id}") => Some(Self::GetUser),
            ("PUT", "/api/users/{id}") => Some(Self::UpdateUser),
            ("DELETE", "/api/users/{id}") => Some(Self::DeleteUser),

            ("GET", "/api/groups") => Some(Self::ListGroups),
            ("POST", "/api/groups") => Some(Self::CreateGroup),
            ("GET", "/api/groups/{id}") => Some(Self::GetGroup),
            ("PUT", "/api/groups/{id}") => Some(Self::UpdateGroup),
            ("DELETE", "/api/groups/{id}") => Some(Self::DeleteGroup),

            _ => None,
        }
    }
}

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Install the Prometheus recorder as the process-wide recorder
    pub fn install() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        gauge!(names::INFO, "version" => dirgate_core::VERSION).set(1.0);

        Ok(Self {
            handle,
            start_time: Instant::now(),
        })
    }

    /// A recorder that renders its own (empty) registry without touching the
    /// global one. Used where several servers share a process.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
            start_time: Instant::now(),
        }
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());

        self.handle.render()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        let status_class = format!("{}xx", status / 100);

        counter!(
            names::HTTP_REQUESTS_TOTAL,
            "method" => method.to_string(),
            "route" => route.to_string(),
            "status" => status.to_string(),
            "status_class" => status_class
        )
        .increment(1);

        histogram!(
            names::HTTP_REQUEST_DURATION_SECONDS,
            "method" => method.to_string(),
            "route" => route.to_string()
        )
        .record(duration_secs);
    }

    /// Record an admin API operation
    pub fn record_operation(&self, op: ApiOperation, status: u16) {
        let op_name = op.as_str();
        let success = status < 400;

        counter!(
            names::API_OPERATIONS_TOTAL,
            "operation" => op_name,
            "status" => if success { "success" } else { "error" }
        )
        .increment(1);

        if !success {
            counter!(
                names::API_OPERATION_ERRORS_TOTAL,
                "operation" => op_name,
                "status" => status.to_string()
            )
            .increment(1);
        }
    }
}

/// Axum middleware for recording HTTP metrics. Installed as a route layer so
/// the matched route is known and DNs never end up in labels.
pub async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    state
        .metrics
        .record_http_request(method.as_str(), &route, status, duration);
    if let Some(op) = ApiOperation::from_route(&method, &route) {
        state.metrics.record_operation(op, status);
    }

    debug!(
        method = %method,
        route = %route,
        status = %status,
        duration_ms = %(duration * 1000.0),
        "Request completed"
    );

    response
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let output = state.metrics.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_detection() {
        assert_eq!(
            ApiOperation::from_route(&Method::GET, "/api/users"),
            Some(ApiOperation::ListUsers)
        );
        assert_eq!(
            ApiOperation::from_route(&Method::PUT, "/api/users/password"),
            Some(ApiOperation::ChangePassword)
        );
        assert_eq!(
            ApiOperation::from_route(&Method::PUT, "/api/users/{id}"),
            Some(ApiOperation::UpdateUser)
        );
        assert_eq!(
            ApiOperation::from_route(&Method::DELETE, "/api/groups/{id}"),
            Some(ApiOperation::DeleteGroup)
        );
        assert_eq!(ApiOperation::from_route(&Method::GET, "/api/health"), None);
        assert_eq!(ApiOperation::from_route(&Method::POST, "/api/login"), None);
    }

    #[test]
    fn test_detached_recorder_renders() {
        let recorder = MetricsRecorder::detached();
        let _ = recorder.render();
        assert!(recorder.uptime_seconds() < 60);
    }
}
