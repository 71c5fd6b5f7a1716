//! REST admin API for dirgate
//!
//! Basic-authenticated JSON endpoints over users and groups, each request
//! running in a directory session bound as the caller.

pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;


pub use error::{ApiError, ApiResult};
pub use metrics::MetricsRecorder;
pub use server::{create_router, ApiServer, AppState};
