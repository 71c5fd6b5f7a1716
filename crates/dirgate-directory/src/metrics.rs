//! Directory-side metrics
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder that exports them.

use metrics::{counter, histogram};
use std::time::Instant;

/// Metric names
pub mod names {
    pub const DIRECTORY_OPERATIONS_TOTAL: &str = "dirgate_directory_operations_total";
    pub const DIRECTORY_OPERATION_DURATION_SECONDS: &str =
        "dirgate_directory_operation_duration_seconds";

    pub const MEMBERSHIP_WRITES_TOTAL: &str = "dirgate_membership_writes_total";
    pub const MEMBERSHIP_CONFLICTS_TOTAL: &str = "dirgate_membership_conflicts_total";
}

/// Record one directory round trip
pub fn record_directory_op(op: &'static str, started: Instant, success: bool) {
    counter!(
        names::DIRECTORY_OPERATIONS_TOTAL,
        "operation" => op,
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);

    histogram!(names::DIRECTORY_OPERATION_DURATION_SECONDS, "operation" => op)
        .record(started.elapsed().as_secs_f64());
}

/// Record a group member-list write (`add` or `remove`)
pub fn record_membership_write(change: &'static str) {
    counter!(names::MEMBERSHIP_WRITES_TOTAL, "change" => change).increment(1);
}

pub fn record_membership_conflict() {
    counter!(names::MEMBERSHIP_CONFLICTS_TOTAL).increment(1);
}
