use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "unireg_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "unireg_query_duration_seconds";

/// Counter: registrar decisions. Labels: operation, outcome.
pub const ADMISSIONS_TOTAL: &str = "unireg_admissions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "unireg_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "unireg_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "unireg_connections_rejected_total";

/// Gauge: number of loaded tenants.
pub const TENANTS_ACTIVE: &str = "unireg_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "unireg_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "unireg_wal_flush_batch_size";

/// Counter: WAL compactions run. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "unireg_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertCourse { .. } => "insert_course",
        Command::UpdateCourse { .. } => "update_course",
        Command::DeleteCourse { .. } => "delete_course",
        Command::InsertStudent { .. } => "insert_student",
        Command::DeleteStudent { .. } => "delete_student",
        Command::InsertEnrollment { .. } => "insert_enrollment",
        Command::DeleteEnrollment { .. } => "delete_enrollment",
        Command::SelectCourses { .. } => "select_courses",
        Command::SelectStudents => "select_students",
        Command::SelectEnrollments { .. } => "select_enrollments",
        Command::SelectSchedule { .. } => "select_schedule",
    }
}
