use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "stayd_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "stayd_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "stayd_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "stayd_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "stayd_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "stayd_tenants_active";

/// Counter: settled bookings removed by the retention sweeper.
pub const BOOKINGS_SWEPT_TOTAL: &str = "stayd_bookings_swept_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "stayd_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "stayd_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertHomestay { .. } => "insert_homestay",
        Command::UpdateHomestay { .. } => "update_homestay",
        Command::DeleteHomestay { .. } => "delete_homestay",
        Command::InsertRoom { .. } => "insert_room",
        Command::UpdateRoom { .. } => "update_room",
        Command::DeleteRoom { .. } => "delete_room",
        Command::InsertBooking { .. } => "insert_booking",
        Command::BatchInsertBookings { .. } => "batch_insert_bookings",
        Command::UpdateBookingStatus { .. } => "update_booking_status",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::InsertBlock { .. } => "insert_block",
        Command::UpdateBlock { .. } => "update_block",
        Command::DeleteBlock { .. } => "delete_block",
        Command::SelectHomestays => "select_homestays",
        Command::SelectRooms { .. } => "select_rooms",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectBlocks { .. } => "select_blocks",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectUnavailable { .. } => "select_unavailable",
    }
}
