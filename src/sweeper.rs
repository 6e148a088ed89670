use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use tracing::info;

use crate::engine::Engine;

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Background task that removes settled bookings once their checkout is
/// older than the retention window. Occupying bookings and blocks are
/// never touched.
pub async fn run_sweeper(engine: Arc<Engine>, retention_days: u64) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let horizon = Utc::now().date_naive() - Days::new(retention_days);
        let swept = sweep_once(&engine, horizon).await;
        if swept > 0 {
            info!("swept {swept} settled bookings older than {horizon}");
        }
    }
}

pub async fn sweep_once(engine: &Engine, horizon: chrono::NaiveDate) -> usize {
    let mut swept = 0;
    for (booking_id, _room_id) in engine.collect_settled_bookings(horizon) {
        match engine.remove_booking(booking_id).await {
            Ok(_) => swept += 1,
            Err(e) => {
                // May already be gone, nothing to do
                tracing::debug!("sweeper skip {booking_id}: {e}");
            }
        }
    }
    metrics::counter!(crate::observability::BOOKINGS_SWEPT_TOTAL).increment(swept as u64);
    swept
}

/// Background task that compacts the WAL once enough appends have
/// accumulated since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => tracing::error!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("stayd_test_sweeper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[tokio::test]
    async fn sweep_removes_only_old_settled_bookings() {
        let path = test_wal_path("sweep_once.wal");
        let engine = Arc::new(Engine::new(path, Arc::new(NotifyHub::new())).unwrap());

        let hid = Ulid::new();
        engine.create_homestay(hid, None).await.unwrap();
        let rid = Ulid::new();
        engine.create_room(rid, hid, None).await.unwrap();

        let old = Ulid::new();
        engine
            .request_booking(old, rid, DateRange::new(d(1, 1), d(1, 5)), None)
            .await
            .unwrap();
        engine
            .set_booking_status(old, BookingStatus::Cancelled)
            .await
            .unwrap();

        let live = Ulid::new();
        engine
            .request_booking(live, rid, DateRange::new(d(1, 10), d(1, 15)), None)
            .await
            .unwrap();

        let swept = sweep_once(&engine, d(6, 1)).await;
        assert_eq!(swept, 1);

        let remaining = engine
            .list_bookings(TargetId::Room(rid), None)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live);
    }
}
