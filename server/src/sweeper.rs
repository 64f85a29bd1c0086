use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::store::{CleanupReport, Store};

/// Periodically drops rooms older than `max_age`.
///
/// Runs until the returned handle is aborted or the runtime shuts down.
pub fn spawn(store: Arc<Store>, interval: Duration, max_age: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a fresh process
        // does not sweep before serving anything.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = store.cleanup(max_age);
            log_report(report);
        }
    })
}

fn log_report(report: CleanupReport) {
    if report.rooms == 0 {
        tracing::debug!("Cleanup sweep removed nothing");
        return;
    }
    tracing::info!(
        rooms = report.rooms,
        claims = report.claims,
        "Cleanup sweep removed expired rooms"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::now_ms;

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_expired_rooms() {
        let store = Arc::new(Store::with_seed(1));
        let max_age = Duration::from_secs(60);
        let expired = store.create_room_at(10, 500, now_ms() - 120_000);
        let fresh = store.create_room(10, 500);
        store.claim(&expired, "u1").unwrap();

        let handle = spawn(Arc::clone(&store), Duration::from_secs(5), max_age);
        tokio::task::yield_now().await;
        assert!(store.get_room(&expired).is_some());

        tokio::time::advance(Duration::from_secs(5)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert!(store.get_room(&expired).is_none());
        assert!(store.get_room(&fresh).is_some());
        assert_eq!(store.stats().claims, 0);
        handle.abort();
    }
}
