use lixi_types::Rejection;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const LATENCY_BUCKET_COUNT: usize = 12;
const LATENCY_BUCKETS_MS: [u64; LATENCY_BUCKET_COUNT] =
    [1, 2, 5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000];

#[derive(Clone, Debug, Serialize)]
pub struct LatencySnapshot {
    pub buckets_ms: Vec<u64>,
    pub counts: Vec<u64>,
    pub overflow: u64,
    pub count: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
}

#[derive(Default)]
struct LatencyMetrics {
    buckets: [AtomicU64; LATENCY_BUCKET_COUNT],
    overflow: AtomicU64,
    count: AtomicU64,
    total_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyMetrics {
    fn record(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);

        match LATENCY_BUCKETS_MS.iter().position(|bucket| ms <= *bucket) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        let avg_ms = if count > 0 {
            total_ms as f64 / count as f64
        } else {
            0.0
        };
        let counts = self
            .buckets
            .iter()
            .map(|bucket| bucket.load(Ordering::Relaxed))
            .collect::<Vec<_>>();

        LatencySnapshot {
            buckets_ms: LATENCY_BUCKETS_MS.to_vec(),
            counts,
            overflow: self.overflow.load(Ordering::Relaxed),
            count,
            avg_ms,
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HttpMetricsSnapshot {
    pub create_room: LatencySnapshot,
    pub claim: LatencySnapshot,
    pub rooms_created: u64,
    pub claims_issued: u64,
    pub claims_repeated: u64,
    pub rejections: RejectionCounts,
    pub reject_body_limit: u64,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RejectionCounts {
    pub amount_required: u64,
    pub amount_not_pair: u64,
    pub amount_out_of_range: u64,
    pub invalid_id: u64,
    pub invalid_account: u64,
    pub room_not_found: u64,
    pub claim_failed: u64,
}

#[derive(Default)]
pub struct HttpMetrics {
    create_room: LatencyMetrics,
    claim: LatencyMetrics,
    rooms_created: AtomicU64,
    claims_issued: AtomicU64,
    claims_repeated: AtomicU64,
    rejections: [AtomicU64; 7],
    reject_body_limit: AtomicU64,
}

fn rejection_slot(rejection: Rejection) -> usize {
    match rejection {
        Rejection::AmountRequired => 0,
        Rejection::AmountNotPair => 1,
        Rejection::AmountOutOfRange => 2,
        Rejection::InvalidId => 3,
        Rejection::InvalidAccount => 4,
        Rejection::RoomNotFound => 5,
        Rejection::ClaimFailed => 6,
    }
}

impl HttpMetrics {
    pub fn record_create_room(&self, duration: Duration) {
        self.create_room.record(duration);
    }

    pub fn record_claim(&self, duration: Duration) {
        self.claim.record(duration);
    }

    pub fn inc_room_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_claim(&self, repeated: bool) {
        if repeated {
            self.claims_repeated.fetch_add(1, Ordering::Relaxed);
        } else {
            self.claims_issued.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_rejection(&self, rejection: Rejection) {
        self.rejections[rejection_slot(rejection)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reject_body_limit(&self) {
        self.reject_body_limit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        let rejected = |rejection| self.rejections[rejection_slot(rejection)].load(Ordering::Relaxed);
        HttpMetricsSnapshot {
            create_room: self.create_room.snapshot(),
            claim: self.claim.snapshot(),
            rooms_created: self.rooms_created.load(Ordering::Relaxed),
            claims_issued: self.claims_issued.load(Ordering::Relaxed),
            claims_repeated: self.claims_repeated.load(Ordering::Relaxed),
            rejections: RejectionCounts {
                amount_required: rejected(Rejection::AmountRequired),
                amount_not_pair: rejected(Rejection::AmountNotPair),
                amount_out_of_range: rejected(Rejection::AmountOutOfRange),
                invalid_id: rejected(Rejection::InvalidId),
                invalid_account: rejected(Rejection::InvalidAccount),
                room_not_found: rejected(Rejection::RoomNotFound),
                claim_failed: rejected(Rejection::ClaimFailed),
            },
            reject_body_limit: self.reject_body_limit.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_buckets() {
        let metrics = LatencyMetrics::default();
        metrics.record(Duration::from_millis(0));
        metrics.record(Duration::from_millis(7));
        metrics.record(Duration::from_millis(9_000));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.counts[0], 1);
        assert_eq!(snapshot.counts[3], 1);
        assert_eq!(snapshot.overflow, 1);
        assert_eq!(snapshot.max_ms, 9_000);
    }

    #[test]
    fn counters() {
        let metrics = HttpMetrics::default();
        metrics.inc_claim(false);
        metrics.inc_claim(true);
        metrics.inc_claim(true);
        metrics.inc_rejection(Rejection::InvalidId);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.claims_issued, 1);
        assert_eq!(snapshot.claims_repeated, 2);
        assert_eq!(snapshot.rejections.invalid_id, 1);
        assert_eq!(snapshot.rejections.claim_failed, 0);
    }
}
