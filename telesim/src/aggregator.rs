use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use telesim_core::{
    FailureCounts, FailureKind, LatencySummary, OutcomeSnapshot, Shape, ShapeCounts,
};
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Outcome counters shared by every dispatch unit of a run.
///
/// All counter writes are single atomic increments, so no lock is ever held
/// on the request path and no update is lost however many units record at once.
pub struct Outcomes {
    sent: AtomicU64,
    failed: AtomicU64,
    per_shape: [AtomicU64; Shape::COUNT],
    failures: [AtomicU64; FailureKind::COUNT],
    /// Latencies recorded since the last fold.
    pending: AtomicBucket<Duration>,
    digest: Mutex<TDigest<K1>>,
}

impl Outcomes {
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            per_shape: Default::default(),
            failures: Default::default(),
            pending: AtomicBucket::new(),
            digest: Mutex::new(default_tdigest()),
        }
    }

    pub fn record_success(&self, shape: Shape) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.per_shape[shape.index()].fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::counter!("telesim.sent", "shape" => shape.name()).increment(1);
    }

    pub fn record_failure(&self, kind: FailureKind) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.failures[kind.index()].fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        metrics::counter!("telesim.failed", "kind" => kind.name()).increment(1);
    }

    pub fn record_latency(&self, latency: Duration) {
        self.pending.push(latency);

        #[cfg(feature = "metrics")]
        metrics::histogram!("telesim.latency").record(latency.as_secs_f64());
    }

    /// Reads the counters without resetting them. Safe while writers are active.
    pub fn snapshot(&self) -> OutcomeSnapshot {
        OutcomeSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            per_shape: ShapeCounts(load_all(&self.per_shape)),
            failures: FailureCounts(load_all(&self.failures)),
        }
    }

    /// Moves pending latencies into the digest, keeping memory bounded by
    /// the digest size instead of the request count.
    pub fn fold_latencies(&self) {
        let mut latencies = vec![];
        self.pending.clear_with(|block| {
            latencies.extend_from_slice(block);
        });

        if latencies.is_empty() {
            return;
        }

        let mut digest = self.lock_digest();
        for latency in latencies.drain(..) {
            // Whole microseconds keep centroid sums exact, so centroid means
            // stay ordered even when many samples are identical.
            digest.insert(latency.as_micros() as f64);
        }
    }

    /// Latency quantiles over every request recorded so far.
    pub fn latency(&self) -> LatencySummary {
        self.fold_latencies();
        let digest = self.lock_digest();

        if digest.is_empty() {
            return LatencySummary::default();
        }

        LatencySummary {
            p50: quantile(&digest, 0.5),
            p90: quantile(&digest, 0.9),
            p99: quantile(&digest, 0.99),
        }
    }

    fn lock_digest(&self) -> MutexGuard<'_, TDigest<K1>> {
        self.digest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Outcomes {
    fn default() -> Self {
        Self::new()
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

fn load_all<const N: usize>(counters: &[AtomicU64; N]) -> [u64; N] {
    std::array::from_fn(|i| counters[i].load(Ordering::Relaxed))
}

fn quantile(digest: &TDigest<K1>, q: f64) -> Duration {
    let (min, max) = (digest.min(), digest.max());
    let micros = if min == max {
        min
    } else {
        digest.quantile(q).clamp(min, max)
    };

    let micros = if micros.is_finite() {
        micros.max(0.)
    } else {
        error!("Non-finite latency quantile {q}; reporting zero.");
        0.
    };

    Duration::from_micros(micros.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    #[ntest::timeout(10_000)]
    fn test_concurrent_records_are_not_lost() {
        let outcomes = Arc::new(Outcomes::new());
        let threads = 8;
        let per_thread = 10_000;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let outcomes = outcomes.clone();
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        if (t + i) % 5 == 0 {
                            outcomes.record_failure(FailureKind::BadStatus);
                        } else {
                            outcomes.record_success(Shape::from_index(i as u64));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = outcomes.snapshot();
        assert_eq!(snapshot.completed(), (threads * per_thread) as u64);
        assert_eq!(snapshot.failed, (threads * per_thread / 5) as u64);
        assert_eq!(snapshot.per_shape.total(), snapshot.sent);
        assert_eq!(snapshot.failures.get(FailureKind::BadStatus), snapshot.failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks() {
        let outcomes = Arc::new(Outcomes::new());
        let mut set = tokio::task::JoinSet::new();
        for i in 0..1_000u64 {
            let outcomes = outcomes.clone();
            set.spawn(async move {
                outcomes.record_success(Shape::from_index(i));
            });
        }
        while set.join_next().await.is_some() {}

        let snapshot = outcomes.snapshot();
        assert_eq!(snapshot.sent, 1_000);
        for shape in Shape::ALL {
            assert_eq!(snapshot.per_shape[shape], 250);
        }
    }

    #[test]
    fn test_snapshot_does_not_reset() {
        let outcomes = Outcomes::new();
        outcomes.record_success(Shape::Flat);
        outcomes.record_failure(FailureKind::Timeout);

        assert_eq!(outcomes.snapshot(), outcomes.snapshot());
        assert_eq!(outcomes.snapshot().per_shape.get(Shape::Flat), 1);
        assert_eq!(outcomes.snapshot().failures.get(FailureKind::Timeout), 1);
    }

    #[test]
    fn test_latency_quantiles() {
        let outcomes = Outcomes::new();
        assert_eq!(outcomes.latency(), LatencySummary::default());

        for ms in 1..=100 {
            outcomes.record_latency(Duration::from_millis(ms));
        }

        let latency = outcomes.latency();
        assert!(latency.p50 > Duration::from_millis(40));
        assert!(latency.p50 < Duration::from_millis(60));
        assert!(latency.p99 >= latency.p90);
        assert!(latency.p90 >= latency.p50);
    }

    #[test]
    #[ntest::timeout(10_000)]
    fn test_identical_latencies() {
        let outcomes = Outcomes::new();
        for _ in 0..100_000 {
            outcomes.record_latency(Duration::from_millis(5));
        }

        let latency = outcomes.latency();
        assert_eq!(latency.p50, Duration::from_millis(5));
        assert_eq!(latency.p90, Duration::from_millis(5));
        assert_eq!(latency.p99, Duration::from_millis(5));
    }

    #[test]
    fn test_mostly_identical_latencies() {
        let outcomes = Outcomes::new();
        for i in 0..20_000u64 {
            let ms = if i % 100 == 0 { 80 } else { 50 };
            outcomes.record_latency(Duration::from_millis(ms));
        }
        outcomes.record_latency(Duration::from_millis(1));

        let latency = outcomes.latency();
        assert!(latency.p50 >= Duration::from_millis(1));
        assert!(latency.p50 <= Duration::from_millis(80));
        assert!(latency.p99 <= Duration::from_millis(80));
        assert!(latency.p99 >= latency.p50);
    }

    #[test]
    fn test_fold_drains_pending() {
        let outcomes = Outcomes::new();
        for ms in 1..=1_000 {
            outcomes.record_latency(Duration::from_millis(ms));
        }

        outcomes.fold_latencies();
        let mut pending = 0;
        outcomes.pending.data_with(|block| pending += block.len());
        assert_eq!(pending, 0);

        // Folded samples still count towards the final quantiles.
        outcomes.record_latency(Duration::from_millis(1_000));
        let latency = outcomes.latency();
        assert!(latency.p50 > Duration::from_millis(400));
        assert!(latency.p50 < Duration::from_millis(600));
    }
}
