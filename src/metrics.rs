//! Settlement pipeline metrics
//!
//! Atomic counters and gauges with a Prometheus text exposition, served at
//! `/metrics`.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    /// Wagers that reached a committed outcome.
    pub wagers_settled: AtomicU64,
    /// Wagers rejected by validation or the ledger (typed domain errors).
    pub wagers_rejected: AtomicU64,
    /// Submissions refused at admission for capacity.
    pub capacity_rejections: AtomicU64,
    /// Callers released by the submit timeout.
    pub wager_timeouts: AtomicU64,
    /// Worker-boundary faults reported as internal errors.
    pub internal_faults: AtomicU64,
    /// Late results discarded because the caller was gone.
    pub orphaned_results: AtomicU64,

    /// Jobs currently admitted (queued or executing).
    pub in_flight: AtomicI64,
    /// Current queue depth.
    pub queue_depth: AtomicI64,
    /// Workers still draining the queue.
    pub live_workers: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_gauge(gauge: &AtomicI64, value: i64) {
        gauge.store(value, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format (version 0.0.4).
    pub fn to_prometheus_format(&self) -> String {
        let mut out = String::with_capacity(1024);
        let counters: [(&str, &AtomicU64); 6] = [
            ("kenoq_wagers_settled_total", &self.wagers_settled),
            ("kenoq_wagers_rejected_total", &self.wagers_rejected),
            ("kenoq_capacity_rejections_total", &self.capacity_rejections),
            ("kenoq_wager_timeouts_total", &self.wager_timeouts),
            ("kenoq_internal_faults_total", &self.internal_faults),
            ("kenoq_orphaned_results_total", &self.orphaned_results),
        ];
        for (name, value) in counters {
            out.push_str(&format!("# TYPE {} counter\n", name));
            out.push_str(&format!("{} {}\n", name, value.load(Ordering::Relaxed)));
        }
        let gauges: [(&str, &AtomicI64); 3] = [
            ("kenoq_jobs_in_flight", &self.in_flight),
            ("kenoq_queue_depth", &self.queue_depth),
            ("kenoq_live_workers", &self.live_workers),
        ];
        for (name, value) in gauges {
            out.push_str(&format!("# TYPE {} gauge\n", name));
            out.push_str(&format!("{} {}\n", name, value.load(Ordering::Relaxed)));
        }
        out
    }
}
