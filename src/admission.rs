//! Admission controller: the caller-facing boundary of the pipeline
//!
//! Validates cheaply before touching the queue, applies backpressure through
//! a single authoritative in-flight counter, and guarantees exactly one
//! response per submission: the settlement reply, a timeout, or a pool
//! fault. The counter is advanced with an atomic check-and-increment, so
//! there is no window in which more jobs are admitted than the queue and
//! workers can bound.

use crate::{
    draw::DrawEngine,
    errors::WagerError,
    metrics::Metrics,
    queue::{JobQueue, SettlementReply, WagerJob, WagerRequest},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tracing::warn;

pub struct AdmissionController {
    queue: JobQueue,
    engine: Arc<DrawEngine>,
    in_flight: Arc<AtomicUsize>,
    /// queue capacity + worker count: every admitted job is either waiting
    /// in the queue or held by a worker.
    limit: usize,
    timeout: Duration,
    fault: watch::Receiver<bool>,
    metrics: Arc<Metrics>,
}

impl AdmissionController {
    pub fn new(
        queue: JobQueue,
        engine: Arc<DrawEngine>,
        workers: usize,
        timeout: Duration,
        fault: watch::Receiver<bool>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let limit = queue.capacity() + workers;
        Self {
            queue,
            engine,
            in_flight: Arc::new(AtomicUsize::new(0)),
            limit,
            timeout,
            fault,
            metrics,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Submit one wager and wait for its terminal response.
    ///
    /// Every return path resolves to exactly one outcome; a caller released
    /// by the timeout never also observes a late success.
    pub async fn submit(&self, request: WagerRequest) -> SettlementReply {
        // cheap rejection path: the selection was validated at construction,
        // the stake is checked here, and neither touches the queue
        self.engine
            .validate_stake(request.stake, &request.currency)?;

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, self.limit) else {
            Metrics::incr(&self.metrics.capacity_rejections);
            return Err(WagerError::CapacityExceeded);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if let Err(err) = self.queue.try_enqueue(WagerJob {
            request,
            reply: reply_tx,
            queued_at: Instant::now(),
        }) {
            if err == WagerError::CapacityExceeded {
                Metrics::incr(&self.metrics.capacity_rejections);
            }
            return Err(err);
        }
        Metrics::set_gauge(&self.metrics.queue_depth, self.queue.depth() as i64);
        Metrics::set_gauge(&self.metrics.in_flight, self.in_flight() as i64);

        let mut fault = self.fault.clone();
        let reply = tokio::select! {
            reply = reply_rx => match reply {
                Ok(reply) => reply,
                // the worker dropped the conduit without writing; treated as
                // an internal fault, never silence
                Err(_) => Err(WagerError::Internal(
                    "settlement worker dropped the job".into(),
                )),
            },
            _ = tokio::time::sleep(self.timeout) => {
                Metrics::incr(&self.metrics.wager_timeouts);
                warn!(timeout_ms = self.timeout.as_millis() as u64, "wager submission timed out");
                Err(WagerError::Timeout)
            }
            _ = fault.wait_for(|down| *down) => {
                Err(WagerError::Internal("settlement pool unavailable".into()))
            }
        };
        // _guard drops here on every path, reverting the in-flight counter;
        // a worker finishing the orphaned job later finds no reader and
        // discards the result
        reply
    }
}

/// Slot in the in-flight budget, released on drop.
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    /// Atomic check-and-increment: succeeds only while the counter is below
    /// `limit`. A plain load-compare-store pair would admit two callers
    /// through the same last slot.
    fn acquire(counter: &'a AtomicUsize, limit: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .ok()
            .map(|_| InFlightGuard { counter })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
