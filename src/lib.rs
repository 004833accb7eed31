//! Keno wager settlement engine.
//!
//! Wagers enter through the [`admission::AdmissionController`], wait in a
//! bounded queue, and are settled by a fixed pool of workers that run the
//! pure [`draw::DrawEngine`] and commit atomically against the
//! [`ledger::Ledger`]. Every submission resolves to exactly one outcome:
//! a settlement, a typed rejection, or a timeout.

pub mod admission;
pub mod api;
pub mod auth;
pub mod config;
pub mod draw;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod payout;
pub mod queue;
pub mod worker;

use crate::{
    admission::AdmissionController,
    config::PoolConfig,
    draw::DrawEngine,
    ledger::Ledger,
    metrics::Metrics,
    queue::JobQueue,
    worker::WorkerPool,
};
use std::sync::Arc;

/// The wired pipeline: queue, worker pool and admission controller sharing
/// one metrics registry.
pub struct SettlementPipeline {
    admission: Arc<AdmissionController>,
    pool: WorkerPool,
    metrics: Arc<Metrics>,
}

impl SettlementPipeline {
    pub fn start(
        config: &PoolConfig,
        engine: Arc<DrawEngine>,
        ledger: Arc<dyn Ledger>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (queue, receiver) = JobQueue::bounded(config.queue_capacity);
        let pool = WorkerPool::spawn(
            config.workers,
            receiver,
            engine.clone(),
            ledger,
            metrics.clone(),
        );
        let admission = Arc::new(AdmissionController::new(
            queue,
            engine,
            config.workers,
            config.submit_timeout(),
            pool.fault_signal(),
            metrics.clone(),
        ));
        Self {
            admission,
            pool,
            metrics,
        }
    }

    pub fn admission(&self) -> Arc<AdmissionController> {
        self.admission.clone()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn live_workers(&self) -> usize {
        self.pool.live_workers()
    }

    /// Stop accepting work and wait for the workers to drain. The admission
    /// controller must be dropped by the caller first; the workers exit once
    /// the queue's sending half is gone.
    pub async fn shutdown(self) {
        let Self {
            admission, pool, ..
        } = self;
        drop(admission);
        pool.shutdown().await;
    }
}
