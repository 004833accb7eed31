//! Bounded wager job queue
//!
//! First-in-first-out intake between the admission path and the worker pool.
//! Enqueue is non-blocking and fails fast when the queue is at capacity;
//! admitted jobs are never dropped. Each job carries a single-use reply
//! conduit back to the caller that submitted it.

use crate::{
    draw::{Selection, SettlementOutcome},
    errors::WagerError,
    ledger::AccountId,
};
use rust_decimal::Decimal;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// One validated wager waiting to be settled.
#[derive(Debug, Clone)]
pub struct WagerRequest {
    pub account: AccountId,
    pub selection: Selection,
    pub stake: Decimal,
    pub currency: String,
}

/// The exactly-once terminal reply delivered for every accepted job.
pub type SettlementReply = Result<SettlementOutcome, WagerError>;

/// Per-job lifecycle, recorded for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Committed,
    Rejected,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Committed => "committed",
            JobState::Rejected => "rejected",
            JobState::Failed => "failed",
        }
    }
}

pub struct WagerJob {
    pub request: WagerRequest,
    /// One writer (the worker), one reader (the submitting caller). If the
    /// caller timed out and dropped its end, sending fails without blocking
    /// and the result is discarded.
    pub reply: oneshot::Sender<SettlementReply>,
    pub queued_at: Instant,
}

/// Sending half of the queue, held by the admission controller.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<WagerJob>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

/// Receiving half, shared by the workers through a mutex so each job is
/// taken by exactly one worker.
pub struct JobReceiver {
    rx: mpsc::Receiver<WagerJob>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    pub fn bounded(capacity: usize) -> (JobQueue, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let depth = Arc::new(AtomicUsize::new(0));
        (
            JobQueue {
                tx,
                depth: depth.clone(),
                capacity,
            },
            JobReceiver { rx, depth },
        )
    }

    /// Non-blocking enqueue. `CapacityExceeded` when the queue is full; a
    /// job that enqueues successfully is guaranteed to reach a worker while
    /// any worker is alive.
    pub fn try_enqueue(&self, job: WagerJob) -> Result<(), WagerError> {
        match self.tx.try_send(job) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(WagerError::CapacityExceeded),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(WagerError::Internal("settlement queue closed".into()))
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl JobReceiver {
    /// Await the next job in FIFO order. Returns `None` once the queue is
    /// closed and drained.
    pub async fn recv(&mut self) -> Option<WagerJob> {
        let job = self.rx.recv().await;
        if job.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        job
    }
}
