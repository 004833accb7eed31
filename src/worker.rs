//! Settlement worker pool
//!
//! A fixed number of tokio tasks drain the job queue; each worker owns one
//! job at a time, runs the draw engine and the ledger commit, and writes
//! exactly one terminal reply to the job's conduit. Faults inside a job are
//! caught and reported as internal errors rather than crashing the pool; a
//! worker that stops degrades capacity and is visible in the live-worker
//! gauge, and once the last worker is gone a pool-wide fault signal lets
//! waiting callers fail fast.

use crate::{
    draw::DrawEngine,
    errors::WagerError,
    ledger::Ledger,
    metrics::Metrics,
    queue::{JobReceiver, JobState, SettlementReply, WagerJob, WagerRequest},
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct WorkerPool {
    live: Arc<AtomicUsize>,
    fault_rx: watch::Receiver<bool>,
    // keeps the fault channel alive for the lifetime of the pool
    _fault_tx: Arc<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks draining `receiver`.
    pub fn spawn(
        workers: usize,
        receiver: JobReceiver,
        engine: Arc<DrawEngine>,
        ledger: Arc<dyn Ledger>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let shared = Arc::new(Mutex::new(receiver));
        let live = Arc::new(AtomicUsize::new(workers));
        let (fault_tx, fault_rx) = watch::channel(false);
        let fault_tx = Arc::new(fault_tx);
        Metrics::set_gauge(&metrics.live_workers, workers as i64);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            handles.push(tokio::spawn(run_worker(
                id,
                shared.clone(),
                engine.clone(),
                ledger.clone(),
                metrics.clone(),
                live.clone(),
                fault_tx.clone(),
            )));
        }
        info!(workers, "settlement worker pool started");

        Self {
            live,
            fault_rx,
            _fault_tx: fault_tx,
            handles,
        }
    }

    /// Number of workers still draining the queue.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Receiver that flips to `true` when the pool can no longer make
    /// progress. The admission controller selects on this while waiting.
    pub fn fault_signal(&self) -> watch::Receiver<bool> {
        self.fault_rx.clone()
    }

    /// Wait for all workers to drain and exit. Only returns once the
    /// sending half of the queue has been dropped.
    pub async fn shutdown(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(%err, "settlement worker task failed to join");
            }
        }
    }
}

async fn run_worker(
    id: usize,
    queue: Arc<Mutex<JobReceiver>>,
    engine: Arc<DrawEngine>,
    ledger: Arc<dyn Ledger>,
    metrics: Arc<Metrics>,
    live: Arc<AtomicUsize>,
    fault_tx: Arc<watch::Sender<bool>>,
) {
    debug!(worker = id, "settlement worker online");
    loop {
        // hold the receiver lock only while dequeuing
        let job = { queue.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };
        let state = process_job(id, job, &engine, &ledger, &metrics).await;
        match state {
            JobState::Committed => Metrics::incr(&metrics.wagers_settled),
            JobState::Rejected => Metrics::incr(&metrics.wagers_rejected),
            JobState::Failed => Metrics::incr(&metrics.internal_faults),
            _ => {}
        }
    }

    let remaining = live.fetch_sub(1, Ordering::SeqCst) - 1;
    Metrics::set_gauge(&metrics.live_workers, remaining as i64);
    warn!(worker = id, remaining, "settlement worker stopped");
    if remaining == 0 {
        // no workers left: release every waiting caller
        let _ = fault_tx.send(true);
    }
}

/// Run one job to its terminal state and deliver the reply.
async fn process_job(
    worker: usize,
    job: WagerJob,
    engine: &Arc<DrawEngine>,
    ledger: &Arc<dyn Ledger>,
    metrics: &Arc<Metrics>,
) -> JobState {
    let WagerJob {
        request,
        reply,
        queued_at,
    } = job;
    debug!(
        worker,
        account = %request.account,
        queued_ms = queued_at.elapsed().as_millis() as u64,
        state = JobState::Running.as_str(),
        "settling wager"
    );

    // A panic inside settlement must not take the worker down; it becomes a
    // typed internal error on the job's conduit.
    let result: SettlementReply = AssertUnwindSafe(settle_and_commit(&request, engine, ledger))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(WagerError::Internal("settlement task panicked".into())));

    let state = match &result {
        Ok(_) => JobState::Committed,
        Err(
            WagerError::InvalidSelection(_)
            | WagerError::BelowMinimumStake { .. }
            | WagerError::InsufficientFunds,
        ) => JobState::Rejected,
        Err(_) => JobState::Failed,
    };

    match &result {
        Ok(outcome) => debug!(
            worker,
            account = %request.account,
            matches = outcome.match_count,
            %outcome.profit,
            state = state.as_str(),
            "wager settled"
        ),
        Err(err) => debug!(
            worker,
            account = %request.account,
            error = %err,
            kind = err.kind(),
            state = state.as_str(),
            "wager not settled"
        ),
    }

    if reply.send(result).is_err() {
        // the caller already timed out; drop the orphaned result without
        // blocking or holding the queue slot
        Metrics::incr(&metrics.orphaned_results);
        debug!(worker, account = %request.account, "discarded orphaned settlement result");
    }
    state
}

async fn settle_and_commit(
    request: &WagerRequest,
    engine: &Arc<DrawEngine>,
    ledger: &Arc<dyn Ledger>,
) -> SettlementReply {
    let outcome = engine.settle(&request.selection, request.stake, &request.currency)?;
    ledger
        .commit(request.account, request.stake, &request.currency, &outcome)
        .await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{Draw, DrawEngine, FixedDrawSource, Selection};
    use crate::ledger::{AccountId, Ledger, MemoryLedger};
    use crate::queue::JobQueue;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Instant;
    use tokio::sync::oneshot;

    fn fixed_engine() -> Arc<DrawEngine> {
        let draw = Draw::from_numbers([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap();
        let minimums = HashMap::from([("USDT".to_string(), dec!(1.0))]);
        Arc::new(DrawEngine::new(Arc::new(FixedDrawSource(draw)), minimums))
    }

    fn submit(
        queue: &JobQueue,
        account: AccountId,
        numbers: &[u8],
        stake: rust_decimal::Decimal,
    ) -> oneshot::Receiver<SettlementReply> {
        let (tx, rx) = oneshot::channel();
        queue
            .try_enqueue(WagerJob {
                request: WagerRequest {
                    account,
                    selection: Selection::new(numbers).unwrap(),
                    stake,
                    currency: "USDT".into(),
                },
                reply: tx,
                queued_at: Instant::now(),
            })
            .unwrap();
        rx
    }

    #[tokio::test]
    async fn worker_settles_and_commits_a_win() {
        let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
        ledger.deposit(AccountId(1), dec!(100)).await.unwrap();
        let (queue, receiver) = JobQueue::bounded(4);
        let metrics = Arc::new(Metrics::new());
        let pool = WorkerPool::spawn(2, receiver, fixed_engine(), ledger.clone(), metrics.clone());

        // {1,7,13,22,31} against {1..10}: 2 matches, multiplier 1.4
        let rx = submit(&queue, AccountId(1), &[1, 7, 13, 22, 31], dec!(10));
        let outcome = rx.await.unwrap().unwrap();
        assert_eq!(outcome.profit, dec!(4.0));
        assert_eq!(ledger.balance(AccountId(1)).await.unwrap(), dec!(104));

        drop(queue);
        pool.shutdown().await;
        assert_eq!(
            metrics.wagers_settled.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn domain_errors_reach_the_conduit() {
        let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
        ledger.deposit(AccountId(1), dec!(3)).await.unwrap();
        let (queue, receiver) = JobQueue::bounded(4);
        let metrics = Arc::new(Metrics::new());
        let pool = WorkerPool::spawn(1, receiver, fixed_engine(), ledger.clone(), metrics.clone());

        // stake 5 against balance 3: the caller gets a typed error, not a hang
        let rx = submit(&queue, AccountId(1), &[1, 7, 13, 22, 31], dec!(5));
        assert_eq!(rx.await.unwrap().unwrap_err(), WagerError::InsufficientFunds);
        assert_eq!(ledger.balance(AccountId(1)).await.unwrap(), dec!(3));

        drop(queue);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn dropped_caller_does_not_block_the_worker() {
        let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
        ledger.deposit(AccountId(1), dec!(100)).await.unwrap();
        let (queue, receiver) = JobQueue::bounded(4);
        let metrics = Arc::new(Metrics::new());
        let pool = WorkerPool::spawn(1, receiver, fixed_engine(), ledger.clone(), metrics.clone());

        let rx = submit(&queue, AccountId(1), &[1, 7, 13, 22, 31], dec!(10));
        drop(rx); // caller gave up before the result arrived

        // the worker must still commit and then pick up the next job
        let rx2 = submit(&queue, AccountId(1), &[1, 7, 13, 22, 31], dec!(10));
        rx2.await.unwrap().unwrap();
        assert_eq!(ledger.balance(AccountId(1)).await.unwrap(), dec!(108));

        drop(queue);
        pool.shutdown().await;
        assert_eq!(
            metrics.orphaned_results.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn pool_signals_fault_when_all_workers_exit() {
        let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
        let (queue, receiver) = JobQueue::bounded(1);
        let metrics = Arc::new(Metrics::new());
        let pool = WorkerPool::spawn(1, receiver, fixed_engine(), ledger, metrics);
        let mut fault = pool.fault_signal();

        drop(queue); // closing the queue stops the workers
        pool.shutdown().await;
        fault.wait_for(|down| *down).await.unwrap();
    }
}
