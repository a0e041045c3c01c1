//! Evaluation Scheduler
//!
//! Fixed worker pool fed by a dispatcher over an mpsc queue. The dispatcher
//! enqueues every tracked token on a fixed cadence; mempool preemptions jump
//! the queue via a biased select. One token's evaluation error never stops
//! the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;

use crate::application::monitor::ProtectionMonitor;
use crate::domain::token::TokenKey;

const JOB_QUEUE_DEPTH: usize = 256;
const PREEMPT_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of evaluation workers
    pub workers: usize,
    /// Cadence between full evaluation sweeps
    pub evaluation_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            evaluation_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug)]
struct Job {
    key: TokenKey,
    preempted: bool,
}

pub struct Scheduler {
    monitor: Arc<ProtectionMonitor>,
    config: SchedulerConfig,
    preempt_tx: mpsc::Sender<TokenKey>,
    preempt_rx: Mutex<Option<mpsc::Receiver<TokenKey>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(monitor: Arc<ProtectionMonitor>, config: SchedulerConfig) -> Self {
        let (preempt_tx, preempt_rx) = mpsc::channel(PREEMPT_QUEUE_DEPTH);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            monitor,
            config,
            preempt_tx,
            preempt_rx: Mutex::new(Some(preempt_rx)),
            shutdown_tx,
        }
    }

    /// Handle the mempool watcher uses to request an immediate evaluation.
    pub fn preempt_sender(&self) -> mpsc::Sender<TokenKey> {
        self.preempt_tx.clone()
    }

    /// Signal the run loop to drain and return.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run dispatcher and workers until [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        let mut preempt_rx = match self.preempt_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                tracing::error!("scheduler already running");
                return;
            }
        };

        let (job_tx, job_rx) = mpsc::channel::<Job>(JOB_QUEUE_DEPTH);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers.max(1) {
            let monitor = self.monitor.clone();
            let job_rx = job_rx.clone();
            workers.spawn(async move {
                loop {
                    let job = { job_rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    match monitor.evaluate(&job.key).await {
                        Ok(outcome) => {
                            tracing::trace!(
                                worker_id,
                                token = %job.key,
                                preempted = job.preempted,
                                ?outcome,
                                "evaluation done"
                            );
                        }
                        Err(e) => {
                            // Isolated: one token's failure never stops the pool.
                            tracing::error!(worker_id, token = %job.key, error = %e, "evaluation error");
                        }
                    }
                }
                tracing::debug!(worker_id, "worker stopped");
            });
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.evaluation_interval,
            self.config.evaluation_interval,
        );
        tracing::info!(
            workers = self.config.workers,
            interval_ms = self.config.evaluation_interval.as_millis() as u64,
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,

                // Preemptions outrank the sweep.
                Some(key) = preempt_rx.recv() => {
                    if job_tx.send(Job { key, preempted: true }).await.is_err() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    for key in self.monitor.tracked_keys().await {
                        if job_tx.send(Job { key, preempted: false }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        // Closing the queue drains the workers.
        drop(job_tx);
        while workers.join_next().await.is_some() {}
        tracing::info!("scheduler stopped");
    }
}
