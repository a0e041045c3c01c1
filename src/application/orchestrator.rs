//! Protection Orchestrator
//!
//! Owns the long-running pieces of the service: the evaluation scheduler
//! and, when configured, the mempool watcher. `run` blocks until `stop`.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::adapters::mempool::MempoolWatcher;
use crate::application::monitor::{ProtectionMonitor, TokenStatus};
use crate::application::scheduler::Scheduler;

pub struct ProtectionOrchestrator {
    monitor: Arc<ProtectionMonitor>,
    scheduler: Arc<Scheduler>,
    mempool: Option<Arc<MempoolWatcher>>,
    is_running: Arc<RwLock<bool>>,
}

impl ProtectionOrchestrator {
    pub fn new(
        monitor: Arc<ProtectionMonitor>,
        scheduler: Arc<Scheduler>,
        mempool: Option<Arc<MempoolWatcher>>,
    ) -> Self {
        Self {
            monitor,
            scheduler,
            mempool,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn monitor(&self) -> &Arc<ProtectionMonitor> {
        &self.monitor
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Status snapshot of every tracked token.
    pub async fn status(&self) -> Vec<TokenStatus> {
        self.monitor.status().await
    }

    /// Run the scheduler (and the mempool watcher when configured) until
    /// [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        *self.is_running.write().await = true;
        tracing::info!(
            mempool = self.mempool.is_some(),
            "protection orchestrator started"
        );

        let watcher_task = self.mempool.clone().map(|watcher| {
            tokio::spawn(async move { watcher.run().await })
        });

        self.scheduler.run().await;

        if let Some(watcher) = &self.mempool {
            watcher.stop();
        }
        if let Some(task) = watcher_task {
            let _ = task.await;
        }

        *self.is_running.write().await = false;
        tracing::info!("protection orchestrator stopped");
    }

    /// Signal the run loop to drain and return.
    pub fn stop(&self) {
        self.scheduler.stop();
        if let Some(watcher) = &self.mempool {
            watcher.stop();
        }
    }
}
