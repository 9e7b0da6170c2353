//! Health cycle orchestration and the optional in-process trigger.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::notify::{DispatchMode, DispatchReport, Dispatcher};
use crate::probe::Aggregator;
use crate::store::{HistoryStore, ProbeBatch};

/// Summary of one triggered health cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub batch: ProbeBatch,
    /// `None` when every endpoint was healthy and nothing was dispatched.
    pub dispatch: Option<DispatchReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleCounts {
    pub checked: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

impl CycleReport {
    pub fn counts(&self) -> CycleCounts {
        let checked = self.batch.results.len();
        let healthy = self.batch.healthy_count();
        CycleCounts {
            checked,
            healthy,
            unhealthy: checked - healthy,
        }
    }
}

/// Ties the aggregator, history store and dispatcher together.
#[derive(Debug, Clone)]
pub struct Monitor {
    aggregator: Aggregator,
    history: HistoryStore,
    dispatcher: Dispatcher,
}

impl Monitor {
    pub fn new(aggregator: Aggregator, history: HistoryStore, dispatcher: Dispatcher) -> Self {
        Self {
            aggregator,
            history,
            dispatcher,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Probe and record, without notifying.
    pub async fn check_now(&self) -> ProbeBatch {
        let batch = self.aggregator.run_cycle().await;
        self.history.record_batch(batch.clone());
        batch
    }

    /// Probe, record, and alert every enabled channel if anything failed.
    pub async fn run_health_cycle(&self) -> CycleReport {
        let batch = self.check_now().await;

        let failing = batch.failing().len();
        let dispatch = if failing > 0 {
            tracing::warn!("{} endpoint(s) failing, sending notifications", failing);
            Some(self.dispatcher.dispatch(&batch, DispatchMode::Normal).await)
        } else {
            tracing::info!("All endpoints healthy");
            None
        };

        CycleReport { batch, dispatch }
    }
}

/// Runs the health cycle on a fixed interval until stopped.
pub struct Scheduler {
    monitor: Arc<Monitor>,
    interval: Duration,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, interval: Duration) -> Self {
        Self {
            monitor,
            interval,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background loop. The first cycle runs immediately.
    pub async fn start(&self) {
        let (tx, mut rx) = broadcast::channel(1);
        {
            let mut stop = self.stop.lock().await;
            if stop.is_some() {
                return; // Already running
            }
            *stop = Some(tx);
        }

        tracing::info!("Scheduler: running health checks every {:?}", self.interval);

        let monitor = self.monitor.clone();
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        monitor.run_health_cycle().await;
                    }
                }
            }
            tracing::info!("Scheduler: stopped");
        });
    }

    /// Stop the background loop.
    pub async fn stop(&self) {
        if let Some(tx) = self.stop.lock().await.take() {
            let _ = tx.send(());
        }
    }
}
