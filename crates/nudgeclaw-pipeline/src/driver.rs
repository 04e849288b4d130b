//! The tick driver: collects due notifications and feeds them through the
//! orchestrator, one at a time. Uses tokio::interval for zero-overhead
//! ticking (sleeps between checks).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use nudgeclaw_scheduler::SchedulerEngine;

use crate::orchestrator::PipelineOrchestrator;

pub struct Driver {
    engine: Arc<Mutex<SchedulerEngine>>,
    orchestrator: Arc<PipelineOrchestrator>,
    max_per_tick: usize,
}

impl Driver {
    pub fn new(
        engine: Arc<Mutex<SchedulerEngine>>,
        orchestrator: Arc<PipelineOrchestrator>,
        max_per_tick: usize,
    ) -> Self {
        Self {
            engine,
            orchestrator,
            max_per_tick,
        }
    }

    /// One pass: pick up everything due, process sequentially.
    ///
    /// Returns the number of notifications processed. Per-notification
    /// errors are logged and skipped — a bad notification never takes the
    /// loop down with it.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let ready = {
            let mut engine = self.engine.lock().await;
            engine.collect_ready(self.max_per_tick, now).await
        };
        if ready.is_empty() {
            return 0;
        }
        tracing::debug!("⏰ Tick: {} notification(s) due", ready.len());

        let mut processed = 0;
        for notification in ready {
            match self.orchestrator.process(&notification, now).await {
                Ok(status) => {
                    tracing::debug!("Run for {} finished {:?}", notification.id, status);
                    processed += 1;
                }
                Err(e) => {
                    tracing::error!("❌ Pipeline error for {}: {e}", notification.id);
                }
            }
        }
        processed
    }
}

/// Run the driver forever on a fixed interval.
pub async fn spawn_driver(driver: Arc<Driver>, tick_secs: u64) {
    tracing::info!("⏰ Reminder driver started (tick every {tick_secs}s)");

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs));
    loop {
        interval.tick().await;
        let processed = driver.tick(Utc::now()).await;
        if processed > 0 {
            tracing::info!("📨 Tick processed {processed} notification(s)");
        }
    }
}
