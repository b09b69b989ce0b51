//! Periodic aggregation jobs.
//!
//! Each schedule is one ticker task. A tick spawns its request instead of
//! awaiting it, so an unanswered tick never delays the next one; a failed
//! tick is logged and the schedule keeps going. Cancelling aborts the ticker
//! only — a tick already in flight resolves or times out on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

use super::correlation::DEFAULT_REQUEST_TIMEOUT;
use super::AggregationEngine;
use crate::level::Level;
use crate::message::DataTransfer;

/// Callback invoked with each successful periodic aggregate.
pub type AggregationHandler = Arc<dyn Fn(DataTransfer) + Send + Sync>;

impl AggregationEngine {
    /// Run `handler` with a fresh aggregate of `data_type` from
    /// `target_level` every `interval`.
    ///
    /// The first tick fires one full interval after scheduling.
    pub fn schedule_periodic_aggregation(
        &self,
        data_type: impl Into<String>,
        target_level: Level,
        interval: Duration,
        handler: AggregationHandler,
    ) -> String {
        let schedule_id = Uuid::new_v4().to_string();
        let data_type = data_type.into();
        // Weak so a forgotten schedule does not keep the engine alive.
        let engine = self.weak_ref();
        let task_id = schedule_id.clone();
        let task_type = data_type.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; swallow that so ticks land at
            // interval boundaries.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                let schedule_id = task_id.clone();
                let data_type = task_type.clone();
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let result = engine
                        .request_and_aggregate_data(
                            &data_type,
                            None,
                            target_level,
                            &[],
                            DEFAULT_REQUEST_TIMEOUT,
                        )
                        .await;
                    match result {
                        Ok(transfer) => handler(transfer),
                        Err(e) => warn!(
                            schedule_id = %schedule_id,
                            data_type = %data_type,
                            error = %e,
                            "scheduled aggregation tick failed"
                        ),
                    }
                });
            }
        });

        self.schedules.insert(schedule_id.clone(), handle);
        info!(
            schedule_id = %schedule_id,
            data_type = %data_type,
            target_level = %target_level,
            interval_ms = interval.as_millis() as u64,
            "scheduled periodic aggregation"
        );
        schedule_id
    }

    /// Cancel a schedule. Returns true iff the job existed.
    pub fn cancel_periodic_aggregation(&self, schedule_id: &str) -> bool {
        match self.schedules.remove(schedule_id) {
            Some((_, handle)) => {
                handle.abort();
                info!(schedule_id, "cancelled periodic aggregation");
                true
            }
            None => false,
        }
    }
}
