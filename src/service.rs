//! Simulation service facade
//!
//! The contract the surrounding web layer calls. Explicitly constructed and
//! passed by reference; no module-level state.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::feedback::{FeedbackAggregator, LearningExample};
use crate::models::{FeedbackJudgment, FeedbackRecord, OperatorRef};
use crate::sim::ledger::{ActivityEntry, ActivityLedger};
use crate::sim::manager::SimulationManager;
use crate::store::ControlStore;

/// Operator-facing view: durable intent plus what is actually executing.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatus {
    pub continuous_active: bool,
    pub is_running: bool,
    pub activated_by: Option<OperatorRef>,
}

pub struct SimulationService {
    store: Arc<dyn ControlStore>,
    manager: Arc<SimulationManager>,
    ledger: Arc<ActivityLedger>,
    aggregator: FeedbackAggregator,
}

impl SimulationService {
    pub fn new(
        store: Arc<dyn ControlStore>,
        manager: Arc<SimulationManager>,
        ledger: Arc<ActivityLedger>,
    ) -> Self {
        let aggregator = FeedbackAggregator::new(store.clone());
        Self {
            store,
            manager,
            ledger,
            aggregator,
        }
    }

    /// Write desired state, then drive the manager synchronously so the
    /// caller observes the effect immediately instead of waiting for the
    /// next reconciliation poll.
    pub async fn toggle(&self, operator: OperatorRef, active: bool) -> AppResult<SimulationStatus> {
        self.store.set_desired_state(operator.id, active).await?;

        if active {
            self.manager.start(operator).await;
        } else {
            self.manager.stop(operator.id).await;
        }

        Ok(self.status().await)
    }

    /// Best-effort status: a transient store failure degrades to the
    /// last-known runtime state rather than erroring.
    pub async fn status(&self) -> SimulationStatus {
        let runtime = self.manager.status();

        match self.store.find_active_operator().await {
            // `activated_by` reports who holds the durable flag; a run
            // still draining after the flag cleared is not attributed.
            Ok(desired) => SimulationStatus {
                continuous_active: desired.is_some(),
                is_running: runtime.is_running,
                activated_by: desired,
            },
            Err(e) => {
                tracing::warn!(error = %e, "desired-state read failed, reporting runtime state");
                SimulationStatus {
                    continuous_active: runtime.is_running,
                    is_running: runtime.is_running,
                    activated_by: runtime.active_operator,
                }
            }
        }
    }

    /// Analyst judgment on a past prediction. `NotFound` propagates.
    pub async fn submit_feedback(
        &self,
        alert_id: Uuid,
        judgment: FeedbackJudgment,
    ) -> AppResult<FeedbackRecord> {
        self.aggregator.submit(alert_id, judgment).await
    }

    pub async fn get_learning_examples(
        &self,
        limit: i64,
        only_accurate: bool,
    ) -> AppResult<Vec<LearningExample>> {
        self.aggregator
            .build_learning_examples(limit, only_accurate)
            .await
    }

    /// Recent activity trail for an operator, newest first.
    pub fn recent_activity(&self, operator_id: Uuid, limit: usize) -> Vec<ActivityEntry> {
        self.ledger.query_by_operator(operator_id, limit)
    }
}
