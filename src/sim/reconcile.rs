//! Reconciliation loop
//!
//! Converges the process-local runtime onto the durable desired-state flag.
//! One immediate pass at boot resumes a previously-active simulation after
//! a restart; after that, fixed-period polls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sim::manager::SimulationManager;
use crate::store::ControlStore;

pub struct Reconciler {
    store: Arc<dyn ControlStore>,
    manager: Arc<SimulationManager>,
    poll_interval: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ControlStore>,
        manager: Arc<SimulationManager>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            manager,
            poll_interval,
        }
    }

    /// One poll-and-converge pass. A failed poll is no observed change:
    /// a running simulation is never stopped on a transient read failure.
    pub async fn reconcile_once(&self) {
        let desired = match self.store.find_active_operator().await {
            Ok(desired) => desired,
            Err(e) => {
                tracing::warn!(error = %e, "desired-state poll failed, no observed change");
                return;
            }
        };

        let runtime = self.manager.status();

        match (desired, runtime.active_operator) {
            (Some(desired_op), Some(active)) if active.id == desired_op.id => {
                // Converged-Active
            }
            (Some(desired_op), _) => {
                tracing::info!(operator = %desired_op.email, "desired active, converging");
                self.manager.start(desired_op).await;
            }
            (None, Some(active)) => {
                tracing::info!(operator = %active.email, "desired inactive, converging");
                self.manager.stop(active.id).await;
            }
            (None, None) => {
                // Converged-Inactive
            }
        }
    }

    /// Spawn the loop. The first pass runs immediately (restore on boot).
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                poll_secs = self.poll_interval.as_secs(),
                "reconciliation loop started"
            );

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => self.reconcile_once().await,
                }
            }

            tracing::info!("reconciliation loop stopped");
        });

        ReconcilerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::models::{
        Alert, CreateAlert, CreateShipmentEvent, FeedbackJudgment, FeedbackRecord, OperatorRef,
        ShipmentEvent,
    };
    use crate::sim::ledger::ActivityLedger;
    use crate::sim::runner::SimulationRunner;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    /// Store exposing only the desired-state read, with a failure switch.
    #[derive(Default)]
    struct DesiredStateStore {
        desired: Mutex<Option<OperatorRef>>,
        unreachable: AtomicBool,
    }

    #[async_trait]
    impl ControlStore for DesiredStateStore {
        async fn find_active_operator(&self) -> AppResult<Option<OperatorRef>> {
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(AppError::Transient("store unreachable".into()));
            }
            Ok(self.desired.lock().clone())
        }

        async fn set_desired_state(&self, operator_id: Uuid, active: bool) -> AppResult<()> {
            let mut desired = self.desired.lock();
            if active {
                *desired = Some(OperatorRef {
                    id: operator_id,
                    email: format!("{}@example.com", operator_id),
                });
            } else if desired.as_ref().map(|o| o.id) == Some(operator_id) {
                *desired = None;
            }
            Ok(())
        }

        async fn insert_shipment(&self, _event: &CreateShipmentEvent) -> AppResult<ShipmentEvent> {
            unimplemented!("not used by reconciler tests")
        }

        async fn insert_alert(&self, _alert: &CreateAlert) -> AppResult<Alert> {
            unimplemented!("not used by reconciler tests")
        }

        async fn find_alert(&self, _id: Uuid) -> AppResult<Option<Alert>> {
            Ok(None)
        }

        async fn find_shipment(&self, _id: Uuid) -> AppResult<Option<ShipmentEvent>> {
            Ok(None)
        }

        async fn upsert_feedback(
            &self,
            _alert_id: Uuid,
            _judgment: &FeedbackJudgment,
            _ai_risk_score: f32,
            _ai_attack_type: Option<&str>,
            _shipment_context: &str,
        ) -> AppResult<FeedbackRecord> {
            unimplemented!("not used by reconciler tests")
        }

        async fn query_feedback(
            &self,
            _limit: i64,
            _only_accurate: bool,
        ) -> AppResult<Vec<FeedbackRecord>> {
            Ok(Vec::new())
        }
    }

    struct NoopRunner;

    #[async_trait]
    impl SimulationRunner for NoopRunner {
        async fn run_once(&self, _operator: &OperatorRef) -> AppResult<()> {
            Ok(())
        }
    }

    fn setup() -> (Arc<DesiredStateStore>, Arc<SimulationManager>, Reconciler) {
        let store = Arc::new(DesiredStateStore::default());
        let manager = Arc::new(SimulationManager::new(
            Arc::new(NoopRunner),
            Arc::new(ActivityLedger::new(50)),
            Duration::from_millis(50),
            Duration::from_secs(10),
        ));
        let reconciler = Reconciler::new(
            store.clone(),
            manager.clone(),
            Duration::from_millis(20),
        );
        (store, manager, reconciler)
    }

    #[tokio::test]
    async fn converges_to_desired_active() {
        let (store, manager, reconciler) = setup();
        let op = Uuid::new_v4();

        store.set_desired_state(op, true).await.unwrap();
        reconciler.reconcile_once().await;

        let status = manager.status();
        assert!(status.is_running);
        assert_eq!(status.active_operator.map(|o| o.id), Some(op));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn converges_to_desired_inactive() {
        let (store, manager, reconciler) = setup();
        let op = Uuid::new_v4();

        store.set_desired_state(op, true).await.unwrap();
        reconciler.reconcile_once().await;
        assert!(manager.status().is_running);

        store.set_desired_state(op, false).await.unwrap();
        reconciler.reconcile_once().await;
        assert!(!manager.status().is_running);
    }

    #[tokio::test]
    async fn converged_poll_is_noop() {
        let (store, manager, reconciler) = setup();
        let op = Uuid::new_v4();

        store.set_desired_state(op, true).await.unwrap();
        reconciler.reconcile_once().await;
        reconciler.reconcile_once().await;
        reconciler.reconcile_once().await;

        let status = manager.status();
        assert!(status.is_running);
        assert_eq!(status.active_operator.map(|o| o.id), Some(op));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn transient_poll_failure_does_not_stop_running_simulation() {
        let (store, manager, reconciler) = setup();
        let op = Uuid::new_v4();

        store.set_desired_state(op, true).await.unwrap();
        reconciler.reconcile_once().await;
        assert!(manager.status().is_running);

        store.unreachable.store(true, Ordering::SeqCst);
        reconciler.reconcile_once().await;

        // Availability over immediate convergence
        assert!(manager.status().is_running);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn boot_pass_resumes_previously_active_operator() {
        let (store, manager, reconciler) = setup();
        let op = Uuid::new_v4();

        // Desired state survived the "restart"; runtime state did not.
        store.set_desired_state(op, true).await.unwrap();
        assert!(!manager.status().is_running);

        let handle = reconciler.spawn();

        // Within one poll interval the loop observes and converges
        tokio::time::sleep(Duration::from_millis(60)).await;
        let status = manager.status();
        assert!(status.is_running);
        assert_eq!(status.active_operator.map(|o| o.id), Some(op));

        handle.stop().await;
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn supersedes_when_desired_operator_changes() {
        let (store, manager, reconciler) = setup();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store.set_desired_state(first, true).await.unwrap();
        reconciler.reconcile_once().await;
        assert_eq!(manager.status().active_operator.map(|o| o.id), Some(first));

        store.set_desired_state(second, true).await.unwrap();
        reconciler.reconcile_once().await;
        assert_eq!(manager.status().active_operator.map(|o| o.id), Some(second));

        manager.shutdown().await;
    }
}
