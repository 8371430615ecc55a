//! Simulation manager
//!
//! Process-local runtime authority for the continuous simulation. Durable
//! intent lives in the store; this type owns only what is actually
//! executing right now. All mutation goes through `start`/`stop` — there is
//! no other writer of the runtime state.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::models::OperatorRef;
use crate::sim::ledger::{ActivityEntry, ActivityKind, ActivityLedger, ActivityStatus};
use crate::sim::runner::SimulationRunner;

/// Ephemeral runtime state, reset on process start.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuntimeStatus {
    pub is_running: bool,
    pub active_operator: Option<OperatorRef>,
}

struct ActiveRun {
    operator: OperatorRef,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct SimulationManager {
    runner: Arc<dyn SimulationRunner>,
    ledger: Arc<ActivityLedger>,
    tick_interval: Duration,
    dedupe_window: Duration,
    /// Serializes start/stop transitions; held across the join in `stop`
    /// so concurrent callers observe fully settled transitions.
    run: Mutex<Option<ActiveRun>>,
    /// Snapshot for `status()`: readable at any time, even mid-transition.
    /// Shared with the run loop, which clears it when it dies.
    status: Arc<RwLock<RuntimeStatus>>,
}

impl SimulationManager {
    pub fn new(
        runner: Arc<dyn SimulationRunner>,
        ledger: Arc<ActivityLedger>,
        tick_interval: Duration,
        dedupe_window: Duration,
    ) -> Self {
        Self {
            runner,
            ledger,
            tick_interval,
            dedupe_window,
            run: Mutex::new(None),
            status: Arc::new(RwLock::new(RuntimeStatus::default())),
        }
    }

    /// Begin (or keep) running for the given operator.
    ///
    /// Idempotent for the operator already running; a run for a different
    /// operator is superseded (halted, then replaced). The first tick fires
    /// immediately rather than one interval later.
    pub async fn start(&self, operator: OperatorRef) {
        let mut run = self.run.lock().await;

        if let Some(active) = run.take() {
            if active.operator.id == operator.id {
                tracing::debug!(operator = %operator.email, "simulation already running");
                *run = Some(active);
                return;
            }
            tracing::info!(
                previous = %active.operator.email,
                next = %operator.email,
                "superseding active simulation"
            );
            halt(active).await;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.runner.clone(),
            self.ledger.clone(),
            StatusReset(self.status.clone()),
            operator.clone(),
            self.tick_interval,
            self.dedupe_window,
            shutdown_rx,
        ));

        *run = Some(ActiveRun {
            operator: operator.clone(),
            shutdown: shutdown_tx,
            handle,
        });
        *self.status.write() = RuntimeStatus {
            is_running: true,
            active_operator: Some(operator.clone()),
        };

        self.ledger.log(
            ActivityEntry::new(
                operator.id,
                ActivityKind::SystemCheck,
                "Continuous simulation activated",
            )
            .with_status(ActivityStatus::Completed),
        );

        tracing::info!(operator = %operator.email, "simulation started");
    }

    /// Stop the run owned by this operator. No-op when nothing (or a
    /// different operator's run) is active. Does not report stopped until
    /// any in-flight tick has finished.
    pub async fn stop(&self, operator_id: Uuid) {
        let mut run = self.run.lock().await;

        match run.take() {
            Some(active) if active.operator.id == operator_id => {
                halt(active).await;
                *self.status.write() = RuntimeStatus::default();
            }
            Some(active) => {
                tracing::debug!(
                    requested = %operator_id,
                    active = %active.operator.id,
                    "stop ignored, different operator active"
                );
                *run = Some(active);
            }
            None => {
                tracing::debug!(requested = %operator_id, "stop ignored, not running");
            }
        }
    }

    /// Pure read of the runtime state. Safe from concurrent callers.
    pub fn status(&self) -> RuntimeStatus {
        self.status.read().clone()
    }

    /// Process-teardown path: halt whatever is running.
    pub async fn shutdown(&self) {
        let mut run = self.run.lock().await;
        if let Some(active) = run.take() {
            halt(active).await;
        }
        *self.status.write() = RuntimeStatus::default();
    }
}

/// Signal the run loop and wait for it to drain its in-flight tick.
async fn halt(run: ActiveRun) {
    let _ = run.shutdown.send(true);
    if let Err(e) = run.handle.await {
        if e.is_panic() {
            tracing::error!(operator = %run.operator.email, "simulation loop panicked");
        }
    }
    tracing::info!(operator = %run.operator.email, "simulation stopped");
}

/// Clears the status snapshot when the run loop future is dropped, on any
/// exit path: normal break, early break, or cancellation at runtime
/// teardown. Captured in the future at spawn, so it fires even if the task
/// is never polled. `halt` joins the task before any new status write, so
/// the reset never clobbers a successor run's state.
struct StatusReset(Arc<RwLock<RuntimeStatus>>);

impl Drop for StatusReset {
    fn drop(&mut self) {
        *self.0.write() = RuntimeStatus::default();
    }
}

/// The per-operator recurring schedule. Ticks never overlap: the loop
/// awaits each tick, and a slow tick makes the interval skip, not queue.
async fn run_loop(
    runner: Arc<dyn SimulationRunner>,
    ledger: Arc<ActivityLedger>,
    _status_reset: StatusReset,
    operator: OperatorRef,
    tick_interval: Duration,
    dedupe_window: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::debug!(operator = %operator.email, "simulation loop entered");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = interval.tick() => {
                if let Some(existing) = ledger.find_recent_in_progress(operator.id, dedupe_window) {
                    tracing::debug!(
                        operator = %operator.email,
                        entry_id = %existing.id,
                        "work already in progress, skipping tick"
                    );
                    continue;
                }

                // Each tick runs as its own task so a panicking cycle is
                // contained at the join point instead of killing the loop.
                let tick_runner = runner.clone();
                let tick_operator = operator.clone();
                let joined = tokio::spawn(async move {
                    tick_runner.run_once(&tick_operator).await
                })
                .await;

                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(operator = %operator.email, error = %e, "simulation tick failed");
                    }
                    Err(e) if e.is_panic() => {
                        tracing::error!(operator = %operator.email, "simulation tick panicked");
                    }
                    // Runtime is shutting down
                    Err(_) => break,
                }
            }
        }
    }

    tracing::debug!(operator = %operator.email, "simulation loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runner with controllable latency that tracks concurrency.
    struct InstrumentedRunner {
        latency: Duration,
        runs: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail: bool,
    }

    impl InstrumentedRunner {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                latency,
                runs: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                latency,
                runs: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl SimulationRunner for InstrumentedRunner {
        async fn run_once(&self, _operator: &OperatorRef) -> AppResult<()> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            tokio::time::sleep(self.latency).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                Err(crate::error::AppError::Transient("collaborator timeout".into()))
            } else {
                Ok(())
            }
        }
    }

    fn operator(email: &str) -> OperatorRef {
        OperatorRef {
            id: Uuid::new_v4(),
            email: email.into(),
        }
    }

    fn manager(runner: Arc<InstrumentedRunner>, tick: Duration) -> SimulationManager {
        SimulationManager::new(
            runner,
            Arc::new(ActivityLedger::new(50)),
            tick,
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn start_is_idempotent_for_same_operator() {
        let runner = InstrumentedRunner::new(Duration::from_millis(30));
        let mgr = manager(runner.clone(), Duration::from_millis(20));
        let op = operator("a@example.com");

        mgr.start(op.clone()).await;
        mgr.start(op.clone()).await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        mgr.stop(op.id).await;

        // A second loop would have produced overlapping ticks
        assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(!mgr.status().is_running);
    }

    #[tokio::test]
    async fn ticks_never_overlap_under_slow_runner() {
        let runner = InstrumentedRunner::new(Duration::from_millis(50));
        let mgr = manager(runner.clone(), Duration::from_millis(10));
        let op = operator("a@example.com");

        mgr.start(op.clone()).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        mgr.stop(op.id).await;

        assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);

        // Slow ticks are skipped, never queued: far fewer runs than
        // elapsed/interval.
        let runs = runner.runs.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected at least two ticks, got {}", runs);
        assert!(runs < 15, "ticks were queued, got {}", runs);
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_tick() {
        let runner = InstrumentedRunner::new(Duration::from_millis(150));
        let mgr = manager(runner.clone(), Duration::from_secs(5));
        let op = operator("a@example.com");

        mgr.start(op.clone()).await;
        // Let the immediate tick get in flight
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runner.in_flight.load(Ordering::SeqCst), 1);

        mgr.stop(op.id).await;

        // stop() returned only after the tick drained
        assert_eq!(runner.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
        assert!(!mgr.status().is_running);
    }

    #[tokio::test]
    async fn stop_when_not_running_is_noop() {
        let runner = InstrumentedRunner::new(Duration::from_millis(10));
        let mgr = manager(runner, Duration::from_millis(50));

        mgr.stop(Uuid::new_v4()).await;
        assert!(!mgr.status().is_running);
    }

    #[tokio::test]
    async fn start_for_different_operator_supersedes() {
        let runner = InstrumentedRunner::new(Duration::from_millis(10));
        let mgr = manager(runner.clone(), Duration::from_millis(20));
        let first = operator("first@example.com");
        let second = operator("second@example.com");

        mgr.start(first.clone()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        mgr.start(second.clone()).await;

        let status = mgr.status();
        assert!(status.is_running);
        assert_eq!(
            status.active_operator.as_ref().map(|o| o.id),
            Some(second.id)
        );

        // Only one loop alive after superseding
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);

        mgr.shutdown().await;
        assert!(!mgr.status().is_running);
    }

    #[test]
    fn status_clears_when_runtime_tears_down() {
        let runner = InstrumentedRunner::new(Duration::from_secs(5));
        let mgr = manager(runner, Duration::from_millis(10));

        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(mgr.start(operator("a@example.com")));
        assert!(mgr.status().is_running);

        // Tearing the runtime down cancels the loop without `stop` ever
        // being called; the snapshot must not keep reporting a live run.
        rt.shutdown_timeout(Duration::from_millis(200));
        assert!(!mgr.status().is_running);
    }

    #[tokio::test]
    async fn failing_ticks_do_not_stop_the_schedule() {
        let runner = InstrumentedRunner::failing(Duration::from_millis(5));
        let mgr = manager(runner.clone(), Duration::from_millis(20));
        let op = operator("a@example.com");

        mgr.start(op.clone()).await;
        tokio::time::sleep(Duration::from_millis(110)).await;
        mgr.stop(op.id).await;

        assert!(runner.runs.load(Ordering::SeqCst) >= 3);
    }
}
