/*
[INPUT]:  Operator intents, remote OrderStore / StageTimeStore / AuthProvider
[OUTPUT]: Timer transitions committed locally, then mirrored remotely
[POS]:    Engine orchestration - start/pause/resume/stop/complete protocol
[UPDATE]: When the stage protocol or remote failure handling changes
*/

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mmr_backend::{
    AuthProvider, BackendError, IncidentCategory, ManufacturingOrder, OrderStage, OrderStore,
    OrderTimes, Stage, StageTimeStore,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Result, TrackerError};
use crate::state::TimerPersistence;
use crate::task_state::{StopOutcome, TaskState, TaskStateStore, TimerPhase, Transition};
use crate::ticker::{DEFAULT_TICK_INTERVAL, SharedStore, TickDriver};

/// How often and how patiently a remote write is attempted before queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOptions {
    pub tick_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

/// A remote write that failed after its local counterpart was committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    StageTime {
        order_id: String,
        stage: Stage,
        millis: i64,
    },
    OrderStage {
        order_id: String,
        stage: OrderStage,
        has_incidents: Option<bool>,
        description: Option<String>,
    },
}

impl PendingWrite {
    pub fn order_id(&self) -> &str {
        match self {
            PendingWrite::StageTime { order_id, .. } | PendingWrite::OrderStage { order_id, .. } => {
                order_id
            }
        }
    }

    fn supersedes(&self, other: &PendingWrite) -> bool {
        match (self, other) {
            (
                PendingWrite::StageTime {
                    order_id: a,
                    stage: sa,
                    ..
                },
                PendingWrite::StageTime {
                    order_id: b,
                    stage: sb,
                    ..
                },
            ) => a == b && sa == sb,
            (
                PendingWrite::OrderStage { order_id: a, .. },
                PendingWrite::OrderStage { order_id: b, .. },
            ) => a == b,
            _ => false,
        }
    }

    async fn issue(
        &self,
        orders: &dyn OrderStore,
        stage_times: &dyn StageTimeStore,
    ) -> mmr_backend::Result<()> {
        match self {
            PendingWrite::StageTime {
                order_id,
                stage,
                millis,
            } => stage_times.save_stage_time(order_id, *stage, *millis).await,
            PendingWrite::OrderStage {
                order_id,
                stage,
                has_incidents,
                description,
            } => {
                orders
                    .update_order_stage(order_id, *stage, *has_incidents, description.as_deref())
                    .await
            }
        }
    }
}

/// Whether the remote side has the latest committed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Saved,
    /// Kept locally and queued; `retry_pending` re-issues it.
    Pending { reason: String },
}

impl RemoteStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, RemoteStatus::Saved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopResult {
    Committed { millis: i64, remote: RemoteStatus },
    AlreadyCompleted,
    /// The timer was never started.
    NotStarted,
}

/// What the operator reports once the timer is stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReport {
    /// Order with a manufacturing number, something went wrong
    Incidents {
        categories: Vec<IncidentCategory>,
        notes: String,
    },
    /// Order with a manufacturing number, nothing to report
    NoIncidents,
    /// Ad-hoc task: what was done
    Description(String),
}

impl CompletionReport {
    /// Map to the `(has_incidents, description)` pair stored on the order.
    pub fn into_fields(self) -> Result<(Option<bool>, Option<String>)> {
        match self {
            CompletionReport::NoIncidents => Ok((Some(false), None)),
            CompletionReport::Incidents { categories, notes } => {
                let notes = notes.trim();
                if categories.is_empty() && notes.is_empty() {
                    return Err(TrackerError::InvalidInput(
                        "describe the incident or pick a category".to_string(),
                    ));
                }
                let description = if categories.is_empty() {
                    notes.to_string()
                } else {
                    let labels = categories
                        .iter()
                        .map(IncidentCategory::label)
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("[{labels}] {notes}").trim_end().to_string()
                };
                Ok((Some(true), Some(description)))
            }
            CompletionReport::Description(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(TrackerError::InvalidInput(
                        "task description must not be empty".to_string(),
                    ));
                }
                Ok((None, Some(text.to_string())))
            }
        }
    }
}

/// Orders and their aggregated stage times, newest order first.
#[derive(Debug, Clone, Default)]
pub struct OrderListing {
    pub orders: Vec<ManufacturingOrder>,
    pub times: HashMap<String, OrderTimes>,
}

impl OrderListing {
    pub fn times_for(&self, order_id: &str) -> Option<&OrderTimes> {
        self.times.get(order_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryReport {
    pub flushed: usize,
    pub remaining: usize,
}

/// Couples the local timer store to the remote order and stage time stores.
pub struct StageCoordinator {
    orders: Arc<dyn OrderStore>,
    stage_times: Arc<dyn StageTimeStore>,
    store: SharedStore,
    persistence: TimerPersistence,
    clock: Arc<dyn Clock>,
    driver: TickDriver,
    pending: VecDeque<PendingWrite>,
    /// Orders whose completion report was saved or queued this session.
    completions: HashSet<String>,
    retry: RetryPolicy,
}

impl StageCoordinator {
    /// Build a coordinator, restoring timers from `persistence`.
    pub fn new(
        orders: Arc<dyn OrderStore>,
        stage_times: Arc<dyn StageTimeStore>,
        persistence: TimerPersistence,
        clock: Arc<dyn Clock>,
        options: CoordinatorOptions,
    ) -> Self {
        let restored = persistence.load();
        info!(orders = restored.len(), "timer states restored");
        let store: SharedStore = Arc::new(Mutex::new(restored));
        let driver = TickDriver::new(store.clone(), clock.clone(), options.tick_interval);
        Self {
            orders,
            stage_times,
            store,
            persistence,
            clock,
            driver,
            pending: VecDeque::new(),
            completions: HashSet::new(),
            retry: options.retry,
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.driver.focused()
    }

    pub fn is_ticking(&self) -> bool {
        self.driver.is_ticking()
    }

    pub async fn state(&self, order_id: &str) -> Option<TaskState> {
        self.store.lock().await.get(order_id).cloned()
    }

    pub async fn phase(&self, order_id: &str) -> Option<TimerPhase> {
        self.store.lock().await.get(order_id).map(TaskState::phase)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingWrite> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True once `complete` has succeeded for the order, even if the summary
    /// update is still waiting in the queue.
    pub fn is_completion_submitted(&self, order_id: &str) -> bool {
        self.completions.contains(order_id)
    }

    /// Create an order (or an ad-hoc task when `number` is `None`) and focus it.
    pub async fn create_order(&mut self, number: Option<String>) -> Result<ManufacturingOrder> {
        if let Some(open) = self.store.lock().await.open_task(None) {
            return Err(TrackerError::OpenTaskExists {
                order_id: open.order_id.clone(),
            });
        }

        let order = self
            .orders
            .create_order(number.as_deref(), &[Stage::ACTIVE])
            .await?;

        {
            let mut store = self.store.lock().await;
            store.initialize(&order.id);
            store.reset(&order.id);
            self.persist(&store);
        }
        self.driver.focus(&order.id).await;
        info!(order_id = %order.id, name = %order.display_name(), "order ready");
        Ok(order)
    }

    /// Open an order from the history list, restoring committed stage times.
    pub async fn select_order(
        &mut self,
        order: &ManufacturingOrder,
        times: Option<&OrderTimes>,
    ) -> Result<TaskState> {
        let state = {
            let mut store = self.store.lock().await;
            let state = match times {
                Some(times) => store.hydrate(&order.id, &times.stages).clone(),
                None => store.initialize(&order.id).clone(),
            };
            self.persist(&store);
            state
        };
        self.driver.focus(&order.id).await;
        debug!(order_id = %order.id, phase = ?state.phase(), "order selected");
        Ok(state)
    }

    /// Leave the production view. Remote writes in flight are not cancelled.
    pub async fn go_to_menu(&mut self) {
        self.driver.unfocus().await;
    }

    pub async fn start(&mut self, order_id: &str) -> Result<Transition> {
        let now = self.clock.now_ms();
        let transition = {
            let mut store = self.store.lock().await;
            if let Some(open) = store.open_task(Some(order_id)) {
                return Err(TrackerError::OpenTaskExists {
                    order_id: open.order_id.clone(),
                });
            }
            let transition = store.start(order_id, now)?;
            if transition.is_applied() {
                self.persist(&store);
            }
            transition
        };
        self.follow(order_id).await;
        if transition.is_applied() {
            info!(order_id, "timer started");
        }
        Ok(transition)
    }

    pub async fn pause(&mut self, order_id: &str) -> Result<Transition> {
        let now = self.clock.now_ms();
        let transition = {
            let mut store = self.store.lock().await;
            let transition = store.pause(order_id, now)?;
            if transition.is_applied() {
                self.persist(&store);
                let elapsed_ms = store.get(order_id).map_or(0, |state| state.elapsed_time);
                info!(order_id, elapsed_ms, "timer paused");
            }
            transition
        };
        self.driver.refresh().await;
        Ok(transition)
    }

    pub async fn resume(&mut self, order_id: &str) -> Result<Transition> {
        let now = self.clock.now_ms();
        let transition = {
            let mut store = self.store.lock().await;
            let transition = store.resume(order_id, now)?;
            if transition.is_applied() {
                self.persist(&store);
            }
            transition
        };
        self.follow(order_id).await;
        if transition.is_applied() {
            info!(order_id, "timer resumed");
        }
        Ok(transition)
    }

    /// Commit the active stage locally, then save its time remotely.
    pub async fn stop(&mut self, order_id: &str) -> Result<StopResult> {
        let now = self.clock.now_ms();
        let outcome = {
            let mut store = self.store.lock().await;
            let phase = store
                .get(order_id)
                .map(TaskState::phase)
                .ok_or_else(|| TrackerError::NotFound {
                    order_id: order_id.to_string(),
                })?;
            match phase {
                TimerPhase::Idle => return Ok(StopResult::NotStarted),
                TimerPhase::Stopped => return Ok(StopResult::AlreadyCompleted),
                TimerPhase::Running => {
                    store.tick(order_id, now)?;
                }
                TimerPhase::Paused => {}
            }
            let outcome = store.stop(order_id)?;
            self.persist(&store);
            outcome
        };
        self.driver.refresh().await;

        let StopOutcome::Committed(millis) = outcome else {
            return Ok(StopResult::AlreadyCompleted);
        };
        info!(order_id, elapsed_ms = millis, "stage committed");

        let write = PendingWrite::StageTime {
            order_id: order_id.to_string(),
            stage: Stage::ACTIVE,
            millis,
        };
        let remote = self.push_remote(write).await;
        Ok(StopResult::Committed { millis, remote })
    }

    /// Record the completion report and move the order to the summary stage.
    pub async fn complete(
        &mut self,
        order_id: &str,
        report: CompletionReport,
    ) -> Result<RemoteStatus> {
        if self.completions.contains(order_id) {
            return Err(TrackerError::CompletionSubmitted {
                order_id: order_id.to_string(),
            });
        }
        {
            let store = self.store.lock().await;
            let state = store.get(order_id).ok_or_else(|| TrackerError::NotFound {
                order_id: order_id.to_string(),
            })?;
            if !state.is_completed(Stage::ACTIVE) {
                return Err(TrackerError::StageNotStopped {
                    order_id: order_id.to_string(),
                });
            }
        }

        let (has_incidents, description) = report.into_fields()?;
        let write = PendingWrite::OrderStage {
            order_id: order_id.to_string(),
            stage: OrderStage::Summary,
            has_incidents,
            description,
        };
        let status = self.push_remote(write).await;
        self.completions.insert(order_id.to_string());
        info!(order_id, has_incidents = ?has_incidents, saved = status.is_saved(), "order completed");
        Ok(status)
    }

    /// Re-issue queued remote writes. Local timers are never touched.
    pub async fn retry_pending(&mut self) -> Result<RetryReport> {
        let queued: Vec<PendingWrite> = self.pending.drain(..).collect();
        let mut flushed = 0;
        let mut failure = None;

        for write in queued {
            if failure.is_some() {
                self.pending.push_back(write);
                continue;
            }
            match write
                .issue(self.orders.as_ref(), self.stage_times.as_ref())
                .await
            {
                Ok(()) => flushed += 1,
                Err(BackendError::NotFound { .. }) => {
                    warn!(order_id = write.order_id(), "dropping queued write for a deleted order");
                }
                Err(err) => {
                    warn!(order_id = write.order_id(), error = %err, "queued write still failing");
                    self.pending.push_back(write);
                    failure = Some(err);
                }
            }
        }

        let remaining = self.pending.len();
        info!(flushed, remaining, "pending writes retried");
        match failure {
            Some(err) if err.is_auth_error() => Err(err.into()),
            _ => Ok(RetryReport { flushed, remaining }),
        }
    }

    /// Orders plus their stage times. An unreachable backend yields an empty
    /// listing; a missing session is an error.
    pub async fn list_orders(&self) -> Result<OrderListing> {
        let listing = tokio::try_join!(
            self.orders.list_orders(),
            self.stage_times.get_all_stage_times()
        );
        match listing {
            Ok((orders, times)) => Ok(OrderListing { orders, times }),
            Err(err) if err.is_remote_unavailable() => {
                warn!(error = %err, "could not load orders; showing an empty list");
                Ok(OrderListing::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn rename_order(&self, order_id: &str, number: &str) -> Result<ManufacturingOrder> {
        let number = number.trim();
        if number.is_empty() {
            return Err(TrackerError::InvalidInput(
                "manufacturing number must not be empty".to_string(),
            ));
        }
        let order = self.orders.update_order_number(order_id, number).await?;
        info!(order_id, number, "order renamed");
        Ok(order)
    }

    pub async fn delete_order(&mut self, order_id: &str) -> Result<()> {
        self.orders.delete_order(order_id).await?;

        if self.driver.focused() == Some(order_id) {
            self.driver.unfocus().await;
        }
        {
            let mut store = self.store.lock().await;
            if store.remove(order_id).is_some() {
                self.persist(&store);
            }
        }
        self.pending.retain(|write| write.order_id() != order_id);
        self.completions.remove(order_id);
        Ok(())
    }

    pub async fn delete_all_orders(&mut self) -> Result<()> {
        self.orders.delete_all_orders().await?;
        self.discard_local_state().await
    }

    /// Sign out remotely and discard every local timer, even if the remote
    /// call fails.
    pub async fn sign_out(&mut self, auth: &dyn AuthProvider) -> Result<()> {
        let remote = auth.sign_out().await;
        self.discard_local_state().await?;
        remote.map_err(TrackerError::from)
    }

    /// Drop all timer states, the queue and the persisted snapshot.
    pub async fn discard_local_state(&mut self) -> Result<()> {
        self.driver.unfocus().await;
        self.store.lock().await.clear();
        self.pending.clear();
        self.completions.clear();
        self.persistence.clear()?;
        info!("local timer state discarded");
        Ok(())
    }

    /// Stop ticking and write a final snapshot.
    pub async fn shutdown(&mut self) {
        self.driver.unfocus().await;
        let store = self.store.lock().await;
        self.persist(&store);
    }

    async fn follow(&mut self, order_id: &str) {
        if self.driver.focused() == Some(order_id) {
            self.driver.refresh().await;
        } else {
            self.driver.focus(order_id).await;
        }
    }

    async fn push_remote(&mut self, write: PendingWrite) -> RemoteStatus {
        let orders = self.orders.clone();
        let stage_times = self.stage_times.clone();
        let result = with_retry(self.retry, || {
            write.issue(orders.as_ref(), stage_times.as_ref())
        })
        .await;

        match result {
            Ok(()) => {
                self.pending.retain(|queued| !write.supersedes(queued));
                RemoteStatus::Saved
            }
            Err(err) => {
                warn!(order_id = write.order_id(), error = %err, "remote write failed; queued for retry");
                let reason = err.user_message();
                self.pending.retain(|queued| !write.supersedes(queued));
                self.pending.push_back(write);
                RemoteStatus::Pending { reason }
            }
        }
    }

    fn persist(&self, store: &TaskStateStore) {
        if let Err(err) = self.persistence.save(store) {
            warn!(error = %err, "failed to persist timer snapshot; keeping in-memory state");
        }
    }
}

async fn with_retry<F, Fut>(policy: RetryPolicy, mut op: F) -> mmr_backend::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = mmr_backend::Result<()>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retryable() && attempt < attempts => {
                let delay = err
                    .retry_delay()
                    .map(Duration::from_secs)
                    .unwrap_or(policy.delay)
                    .min(policy.delay.max(Duration::from_millis(1)) * 10);
                debug!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying remote write");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CompletionReport::NoIncidents, Some(false), None)]
    #[case(
        CompletionReport::Incidents { categories: vec![IncidentCategory::Tooling], notes: " torque driver broke ".into() },
        Some(true),
        Some("[Tooling failure] torque driver broke")
    )]
    #[case(
        CompletionReport::Incidents { categories: vec![IncidentCategory::Material, IncidentCategory::Quality], notes: String::new() },
        Some(true),
        Some("[Missing or defective material, Quality issue]")
    )]
    #[case(
        CompletionReport::Incidents { categories: vec![], notes: "label misprinted".into() },
        Some(true),
        Some("label misprinted")
    )]
    #[case(CompletionReport::Description(" rewired panel ".into()), None, Some("rewired panel"))]
    fn test_completion_report_fields(
        #[case] report: CompletionReport,
        #[case] has_incidents: Option<bool>,
        #[case] description: Option<&str>,
    ) {
        let (flag, text) = report.into_fields().unwrap();
        assert_eq!(flag, has_incidents);
        assert_eq!(text.as_deref(), description);
    }

    #[rstest]
    #[case(CompletionReport::Description("   ".into()))]
    #[case(CompletionReport::Incidents { categories: vec![], notes: " ".into() })]
    fn test_completion_report_rejects_empty(#[case] report: CompletionReport) {
        assert!(matches!(
            report.into_fields(),
            Err(TrackerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_newer_stage_time_supersedes_queued_one() {
        let older = PendingWrite::StageTime {
            order_id: "o-1".into(),
            stage: Stage::Assembly,
            millis: 10,
        };
        let newer = PendingWrite::StageTime {
            order_id: "o-1".into(),
            stage: Stage::Assembly,
            millis: 20,
        };
        let other = PendingWrite::OrderStage {
            order_id: "o-1".into(),
            stage: OrderStage::Summary,
            has_incidents: None,
            description: Some("done".into()),
        };
        assert!(newer.supersedes(&older));
        assert!(!newer.supersedes(&other));
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_on_non_retryable() {
        let mut calls = 0;
        let policy = RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(1),
        };
        let result = with_retry(policy, || {
            calls += 1;
            async { Err(BackendError::AuthRequired) }
        })
        .await;
        assert!(matches!(result, Err(BackendError::AuthRequired)));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_with_retry_retries_outages() {
        let mut calls = 0;
        let policy = RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(1),
        };
        let result = with_retry(policy, || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(BackendError::Api {
                        status: 503,
                        code: None,
                        message: "unavailable".into(),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }
}
