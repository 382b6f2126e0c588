/*
[INPUT]:  Shared TaskStateStore, focused order id, Clock
[OUTPUT]: Periodic elapsed-time recomputation for the focused order only
[POS]:    Engine runtime - single owned tokio task with cancellation
[UPDATE]: When tick cadence or focus semantics change
*/

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::task_state::{TaskState, TaskStateStore, Transition};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

pub type SharedStore = Arc<Mutex<TaskStateStore>>;

#[derive(Debug)]
struct ActiveTicker {
    order_id: String,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the one recurring tick task. At most one ticker exists at a time and
/// it only ever writes to the order that was focused when it was spawned.
///
/// Callers must not hold the store lock while calling the async methods: they
/// wait for the previous ticker to exit, and that ticker may be waiting on
/// the lock.
pub struct TickDriver {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    interval: Duration,
    focused: Option<String>,
    active: Option<ActiveTicker>,
}

impl TickDriver {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval: interval.max(Duration::from_millis(1)),
            focused: None,
            active: None,
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// True while a tick task is alive.
    pub fn is_ticking(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Move focus to `order_id`. The previous order keeps its state but stops
    /// being ticked.
    pub async fn focus(&mut self, order_id: &str) {
        self.halt().await;
        self.focused = Some(order_id.to_string());
        self.refresh().await;
    }

    pub async fn unfocus(&mut self) {
        self.halt().await;
        self.focused = None;
    }

    /// Start or stop ticking to match the focused order's current state.
    pub async fn refresh(&mut self) {
        self.halt().await;
        let Some(order_id) = self.focused.clone() else {
            return;
        };

        let ticking = self
            .store
            .lock()
            .await
            .get(&order_id)
            .is_some_and(TaskState::is_ticking);
        if !ticking {
            return;
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_ticker(
            self.store.clone(),
            self.clock.clone(),
            order_id.clone(),
            self.interval,
            shutdown.clone(),
        ));
        debug!(order_id = %order_id, interval_ms = self.interval.as_millis() as u64, "ticker started");
        self.active = Some(ActiveTicker {
            order_id,
            shutdown,
            handle,
        });
    }

    /// Cancel the running ticker and wait until it can no longer write.
    pub async fn halt(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.shutdown.cancel();
        if let Err(join_err) = active.handle.await {
            if join_err.is_panic() {
                warn!(order_id = %active.order_id, error = %join_err, "ticker panicked");
            }
        }
        debug!(order_id = %active.order_id, "ticker stopped");
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.shutdown.cancel();
            active.handle.abort();
        }
    }
}

async fn run_ticker(
    store: SharedStore,
    clock: Arc<dyn Clock>,
    order_id: String,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {
                let mut store = store.lock().await;
                if shutdown.is_cancelled() {
                    return;
                }
                match store.tick(&order_id, clock.now_ms()) {
                    Ok(Transition::Applied) => {}
                    Ok(Transition::Ignored) => {
                        debug!(order_id = %order_id, "order no longer running; ticker exits");
                        return;
                    }
                    Err(err) => {
                        debug!(order_id = %order_id, error = %err, "order vanished; ticker exits");
                        return;
                    }
                }
            }
        }
    }
}
