/*
[INPUT]:  Order ids and epoch-millisecond timestamps
[OUTPUT]: Per-order timer state and deterministic transitions
[POS]:    Engine core - pure state machine, no I/O
[UPDATE]: When timer semantics or the snapshot schema change
*/

use std::collections::{BTreeMap, BTreeSet, HashMap};

use mmr_backend::Stage;
use mmr_backend::types::serde_helpers::{
    deserialize_millis, deserialize_opt_millis, deserialize_stage_millis,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("no timer state for order {0}")]
    NotFound(String),
}

/// Whether a transition changed the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Ignored,
}

impl Transition {
    pub fn is_applied(self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Result of stopping the active stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The stage was committed with this many milliseconds.
    Committed(i64),
    AlreadyCompleted,
}

/// Phase derived from a [`TaskState`]; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Timer bookkeeping for one order or ad-hoc task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub order_id: String,
    #[serde(default)]
    pub is_timer_running: bool,
    #[serde(default)]
    pub is_paused: bool,
    /// Most recent resume point; `None` while stopped or paused
    #[serde(default, deserialize_with = "deserialize_opt_millis")]
    pub start_time: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_millis")]
    pub paused_time: i64,
    #[serde(default, deserialize_with = "deserialize_millis")]
    pub elapsed_time: i64,
    #[serde(default, deserialize_with = "deserialize_stage_millis")]
    pub stage_times: BTreeMap<Stage, i64>,
    #[serde(default, deserialize_with = "deserialize_completed_stages")]
    pub completed_stages: BTreeSet<Stage>,
}

impl TaskState {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            is_timer_running: false,
            is_paused: false,
            start_time: None,
            paused_time: 0,
            elapsed_time: 0,
            stage_times: BTreeMap::new(),
            completed_stages: BTreeSet::new(),
        }
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Running and not paused.
    pub fn is_ticking(&self) -> bool {
        self.is_timer_running && !self.is_paused
    }

    /// Started on the active stage and not yet stopped.
    pub fn is_open(&self) -> bool {
        self.is_timer_running && !self.is_completed(Stage::ACTIVE)
    }

    pub fn phase(&self) -> TimerPhase {
        if self.is_completed(Stage::ACTIVE) {
            TimerPhase::Stopped
        } else if self.is_timer_running && self.is_paused {
            TimerPhase::Paused
        } else if self.is_timer_running {
            TimerPhase::Running
        } else {
            TimerPhase::Idle
        }
    }

    /// Time to display: the committed value once stopped, otherwise the live one.
    pub fn display_ms(&self) -> i64 {
        self.stage_times
            .get(&Stage::ACTIVE)
            .copied()
            .unwrap_or(self.elapsed_time)
    }

    fn running_elapsed(&self, now: i64) -> i64 {
        let start = self.start_time.unwrap_or(now);
        let computed = now.saturating_sub(start).saturating_add(self.paused_time);
        computed.max(self.elapsed_time)
    }

    fn clear_timer(&mut self) {
        self.is_timer_running = false;
        self.is_paused = false;
        self.start_time = None;
        self.paused_time = 0;
        self.elapsed_time = 0;
    }

    /// Snapshot rows must agree with their key and with the pause invariant.
    fn is_consistent(&self, key: &str) -> bool {
        self.order_id == key && (!self.is_paused || self.is_timer_running)
    }
}

/// In-memory map of order id to timer state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStateStore {
    states: HashMap<String, TaskState>,
}

impl TaskStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh state, or return the existing one untouched.
    pub fn initialize(&mut self, order_id: &str) -> &TaskState {
        self.states
            .entry(order_id.to_string())
            .or_insert_with(|| TaskState::new(order_id))
    }

    pub fn start(&mut self, order_id: &str, now: i64) -> Result<Transition, TimerError> {
        let state = self.state_mut(order_id)?;
        if state.is_completed(Stage::ACTIVE) || state.is_timer_running {
            return Ok(Transition::Ignored);
        }
        state.is_timer_running = true;
        state.is_paused = false;
        state.start_time = Some(now);
        state.elapsed_time = state.paused_time;
        Ok(Transition::Applied)
    }

    /// Freeze elapsed time, folding in everything up to `now`.
    pub fn pause(&mut self, order_id: &str, now: i64) -> Result<Transition, TimerError> {
        let state = self.state_mut(order_id)?;
        if !state.is_ticking() {
            return Ok(Transition::Ignored);
        }
        state.elapsed_time = state.running_elapsed(now);
        state.is_paused = true;
        state.paused_time = state.elapsed_time;
        state.start_time = None;
        Ok(Transition::Applied)
    }

    pub fn resume(&mut self, order_id: &str, now: i64) -> Result<Transition, TimerError> {
        let state = self.state_mut(order_id)?;
        if !(state.is_timer_running && state.is_paused) {
            return Ok(Transition::Ignored);
        }
        state.is_paused = false;
        state.start_time = Some(now);
        Ok(Transition::Applied)
    }

    /// Recompute elapsed time. A clock that steps backwards keeps the last value.
    pub fn tick(&mut self, order_id: &str, now: i64) -> Result<Transition, TimerError> {
        let state = self.state_mut(order_id)?;
        if !state.is_ticking() {
            return Ok(Transition::Ignored);
        }
        state.elapsed_time = state.running_elapsed(now);
        Ok(Transition::Applied)
    }

    /// Commit the active stage with the current elapsed time.
    pub fn stop(&mut self, order_id: &str) -> Result<StopOutcome, TimerError> {
        let state = self.state_mut(order_id)?;
        if state.is_completed(Stage::ACTIVE) {
            return Ok(StopOutcome::AlreadyCompleted);
        }
        state.is_timer_running = false;
        state.is_paused = false;
        state.start_time = None;
        let committed = state.elapsed_time;
        state.stage_times.insert(Stage::ACTIVE, committed);
        state.completed_stages.insert(Stage::ACTIVE);
        Ok(StopOutcome::Committed(committed))
    }

    /// Zero the timer fields, keeping committed stage times.
    pub fn reset(&mut self, order_id: &str) -> &TaskState {
        let state = self
            .states
            .entry(order_id.to_string())
            .or_insert_with(|| TaskState::new(order_id));
        state.clear_timer();
        state
    }

    /// Mark stages that already have a recorded time as completed.
    pub fn hydrate(&mut self, order_id: &str, stage_times: &BTreeMap<Stage, i64>) -> &TaskState {
        let state = self
            .states
            .entry(order_id.to_string())
            .or_insert_with(|| TaskState::new(order_id));
        for (stage, millis) in stage_times {
            if *millis <= 0 || state.completed_stages.contains(stage) {
                continue;
            }
            state.stage_times.insert(*stage, *millis);
            state.completed_stages.insert(*stage);
            if *stage == Stage::ACTIVE {
                state.clear_timer();
                state.elapsed_time = *millis;
            }
        }
        state
    }

    pub fn get(&self, order_id: &str) -> Option<&TaskState> {
        self.states.get(order_id)
    }

    pub fn remove(&mut self, order_id: &str) -> Option<TaskState> {
        self.states.remove(order_id)
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Any order other than `except` that is started but not stopped.
    pub fn open_task(&self, except: Option<&str>) -> Option<&TaskState> {
        self.states
            .values()
            .filter(|state| Some(state.order_id.as_str()) != except)
            .find(|state| state.is_open())
    }

    pub fn snapshot(&self) -> BTreeMap<String, TaskState> {
        self.states
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }

    /// Rebuild a store from a snapshot. Returns `None` when any row is
    /// inconsistent, so callers can discard the snapshot as a whole.
    pub fn from_snapshot(snapshot: BTreeMap<String, TaskState>) -> Option<Self> {
        let mut states = HashMap::with_capacity(snapshot.len());
        for (key, mut state) in snapshot {
            if !state.is_consistent(&key) {
                return None;
            }
            let committed: Vec<Stage> = state.stage_times.keys().copied().collect();
            state.completed_stages.extend(committed);
            states.insert(key, state);
        }
        Some(Self { states })
    }

    fn state_mut(&mut self, order_id: &str) -> Result<&mut TaskState, TimerError> {
        self.states
            .get_mut(order_id)
            .ok_or_else(|| TimerError::NotFound(order_id.to_string()))
    }
}

/// Render milliseconds as `MM:SS.cc`.
pub fn format_elapsed(ms: i64) -> String {
    let ms = ms.max(0);
    let minutes = ms / 60_000;
    let seconds = (ms / 1_000) % 60;
    let centis = (ms % 1_000) / 10;
    format!("{minutes:02}:{seconds:02}.{centis:02}")
}

/// Accept an explicit list, or the `{}` that older snapshots wrote for a set.
fn deserialize_completed_stages<'de, D>(deserializer: D) -> Result<BTreeSet<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Object(_) => Ok(BTreeSet::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value::<Stage>(item).map_err(serde::de::Error::custom))
            .collect(),
        other => Err(serde::de::Error::custom(format!(
            "invalid completedStages: {other}"
        ))),
    }
}
