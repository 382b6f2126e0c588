/*
[INPUT]:  Failures from the timer engine, local persistence and the backend
[OUTPUT]: TrackerError taxonomy with operator-facing messages
[POS]:    Error layer - shared by coordinator and CLI
[UPDATE]: When adding new failure modes to the engine
*/

use mmr_backend::BackendError;
use thiserror::Error;

use crate::state::PersistenceError;
use crate::task_state::TimerError;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Remote collaborator failure (auth, duplicate number, outage)
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Timer transition on an order the store does not know
    #[error("No timer state for order {order_id}")]
    NotFound { order_id: String },

    /// A running or paused task blocks creating another one
    #[error("Task {order_id} is still open")]
    OpenTaskExists { order_id: String },

    /// Completion report submitted before the timer was stopped
    #[error("The timer for order {order_id} has not been stopped")]
    StageNotStopped { order_id: String },

    /// A completion report for this order was already saved or queued
    #[error("Order {order_id} was already completed")]
    CompletionSubmitted { order_id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Writing the local snapshot failed; the in-memory state is kept
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<TimerError> for TrackerError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::NotFound(order_id) => TrackerError::NotFound { order_id },
        }
    }
}

impl TrackerError {
    /// True when the remote side is temporarily unreachable.
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, TrackerError::Backend(err) if err.is_remote_unavailable())
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, TrackerError::Backend(err) if err.is_auth_error())
    }

    /// Short message suitable for showing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            TrackerError::Backend(err) => err.user_message(),
            TrackerError::OpenTaskExists { .. } => {
                "Finish the open task before starting a new one.".to_string()
            }
            TrackerError::StageNotStopped { .. } => {
                "Stop the timer before completing the task.".to_string()
            }
            TrackerError::CompletionSubmitted { .. } => {
                "This task was already completed.".to_string()
            }
            TrackerError::Persistence(_) => {
                "Could not save timers locally. They stay active in this session.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
