/*
[INPUT]:  Public API exports for mmr-tracker crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod state;
pub mod task_state;
pub mod ticker;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use coordinator::{
    CompletionReport, CoordinatorOptions, OrderListing, PendingWrite, RemoteStatus, RetryPolicy,
    RetryReport, StageCoordinator, StopResult,
};
pub use error::{Result, TrackerError};
pub use state::{FileSlot, KeyValueSlot, MemorySlot, PersistenceError, TimerPersistence};
pub use task_state::{
    StopOutcome, TaskState, TaskStateStore, TimerError, TimerPhase, Transition, format_elapsed,
};
pub use ticker::TickDriver;
