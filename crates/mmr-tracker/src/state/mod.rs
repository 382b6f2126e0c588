pub mod storage;

pub use storage::{
    DEFAULT_SNAPSHOT_KEY, FileSlot, KeyValueSlot, MemorySlot, PersistenceError, TimerPersistence,
};
