/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public backend crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod store;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{AuthManager, PersistentSessionStore, SessionManager};

// Re-export commonly used types from http
pub use http::{BackendClient, BackendError, ClientConfig, Result};

pub use store::{AuthProvider, OrderStore, StageTimeStore};

// Re-export all types
pub use types::*;
