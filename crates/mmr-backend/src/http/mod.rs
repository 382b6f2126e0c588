/*
[INPUT]:  HTTP client configuration and backend endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod orders;
pub mod stage_times;

pub use error::{BackendError, Result};

pub use client::{BackendClient, ClientConfig};
