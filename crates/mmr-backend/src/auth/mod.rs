/*
[INPUT]:  Operator credentials and stored sessions
[OUTPUT]: Active sessions and auth errors
[POS]:    Auth layer - handles backend authentication
[UPDATE]: When auth flow or session storage changes
*/

pub mod manager;
pub mod persistent_session;
pub mod session;

pub use manager::AuthManager;
pub use persistent_session::PersistentSessionStore;
pub use session::SessionManager;
