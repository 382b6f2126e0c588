/*
[INPUT]:  Sessions returned by the auth endpoints
[OUTPUT]: Session retrieval and expiration status
[POS]:    Auth layer - session lifecycle management
[UPDATE]: When adding token refresh or changing storage strategy
*/

use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};

use crate::types::{AuthResponse, Session};

/// Thread-safe session holder shared by the client and the auth manager.
///
/// Cloning shares the same underlying slot.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    data: Arc<RwLock<Option<Session>>>,
}

impl SessionManager {
    /// Create a new empty session manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session
    pub fn set_session(&self, session: Session) {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(session);
    }

    /// Build and store a session from an auth response
    pub fn set_from_response(&self, response: AuthResponse) -> Session {
        let session = Session {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
            user: response.user,
        };
        self.set_session(session.clone());
        session
    }

    /// The stored session, if any, expired or not
    pub fn session(&self) -> Option<Session> {
        let guard = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// The stored session only when it has not expired
    pub fn active_session(&self) -> Option<Session> {
        self.session().filter(|session| !session.is_expired())
    }

    /// Get the current access token if the session is still valid
    pub fn access_token(&self) -> Option<String> {
        self.active_session().map(|session| session.access_token)
    }

    /// Check if the session is missing or expired
    pub fn is_expired(&self) -> bool {
        self.active_session().is_none()
    }

    /// Clear the stored session
    pub fn clear(&self) {
        let mut guard = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::User;

    fn response(expires_in: i64) -> AuthResponse {
        AuthResponse {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_in,
            user: User {
                id: "u-1".to_string(),
                email: Some("operator@example.com".to_string()),
            },
        }
    }

    #[test]
    fn test_new_manager_is_empty() {
        let manager = SessionManager::new();
        assert!(manager.access_token().is_none());
        assert!(manager.is_expired());
    }

    #[test]
    fn test_set_and_get_session() {
        let manager = SessionManager::new();
        manager.set_from_response(response(3600));

        assert_eq!(manager.access_token(), Some("access".to_string()));
        assert!(!manager.is_expired());
    }

    #[test]
    fn test_expired_session_is_not_active() {
        let manager = SessionManager::new();
        manager.set_from_response(response(-10));

        assert!(manager.session().is_some());
        assert!(manager.active_session().is_none());
        assert!(manager.is_expired());
    }

    #[test]
    fn test_clones_share_state() {
        let manager = SessionManager::new();
        let shared = manager.clone();
        manager.set_from_response(response(3600));
        assert!(!shared.is_expired());

        shared.clear();
        assert!(manager.session().is_none());
    }
}
