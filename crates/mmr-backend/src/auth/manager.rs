/*
[INPUT]:  Email/password credentials and HTTP client
[OUTPUT]: Authenticated session (access token)
[POS]:    Auth layer - orchestrates sign-up, sign-in and sign-out
[UPDATE]: When auth endpoints or flow steps change
*/

use reqwest::Method;
use tracing::{info, warn};

use crate::http::{BackendClient, BackendError, Result};
use crate::types::{AuthResponse, PasswordCredentials, Session, SignUpResponse};

use super::SessionManager;

/// Manages the authentication flow against the auth API
#[derive(Debug, Clone)]
pub struct AuthManager {
    client: BackendClient,
}

impl AuthManager {
    /// Create an auth manager sharing the client's session slot
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Get the session manager
    pub fn session_manager(&self) -> &SessionManager {
        self.client.session_manager()
    }

    /// Register a new account
    ///
    /// POST /auth/v1/signup
    ///
    /// Returns a session when the backend confirms the account immediately,
    /// `None` when the operator must confirm by email and then sign in.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let url = self.client.auth_url("signup")?;
        let builder = self
            .client
            .auth_request(Method::POST, url)
            .json(&credentials(email, password));

        let response: SignUpResponse = self
            .client
            .send_json(builder)
            .await
            .map_err(|err| as_auth_failure(err, "Could not create the account"))?;

        match response {
            SignUpResponse::Session(auth) => {
                let session = self.session_manager().set_from_response(auth);
                info!(user_id = %session.user.id, "account created and signed in");
                Ok(Some(session))
            }
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "account created, confirmation pending");
                Ok(None)
            }
        }
    }

    /// Sign in with email and password
    ///
    /// POST /auth/v1/token?grant_type=password
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut url = self.client.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let builder = self
            .client
            .auth_request(Method::POST, url)
            .json(&credentials(email, password));

        let response: AuthResponse = self
            .client
            .send_json(builder)
            .await
            .map_err(|err| as_auth_failure(err, "Could not sign in"))?;

        let session = self.session_manager().set_from_response(response);
        info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    /// Sign out. The local session is cleared even when the remote call fails.
    ///
    /// POST /auth/v1/logout
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session_manager().active_session() else {
            self.session_manager().clear();
            return Ok(());
        };

        let url = self.client.auth_url("logout")?;
        let builder = self
            .client
            .auth_request(Method::POST, url)
            .bearer_auth(&session.access_token);
        let result = self.client.send_empty(builder).await;
        self.session_manager().clear();

        match result {
            Ok(()) => {
                info!(user_id = %session.user.id, "signed out");
                Ok(())
            }
            Err(BackendError::AuthRequired) => Ok(()),
            Err(err) => {
                warn!(error = %err, "remote sign out failed; local session cleared");
                Err(err)
            }
        }
    }

    /// The current session if it has not expired
    pub fn get_session(&self) -> Option<Session> {
        self.session_manager().active_session()
    }
}

fn credentials(email: &str, password: &str) -> PasswordCredentials {
    PasswordCredentials {
        email: email.trim().to_string(),
        password: password.to_string(),
    }
}

fn as_auth_failure(err: BackendError, fallback: &str) -> BackendError {
    match err {
        BackendError::Api { status, message, .. } if (400..500).contains(&status) => {
            BackendError::Authentication {
                message: if message.is_empty() {
                    fallback.to_string()
                } else {
                    message
                },
            }
        }
        BackendError::AuthRequired => BackendError::Authentication {
            message: fallback.to_string(),
        },
        other => other,
    }
}
