/*
[INPUT]:  Backend schema definitions and serde requirements
[OUTPUT]: Response bodies for auth endpoints and error payloads
[POS]:    Data layer - type definitions for backend communication
[UPDATE]: When response payloads change
*/

use serde::Deserialize;

use super::models::User;

/// Body returned by the password grant and by sign-up when auto-confirmed.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub user: User,
}

/// Sign-up may return either a full session or just the pending user.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(AuthResponse),
    User(User),
}

/// Row projection used by existence checks.
#[derive(Debug, Clone, Deserialize)]
pub struct IdRow {
    pub id: String,
}

/// Error payload. Data endpoints use `code`/`message`; auth endpoints use
/// `error`/`error_description` or `msg`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl ErrorBody {
    pub fn code(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(code)) => Some(code.clone()),
            Some(serde_json::Value::Number(code)) => Some(code.to_string()),
            _ => None,
        }
    }

    pub fn best_message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.msg.clone())
            .or_else(|| self.error.clone())
    }
}
