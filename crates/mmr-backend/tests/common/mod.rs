/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for mmr-backend tests

#![allow(dead_code)]

use chrono::{Duration, Utc};
use mmr_backend::{BackendClient, Session, User};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const API_KEY: &str = "anon-test-key";
pub const ACCESS_TOKEN: &str = "access-token-123";
pub const USER_ID: &str = "user-1";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client pointed at the mock server, without a session
pub fn anonymous_client(server: &MockServer) -> BackendClient {
    BackendClient::new(&server.uri(), API_KEY).expect("client")
}

/// Client pointed at the mock server with an active session
pub fn signed_in_client(server: &MockServer) -> BackendClient {
    let client = anonymous_client(server);
    client.session_manager().set_session(mock_session());
    client
}

pub fn mock_session() -> Session {
    Session {
        access_token: ACCESS_TOKEN.to_string(),
        refresh_token: Some("refresh-token".to_string()),
        expires_at: Utc::now() + Duration::hours(1),
        user: User {
            id: USER_ID.to_string(),
            email: Some("operator@example.com".to_string()),
        },
    }
}

/// JSON row for a manufacturing order
pub fn order_json(id: &str, number: Option<&str>, stage: &str) -> Value {
    json!({
        "id": id,
        "manufacturing_number": number,
        "current_stage": stage,
        "stages": ["assembly"],
        "has_incidents": null,
        "description": null,
        "created_at": "2024-05-01T08:00:00Z",
        "updated_at": "2024-05-01T08:00:00Z",
        "user_id": USER_ID,
    })
}
