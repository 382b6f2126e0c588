/*
[INPUT]:  Backend schema definitions and serde requirements
[OUTPUT]: Request bodies for order, stage time and auth endpoints
[POS]:    Data layer - type definitions for backend communication
[UPDATE]: When request payloads change
*/

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::enums::{OrderStage, Stage};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrderRequest {
    pub manufacturing_number: Option<String>,
    pub current_stage: OrderStage,
    pub stages: Vec<Stage>,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOrderStageRequest {
    pub current_stage: OrderStage,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_incidents: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOrderNumberRequest {
    pub manufacturing_number: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewStageTimeRequest {
    pub order_id: String,
    pub stage: Stage,
    pub time_ms: i64,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateStageTimeRequest {
    pub time_ms: i64,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}
