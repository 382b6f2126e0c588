/*
[INPUT]:  Backend schema definitions and serde requirements
[OUTPUT]: Typed Rust structs for orders, stage times and sessions
[POS]:    Data layer - type definitions for backend communication
[UPDATE]: When backend schema changes or new types added
*/

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{OrderStage, Stage};
use super::serde_helpers;

/// A manufacturing order, or an ad-hoc task when it carries no number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingOrder {
    pub id: String,
    #[serde(default)]
    pub manufacturing_number: Option<String>,
    pub current_stage: OrderStage,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub has_incidents: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: String,
}

impl ManufacturingOrder {
    /// Tasks created without a manufacturing number.
    pub fn is_ad_hoc(&self) -> bool {
        self.manufacturing_number
            .as_deref()
            .map(|number| number.trim().is_empty())
            .unwrap_or(true)
    }

    /// Label shown in listings: the number, or a short id for ad-hoc tasks.
    pub fn display_name(&self) -> String {
        match self.manufacturing_number.as_deref().map(str::trim) {
            Some(number) if !number.is_empty() => number.to_string(),
            _ => {
                let short: String = self.id.chars().take(8).collect();
                format!("task-{short}")
            }
        }
    }
}

/// One row of the `stage_times` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTimeRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub order_id: String,
    pub stage: Stage,
    #[serde(deserialize_with = "serde_helpers::deserialize_millis")]
    pub time_ms: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Aggregated stage times for one order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTimes {
    pub total: i64,
    pub stages: BTreeMap<Stage, i64>,
    pub users: BTreeMap<Stage, String>,
}

impl OrderTimes {
    /// Group rows by order. A later row for the same order and stage replaces
    /// an earlier one; totals are computed once every row is applied.
    pub fn aggregate(records: &[StageTimeRecord]) -> HashMap<String, OrderTimes> {
        let mut result: HashMap<String, OrderTimes> = HashMap::new();

        for record in records {
            let entry = result.entry(record.order_id.clone()).or_default();
            entry.stages.insert(record.stage, record.time_ms);
            match &record.user_id {
                Some(user_id) => {
                    entry.users.insert(record.stage, user_id.clone());
                }
                None => {
                    entry.users.remove(&record.stage);
                }
            }
        }

        for times in result.values_mut() {
            times.total = times.stages.values().copied().sum();
        }

        result
    }

    pub fn stage(&self, stage: Stage) -> i64 {
        self.stages.get(&stage).copied().unwrap_or(0)
    }
}

/// Authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated session; the access token gates every data request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
