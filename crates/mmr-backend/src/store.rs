/*
[INPUT]:  Remote collaborator contracts used by the timer engine
[OUTPUT]: OrderStore / StageTimeStore / AuthProvider traits + HTTP impls
[POS]:    Seam between the timer engine and the hosted backend
[UPDATE]: When the engine needs a new remote operation
*/

use std::collections::HashMap;

use async_trait::async_trait;

use crate::auth::AuthManager;
use crate::http::{BackendClient, Result};
use crate::types::{ManufacturingOrder, OrderStage, OrderTimes, Session, Stage};

/// Remote order records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(
        &self,
        number: Option<&str>,
        stages: &[Stage],
    ) -> Result<ManufacturingOrder>;

    async fn update_order_stage(
        &self,
        order_id: &str,
        stage: OrderStage,
        has_incidents: Option<bool>,
        description: Option<&str>,
    ) -> Result<()>;

    async fn update_order_number(&self, order_id: &str, number: &str)
    -> Result<ManufacturingOrder>;

    async fn list_orders(&self) -> Result<Vec<ManufacturingOrder>>;

    async fn delete_order(&self, order_id: &str) -> Result<()>;

    async fn delete_all_orders(&self) -> Result<()>;
}

/// Remote stage time records. `save_stage_time` is an upsert.
#[async_trait]
pub trait StageTimeStore: Send + Sync {
    async fn save_stage_time(&self, order_id: &str, stage: Stage, millis: i64) -> Result<()>;

    async fn get_all_stage_times(&self) -> Result<HashMap<String, OrderTimes>>;
}

/// Session provider gating every remote call.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>>;

    async fn sign_out(&self) -> Result<()>;

    fn get_session(&self) -> Option<Session>;
}

#[async_trait]
impl OrderStore for BackendClient {
    async fn create_order(
        &self,
        number: Option<&str>,
        stages: &[Stage],
    ) -> Result<ManufacturingOrder> {
        BackendClient::create_order(self, number, stages).await
    }

    async fn update_order_stage(
        &self,
        order_id: &str,
        stage: OrderStage,
        has_incidents: Option<bool>,
        description: Option<&str>,
    ) -> Result<()> {
        BackendClient::update_order_stage(self, order_id, stage, has_incidents, description).await
    }

    async fn update_order_number(
        &self,
        order_id: &str,
        number: &str,
    ) -> Result<ManufacturingOrder> {
        BackendClient::update_order_number(self, order_id, number).await
    }

    async fn list_orders(&self) -> Result<Vec<ManufacturingOrder>> {
        BackendClient::list_orders(self).await
    }

    async fn delete_order(&self, order_id: &str) -> Result<()> {
        BackendClient::delete_order(self, order_id).await
    }

    async fn delete_all_orders(&self) -> Result<()> {
        BackendClient::delete_all_orders(self).await
    }
}

#[async_trait]
impl StageTimeStore for BackendClient {
    async fn save_stage_time(&self, order_id: &str, stage: Stage, millis: i64) -> Result<()> {
        BackendClient::save_stage_time(self, order_id, stage, millis).await
    }

    async fn get_all_stage_times(&self) -> Result<HashMap<String, OrderTimes>> {
        BackendClient::get_all_stage_times(self).await
    }
}

#[async_trait]
impl AuthProvider for AuthManager {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        AuthManager::sign_in(self, email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        AuthManager::sign_up(self, email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        AuthManager::sign_out(self).await
    }

    fn get_session(&self) -> Option<Session> {
        AuthManager::get_session(self)
    }
}
