/*
[INPUT]:  Test scenarios needing remote collaborators
[OUTPUT]: In-memory backend fake, coordinator builders, mock server helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When remote contracts or coordinator construction change
*/

//! Common test utilities for mmr-tracker tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use mmr_backend::{
    AuthProvider, BackendClient, BackendError, ManufacturingOrder, OrderStage, OrderStore,
    OrderTimes, Session, Stage, StageTimeStore, User,
};
use mmr_tracker::{
    CoordinatorOptions, KeyValueSlot, ManualClock, RetryPolicy, StageCoordinator,
    TimerPersistence,
};
use wiremock::MockServer;

pub const API_KEY: &str = "anon-test-key";
pub const ACCESS_TOKEN: &str = "access-token-123";
pub const USER_ID: &str = "user-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageUpdate {
    pub order_id: String,
    pub stage: OrderStage,
    pub has_incidents: Option<bool>,
    pub description: Option<String>,
}

/// In-memory stand-in for the hosted backend.
#[derive(Debug, Default)]
pub struct FakeBackend {
    orders: Mutex<Vec<ManufacturingOrder>>,
    stage_times: Mutex<HashMap<(String, Stage), i64>>,
    stage_updates: Mutex<Vec<StageUpdate>>,
    next_id: AtomicUsize,
    save_calls: AtomicUsize,
    unavailable: AtomicBool,
    signed_out: AtomicBool,
    session_missing: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every remote call fails with a 503 until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every remote call fails with `AuthRequired` until switched back.
    pub fn set_session_missing(&self, missing: bool) {
        self.session_missing.store(missing, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn stage_time(&self, order_id: &str, stage: Stage) -> Option<i64> {
        self.stage_times
            .lock()
            .unwrap()
            .get(&(order_id.to_string(), stage))
            .copied()
    }

    pub fn stage_updates(&self) -> Vec<StageUpdate> {
        self.stage_updates.lock().unwrap().clone()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn was_signed_out(&self) -> bool {
        self.signed_out.load(Ordering::SeqCst)
    }

    fn check(&self) -> mmr_backend::Result<()> {
        if self.session_missing.load(Ordering::SeqCst) {
            return Err(BackendError::AuthRequired);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 503,
                code: None,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for FakeBackend {
    async fn create_order(
        &self,
        number: Option<&str>,
        stages: &[Stage],
    ) -> mmr_backend::Result<ManufacturingOrder> {
        self.check()?;
        let mut orders = self.orders.lock().unwrap();
        if let Some(number) = number {
            if orders
                .iter()
                .any(|order| order.manufacturing_number.as_deref() == Some(number))
            {
                return Err(BackendError::DuplicateIdentifier {
                    number: number.to_string(),
                });
            }
        }
        let id = format!("order-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let order = order(&id, number, stages);
        orders.insert(0, order.clone());
        Ok(order)
    }

    async fn update_order_stage(
        &self,
        order_id: &str,
        stage: OrderStage,
        has_incidents: Option<bool>,
        description: Option<&str>,
    ) -> mmr_backend::Result<()> {
        self.check()?;
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .ok_or_else(|| BackendError::NotFound {
                resource: "order",
                id: order_id.to_string(),
            })?;
        order.current_stage = stage;
        order.has_incidents = has_incidents;
        order.description = description.map(str::to_string);
        self.stage_updates.lock().unwrap().push(StageUpdate {
            order_id: order_id.to_string(),
            stage,
            has_incidents,
            description: description.map(str::to_string),
        });
        Ok(())
    }

    async fn update_order_number(
        &self,
        order_id: &str,
        number: &str,
    ) -> mmr_backend::Result<ManufacturingOrder> {
        self.check()?;
        let mut orders = self.orders.lock().unwrap();
        if orders
            .iter()
            .any(|order| order.id != order_id && order.manufacturing_number.as_deref() == Some(number))
        {
            return Err(BackendError::DuplicateIdentifier {
                number: number.to_string(),
            });
        }
        let order = orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .ok_or_else(|| BackendError::NotFound {
                resource: "order",
                id: order_id.to_string(),
            })?;
        order.manufacturing_number = Some(number.to_string());
        Ok(order.clone())
    }

    async fn list_orders(&self) -> mmr_backend::Result<Vec<ManufacturingOrder>> {
        self.check()?;
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn delete_order(&self, order_id: &str) -> mmr_backend::Result<()> {
        self.check()?;
        self.stage_times
            .lock()
            .unwrap()
            .retain(|(id, _), _| id != order_id);
        self.orders.lock().unwrap().retain(|order| order.id != order_id);
        Ok(())
    }

    async fn delete_all_orders(&self) -> mmr_backend::Result<()> {
        self.check()?;
        self.stage_times.lock().unwrap().clear();
        self.orders.lock().unwrap().clear();
        Ok(())
    }
}

#[async_trait]
impl StageTimeStore for FakeBackend {
    async fn save_stage_time(
        &self,
        order_id: &str,
        stage: Stage,
        millis: i64,
    ) -> mmr_backend::Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.stage_times
            .lock()
            .unwrap()
            .insert((order_id.to_string(), stage), millis);
        Ok(())
    }

    async fn get_all_stage_times(&self) -> mmr_backend::Result<HashMap<String, OrderTimes>> {
        self.check()?;
        let mut result: HashMap<String, OrderTimes> = HashMap::new();
        for ((order_id, stage), millis) in self.stage_times.lock().unwrap().iter() {
            let times = result.entry(order_id.clone()).or_default();
            times.stages.insert(*stage, *millis);
            times.users.insert(*stage, USER_ID.to_string());
            times.total += millis;
        }
        Ok(result)
    }
}

#[async_trait]
impl AuthProvider for FakeBackend {
    async fn sign_in(&self, _email: &str, _password: &str) -> mmr_backend::Result<Session> {
        self.check()?;
        Ok(mock_session())
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> mmr_backend::Result<Option<Session>> {
        self.check()?;
        Ok(None)
    }

    async fn sign_out(&self) -> mmr_backend::Result<()> {
        self.signed_out.store(true, Ordering::SeqCst);
        self.check()
    }

    fn get_session(&self) -> Option<Session> {
        (!self.signed_out.load(Ordering::SeqCst)).then(mock_session)
    }
}

/// Snapshot slot whose writes always fail, as on a full or read-only disk.
#[derive(Debug, Default)]
pub struct FailingSlot {
    write_attempts: AtomicUsize,
}

impl FailingSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

impl KeyValueSlot for FailingSlot {
    fn read(&self, _key: &str) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn write(&self, _key: &str, _value: &str) -> io::Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::other("disk full"))
    }

    fn remove(&self, _key: &str) -> io::Result<()> {
        Ok(())
    }
}

pub fn order(id: &str, number: Option<&str>, stages: &[Stage]) -> ManufacturingOrder {
    let now = Utc::now();
    ManufacturingOrder {
        id: id.to_string(),
        manufacturing_number: number.map(str::to_string),
        current_stage: stages
            .first()
            .copied()
            .map(OrderStage::from)
            .unwrap_or(OrderStage::Assembly),
        stages: stages.to_vec(),
        has_incidents: None,
        description: None,
        created_at: now,
        updated_at: now,
        user_id: USER_ID.to_string(),
    }
}

pub fn mock_session() -> Session {
    Session {
        access_token: ACCESS_TOKEN.to_string(),
        refresh_token: None,
        expires_at: Utc::now() + ChronoDuration::hours(1),
        user: User {
            id: USER_ID.to_string(),
            email: Some("operator@example.com".to_string()),
        },
    }
}

pub fn fast_options() -> CoordinatorOptions {
    CoordinatorOptions {
        tick_interval: Duration::from_millis(1),
        retry: RetryPolicy {
            attempts: 1,
            delay: Duration::from_millis(1),
        },
    }
}

/// Coordinator over the fake backend with a manual clock.
pub fn coordinator(
    backend: &Arc<FakeBackend>,
    persistence: TimerPersistence,
    clock: &ManualClock,
) -> StageCoordinator {
    StageCoordinator::new(
        backend.clone(),
        backend.clone(),
        persistence,
        Arc::new(clock.clone()),
        fast_options(),
    )
}

/// Coordinator over a real client pointed at a mock server.
pub fn http_coordinator(
    server: &MockServer,
    persistence: TimerPersistence,
    clock: &ManualClock,
) -> (BackendClient, StageCoordinator) {
    let client = BackendClient::new(&server.uri(), API_KEY).expect("client");
    client.session_manager().set_session(mock_session());
    let shared = Arc::new(client.clone());
    let coordinator = StageCoordinator::new(
        shared.clone(),
        shared,
        persistence,
        Arc::new(clock.clone()),
        fast_options(),
    );
    (client, coordinator)
}
