/*
[INPUT]:  Order identifiers, manufacturing numbers and stage updates
[OUTPUT]: Manufacturing order rows
[POS]:    HTTP layer - manufacturing order endpoints (require session)
[UPDATE]: When adding new order endpoints or changing filters
*/

// ### Order Endpoints

use chrono::Utc;
use reqwest::Method;
use tracing::{debug, info};

use crate::http::{BackendClient, BackendError, Result};
use crate::types::{
    IdRow, ManufacturingOrder, NewOrderRequest, OrderStage, Stage, UpdateOrderNumberRequest,
    UpdateOrderStageRequest,
};

const ORDERS_TABLE: &str = "manufacturing_orders";
const STAGE_TIMES_TABLE: &str = "stage_times";
const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

impl BackendClient {
    /// Create an order. Passing `None` creates an ad-hoc task.
    ///
    /// GET  /rest/v1/manufacturing_orders?select=id&manufacturing_number=eq.{number}
    /// POST /rest/v1/manufacturing_orders
    pub async fn create_order(
        &self,
        number: Option<&str>,
        stages: &[Stage],
    ) -> Result<ManufacturingOrder> {
        let session = self.require_session()?;
        let number = number.map(str::trim).filter(|number| !number.is_empty());

        if let Some(number) = number {
            if self.number_in_use(number, None).await? {
                return Err(BackendError::DuplicateIdentifier {
                    number: number.to_string(),
                });
            }
        }

        let first_stage = stages.first().copied().unwrap_or(Stage::ACTIVE);
        let body = vec![NewOrderRequest {
            manufacturing_number: number.map(str::to_string),
            current_stage: OrderStage::from(first_stage),
            stages: stages.to_vec(),
            user_id: session.user.id,
        }];

        let url = self.rest_url(ORDERS_TABLE, &[])?;
        let builder = self
            .rest_request(Method::POST, url)?
            .header("Prefer", "return=representation")
            .json(&body);

        let rows: Vec<ManufacturingOrder> =
            self.send_json(builder).await.map_err(|err| match number {
                Some(number) if err.is_duplicate_key() => BackendError::DuplicateIdentifier {
                    number: number.to_string(),
                },
                _ => err,
            })?;

        let order = rows.into_iter().next().ok_or_else(|| {
            BackendError::InvalidResponse("order insert returned no rows".to_string())
        })?;
        info!(order_id = %order.id, number = ?order.manufacturing_number, "order created");
        Ok(order)
    }

    /// Move an order to a new stage, optionally recording the completion report
    ///
    /// PATCH /rest/v1/manufacturing_orders?id=eq.{order_id}
    pub async fn update_order_stage(
        &self,
        order_id: &str,
        stage: OrderStage,
        has_incidents: Option<bool>,
        description: Option<&str>,
    ) -> Result<()> {
        let body = UpdateOrderStageRequest {
            current_stage: stage,
            updated_at: Utc::now(),
            has_incidents,
            description: description.map(str::to_string),
        };

        let url = self.rest_url(ORDERS_TABLE, &[("id", format!("eq.{order_id}"))])?;
        let builder = self
            .rest_request(Method::PATCH, url)?
            .header("Prefer", "return=representation")
            .json(&body);

        let rows: Vec<ManufacturingOrder> = self.send_json(builder).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound {
                resource: "order",
                id: order_id.to_string(),
            });
        }
        debug!(order_id, stage = %stage, "order stage updated");
        Ok(())
    }

    /// Change the manufacturing number of an existing order
    ///
    /// PATCH /rest/v1/manufacturing_orders?id=eq.{order_id}
    pub async fn update_order_number(
        &self,
        order_id: &str,
        number: &str,
    ) -> Result<ManufacturingOrder> {
        let number = number.trim();
        if number.is_empty() {
            return Err(BackendError::Config(
                "manufacturing number must not be empty".to_string(),
            ));
        }
        if self.number_in_use(number, Some(order_id)).await? {
            return Err(BackendError::DuplicateIdentifier {
                number: number.to_string(),
            });
        }

        let body = UpdateOrderNumberRequest {
            manufacturing_number: number.to_string(),
            updated_at: Utc::now(),
        };
        let url = self.rest_url(ORDERS_TABLE, &[("id", format!("eq.{order_id}"))])?;
        let builder = self
            .rest_request(Method::PATCH, url)?
            .header("Prefer", "return=representation")
            .json(&body);

        let rows: Vec<ManufacturingOrder> =
            self.send_json(builder).await.map_err(|err| {
                if err.is_duplicate_key() {
                    BackendError::DuplicateIdentifier {
                        number: number.to_string(),
                    }
                } else {
                    err
                }
            })?;

        rows.into_iter().next().ok_or_else(|| BackendError::NotFound {
            resource: "order",
            id: order_id.to_string(),
        })
    }

    /// List all orders, newest first
    ///
    /// GET /rest/v1/manufacturing_orders?select=*&order=created_at.desc
    pub async fn list_orders(&self) -> Result<Vec<ManufacturingOrder>> {
        let url = self.rest_url(
            ORDERS_TABLE,
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        )?;
        let builder = self.rest_request(Method::GET, url)?;
        self.send_json(builder).await
    }

    /// Delete one order together with its stage times
    ///
    /// DELETE /rest/v1/stage_times?order_id=eq.{order_id}
    /// DELETE /rest/v1/manufacturing_orders?id=eq.{order_id}
    pub async fn delete_order(&self, order_id: &str) -> Result<()> {
        let url = self.rest_url(STAGE_TIMES_TABLE, &[("order_id", format!("eq.{order_id}"))])?;
        let builder = self.rest_request(Method::DELETE, url)?;
        self.send_empty(builder).await?;

        let url = self.rest_url(ORDERS_TABLE, &[("id", format!("eq.{order_id}"))])?;
        let builder = self.rest_request(Method::DELETE, url)?;
        self.send_empty(builder).await?;

        info!(order_id, "order deleted");
        Ok(())
    }

    /// Delete every order. Stage times go first because they reference orders.
    pub async fn delete_all_orders(&self) -> Result<()> {
        let url = self.rest_url(ORDERS_TABLE, &[("select", "id".to_string())])?;
        let builder = self.rest_request(Method::GET, url)?;
        let rows: Vec<IdRow> = self.send_json(builder).await?;
        if rows.is_empty() {
            return Ok(());
        }

        let ids = rows
            .iter()
            .map(|row| row.id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let url = self.rest_url(STAGE_TIMES_TABLE, &[("order_id", format!("in.({ids})"))])?;
        let builder = self.rest_request(Method::DELETE, url)?;
        self.send_empty(builder).await?;

        let url = self.rest_url(ORDERS_TABLE, &[("id", format!("neq.{NIL_UUID}"))])?;
        let builder = self.rest_request(Method::DELETE, url)?;
        self.send_empty(builder).await?;

        info!(count = rows.len(), "all orders deleted");
        Ok(())
    }

    async fn number_in_use(&self, number: &str, except_id: Option<&str>) -> Result<bool> {
        let url = self.rest_url(
            ORDERS_TABLE,
            &[
                ("select", "id".to_string()),
                ("manufacturing_number", format!("eq.{number}")),
            ],
        )?;
        let builder = self.rest_request(Method::GET, url)?;
        let rows: Vec<IdRow> = self.send_json(builder).await?;
        Ok(rows.iter().any(|row| Some(row.id.as_str()) != except_id))
    }
}
