/*
[INPUT]:  Order id, stage and committed milliseconds
[OUTPUT]: Upserted stage time rows and per-order aggregates
[POS]:    HTTP layer - stage time endpoints (require session)
[UPDATE]: When stage time schema or aggregation changes
*/

// ### Stage Time Endpoints

use std::collections::HashMap;

use reqwest::Method;
use tracing::debug;

use crate::http::{BackendClient, Result};
use crate::types::{
    NewStageTimeRequest, OrderTimes, Stage, StageTimeRecord, UpdateStageTimeRequest,
};

const STAGE_TIMES_TABLE: &str = "stage_times";

impl BackendClient {
    /// Record the time for an order's stage. The latest write wins.
    ///
    /// GET   /rest/v1/stage_times?order_id=eq.{id}&stage=eq.{stage}
    /// PATCH /rest/v1/stage_times?order_id=eq.{id}&stage=eq.{stage}  (existing row)
    /// POST  /rest/v1/stage_times                                     (new row)
    pub async fn save_stage_time(&self, order_id: &str, stage: Stage, millis: i64) -> Result<()> {
        let session = self.require_session()?;
        let filter = [
            ("order_id", format!("eq.{order_id}")),
            ("stage", format!("eq.{stage}")),
        ];

        let mut lookup = vec![("select", "*".to_string())];
        lookup.extend(filter.iter().cloned());
        let url = self.rest_url(STAGE_TIMES_TABLE, &lookup)?;
        let builder = self.rest_request(Method::GET, url)?;
        let existing: Vec<StageTimeRecord> = self.send_json(builder).await?;

        if existing.is_empty() {
            let body = vec![NewStageTimeRequest {
                order_id: order_id.to_string(),
                stage,
                time_ms: millis,
                user_id: session.user.id,
            }];
            let url = self.rest_url(STAGE_TIMES_TABLE, &[])?;
            let builder = self.rest_request(Method::POST, url)?.json(&body);
            self.send_empty(builder).await?;
            debug!(order_id, stage = %stage, millis, "stage time inserted");
        } else {
            let body = UpdateStageTimeRequest {
                time_ms: millis,
                user_id: session.user.id,
            };
            let url = self.rest_url(STAGE_TIMES_TABLE, &filter)?;
            let builder = self.rest_request(Method::PATCH, url)?.json(&body);
            self.send_empty(builder).await?;
            debug!(order_id, stage = %stage, millis, "stage time updated");
        }

        Ok(())
    }

    /// Fetch every stage time row and aggregate it per order
    ///
    /// GET /rest/v1/stage_times?select=id,order_id,stage,time_ms,user_id
    pub async fn get_all_stage_times(&self) -> Result<HashMap<String, OrderTimes>> {
        let url = self.rest_url(
            STAGE_TIMES_TABLE,
            &[("select", "id,order_id,stage,time_ms,user_id".to_string())],
        )?;
        let builder = self.rest_request(Method::GET, url)?;
        let records: Vec<StageTimeRecord> = self.send_json(builder).await?;
        Ok(OrderTimes::aggregate(&records))
    }
}
