//! Persistence contract consumed by the control loop and feedback pipeline.
//!
//! The surrounding web application owns the full CRUD surface; the control
//! core only depends on this narrow read/write contract.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Alert, CreateAlert, CreateShipmentEvent, FeedbackJudgment, FeedbackRecord, Operator,
    OperatorRef, ShipmentEvent,
};

#[async_trait]
pub trait ControlStore: Send + Sync + 'static {
    /// Read of the desired-state flag, filtered to "active".
    async fn find_active_operator(&self) -> AppResult<Option<OperatorRef>>;

    /// Durable write of the desired-state flag. `NotFound` when the
    /// operator does not exist.
    async fn set_desired_state(&self, operator_id: Uuid, active: bool) -> AppResult<()>;

    async fn insert_shipment(&self, event: &CreateShipmentEvent) -> AppResult<ShipmentEvent>;

    async fn insert_alert(&self, alert: &CreateAlert) -> AppResult<Alert>;

    async fn find_alert(&self, id: Uuid) -> AppResult<Option<Alert>>;

    async fn find_shipment(&self, id: Uuid) -> AppResult<Option<ShipmentEvent>>;

    async fn upsert_feedback(
        &self,
        alert_id: Uuid,
        judgment: &FeedbackJudgment,
        ai_risk_score: f32,
        ai_attack_type: Option<&str>,
        shipment_context: &str,
    ) -> AppResult<FeedbackRecord>;

    async fn query_feedback(
        &self,
        limit: i64,
        only_accurate: bool,
    ) -> AppResult<Vec<FeedbackRecord>>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ControlStore for PgStore {
    async fn find_active_operator(&self) -> AppResult<Option<OperatorRef>> {
        Ok(Operator::find_active_simulation_operator(&self.pool).await?)
    }

    async fn set_desired_state(&self, operator_id: Uuid, active: bool) -> AppResult<()> {
        Operator::set_desired_state(&self.pool, operator_id, active).await
    }

    async fn insert_shipment(&self, event: &CreateShipmentEvent) -> AppResult<ShipmentEvent> {
        Ok(ShipmentEvent::create(&self.pool, event).await?)
    }

    async fn insert_alert(&self, alert: &CreateAlert) -> AppResult<Alert> {
        Ok(Alert::create(&self.pool, alert).await?)
    }

    async fn find_alert(&self, id: Uuid) -> AppResult<Option<Alert>> {
        Ok(Alert::find_by_id(&self.pool, id).await?)
    }

    async fn find_shipment(&self, id: Uuid) -> AppResult<Option<ShipmentEvent>> {
        Ok(ShipmentEvent::find_by_id(&self.pool, id).await?)
    }

    async fn upsert_feedback(
        &self,
        alert_id: Uuid,
        judgment: &FeedbackJudgment,
        ai_risk_score: f32,
        ai_attack_type: Option<&str>,
        shipment_context: &str,
    ) -> AppResult<FeedbackRecord> {
        Ok(FeedbackRecord::upsert(
            &self.pool,
            alert_id,
            judgment,
            ai_risk_score,
            ai_attack_type,
            shipment_context,
        )
        .await?)
    }

    async fn query_feedback(
        &self,
        limit: i64,
        only_accurate: bool,
    ) -> AppResult<Vec<FeedbackRecord>> {
        Ok(FeedbackRecord::query_recent(&self.pool, limit, only_accurate).await?)
    }
}
