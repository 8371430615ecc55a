//! Alert model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub shipment_id: Option<Uuid>,
    pub risk_score: f32,
    pub attack_type: Option<String>,
    pub severity: String,
    pub summary: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlert {
    pub shipment_id: Option<Uuid>,
    pub risk_score: f32,
    pub attack_type: Option<String>,
    pub severity: String,
    pub summary: String,
}

impl Alert {
    pub async fn create(pool: &PgPool, data: &CreateAlert) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Alert>(
            r#"
            INSERT INTO alerts (shipment_id, risk_score, attack_type, severity, summary)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(data.shipment_id)
        .bind(data.risk_score)
        .bind(&data.attack_type)
        .bind(&data.severity)
        .bind(&data.summary)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
