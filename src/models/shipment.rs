//! Shipment telemetry model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// One simulated (or ingested) telemetry snapshot for a shipment in transit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShipmentEvent {
    pub id: Uuid,
    pub reference: String,
    pub origin: String,
    pub destination: String,
    pub cargo_type: String,
    pub declared_value_usd: f64,
    pub route_deviation_km: f64,
    pub gps_gap_minutes: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipmentEvent {
    pub reference: String,
    pub origin: String,
    pub destination: String,
    pub cargo_type: String,
    pub declared_value_usd: f64,
    pub route_deviation_km: f64,
    pub gps_gap_minutes: f64,
}

impl ShipmentEvent {
    pub async fn create(pool: &PgPool, data: &CreateShipmentEvent) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ShipmentEvent>(
            r#"
            INSERT INTO shipments
                (reference, origin, destination, cargo_type,
                 declared_value_usd, route_deviation_km, gps_gap_minutes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&data.reference)
        .bind(&data.origin)
        .bind(&data.destination)
        .bind(&data.cargo_type)
        .bind(data.declared_value_usd)
        .bind(data.route_deviation_km)
        .bind(data.gps_gap_minutes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ShipmentEvent>("SELECT * FROM shipments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
