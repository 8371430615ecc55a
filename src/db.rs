//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Operators (analysts / dispatchers); simulation_active is the single
-- canonical desired-state flag for continuous simulation.
CREATE TABLE IF NOT EXISTS operators (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    email VARCHAR(255) NOT NULL UNIQUE,
    name VARCHAR(255),
    simulation_active BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
);

-- Shipments (telemetry snapshots written per simulation tick)
CREATE TABLE IF NOT EXISTS shipments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    reference VARCHAR(64) NOT NULL,
    origin VARCHAR(255) NOT NULL,
    destination VARCHAR(255) NOT NULL,
    cargo_type VARCHAR(100) NOT NULL,
    declared_value_usd DOUBLE PRECISION NOT NULL,
    route_deviation_km DOUBLE PRECISION NOT NULL,
    gps_gap_minutes DOUBLE PRECISION NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'in_transit',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Alerts (risk-analysis output per shipment)
CREATE TABLE IF NOT EXISTS alerts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    shipment_id UUID REFERENCES shipments(id) ON DELETE CASCADE,
    risk_score REAL NOT NULL,
    attack_type VARCHAR(100),
    severity VARCHAR(20) NOT NULL,
    summary TEXT NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'open',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Analyst feedback on past AI predictions (one judgment per alert)
CREATE TABLE IF NOT EXISTS feedback (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    alert_id UUID NOT NULL UNIQUE REFERENCES alerts(id) ON DELETE CASCADE,
    risk_score_accurate BOOLEAN NOT NULL,
    attack_type_correct BOOLEAN NOT NULL,
    actual_attack_type VARCHAR(100),
    actual_risk_score REAL,
    notes TEXT,
    ai_risk_score REAL NOT NULL,
    ai_attack_type VARCHAR(100),
    shipment_context TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_operators_sim_active ON operators(simulation_active);
CREATE INDEX IF NOT EXISTS idx_alerts_shipment ON alerts(shipment_id);
CREATE INDEX IF NOT EXISTS idx_alerts_created ON alerts(created_at);
CREATE INDEX IF NOT EXISTS idx_feedback_created ON feedback(created_at);
"#;
