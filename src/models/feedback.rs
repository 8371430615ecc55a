//! Analyst feedback model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// One judgment per alert; re-submission overwrites the prior judgment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub risk_score_accurate: bool,
    pub attack_type_correct: bool,
    pub actual_attack_type: Option<String>,
    pub actual_risk_score: Option<f32>,
    pub notes: Option<String>,
    pub ai_risk_score: f32,
    pub ai_attack_type: Option<String>,
    pub shipment_context: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the analyst submits about a past prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackJudgment {
    pub risk_score_accurate: bool,
    pub attack_type_correct: bool,
    pub actual_attack_type: Option<String>,
    pub actual_risk_score: Option<f32>,
    pub notes: Option<String>,
}

impl FeedbackRecord {
    /// A judgment is corrective, not additive: keyed by alert_id, the
    /// second submission replaces the first.
    pub async fn upsert(
        pool: &PgPool,
        alert_id: Uuid,
        judgment: &FeedbackJudgment,
        ai_risk_score: f32,
        ai_attack_type: Option<&str>,
        shipment_context: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, FeedbackRecord>(
            r#"
            INSERT INTO feedback
                (alert_id, risk_score_accurate, attack_type_correct,
                 actual_attack_type, actual_risk_score, notes,
                 ai_risk_score, ai_attack_type, shipment_context)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (alert_id) DO UPDATE SET
                risk_score_accurate = EXCLUDED.risk_score_accurate,
                attack_type_correct = EXCLUDED.attack_type_correct,
                actual_attack_type = EXCLUDED.actual_attack_type,
                actual_risk_score = EXCLUDED.actual_risk_score,
                notes = EXCLUDED.notes,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(alert_id)
        .bind(judgment.risk_score_accurate)
        .bind(judgment.attack_type_correct)
        .bind(&judgment.actual_attack_type)
        .bind(judgment.actual_risk_score)
        .bind(&judgment.notes)
        .bind(ai_risk_score)
        .bind(ai_attack_type)
        .bind(shipment_context)
        .fetch_one(pool)
        .await
    }

    /// Most recent records first, optionally only those the analyst marked
    /// fully accurate.
    pub async fn query_recent(
        pool: &PgPool,
        limit: i64,
        only_accurate: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FeedbackRecord>(
            r#"
            SELECT * FROM feedback
            WHERE ($2 = false OR (risk_score_accurate AND attack_type_correct))
            ORDER BY updated_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(only_accurate)
        .fetch_all(pool)
        .await
    }
}
