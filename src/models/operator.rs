//! Operator model and desired-state flag

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Operator {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub simulation_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of an operator the control loop cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OperatorRef {
    pub id: Uuid,
    pub email: String,
}

impl Operator {
    /// The operator whose desired-state flag is set, if any.
    ///
    /// `set_desired_state` keeps at most one flag set, so `fetch_optional`
    /// is safe; ordering breaks ties if legacy data violates that.
    pub async fn find_active_simulation_operator(
        pool: &PgPool,
    ) -> Result<Option<OperatorRef>, sqlx::Error> {
        sqlx::query_as::<_, OperatorRef>(
            r#"
            SELECT id, email FROM operators
            WHERE simulation_active = true
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await
    }

    /// Write the durable desired-state flag. Activation clears the flag on
    /// every other operator so at most one is ever active.
    ///
    /// The operator row must exist: a flag write against an unknown id is
    /// `NotFound`, not a silent no-op, so callers never act on intent that
    /// was never persisted.
    pub async fn set_desired_state(
        pool: &PgPool,
        operator_id: Uuid,
        active: bool,
    ) -> AppResult<()> {
        let mut tx = pool.begin().await?;

        if active {
            sqlx::query(
                "UPDATE operators SET simulation_active = false, updated_at = NOW() \
                 WHERE simulation_active = true AND id <> $1",
            )
            .bind(operator_id)
            .execute(&mut *tx)
            .await?;
        }

        let result = sqlx::query(
            "UPDATE operators SET simulation_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(operator_id)
        .bind(active)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("operator {}", operator_id)));
        }

        tx.commit().await?;
        Ok(())
    }
}
