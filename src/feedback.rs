//! Feedback-driven learning-example aggregator
//!
//! Turns analyst corrections on past AI predictions into a replayable
//! training corpus for the risk model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Alert, FeedbackJudgment, FeedbackRecord};
use crate::store::ControlStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiPrediction {
    pub risk_score: f32,
    pub attack_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualResult {
    pub risk_score: Option<f32>,
    pub attack_type: Option<String>,
    pub was_accurate: bool,
}

/// Derived pairing of an original prediction with its corrected ground
/// truth. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningExample {
    pub scenario: serde_json::Value,
    pub ai_prediction: AiPrediction,
    pub actual_result: ActualResult,
    pub feedback_notes: Option<String>,
}

pub struct FeedbackAggregator {
    store: Arc<dyn ControlStore>,
}

impl FeedbackAggregator {
    pub fn new(store: Arc<dyn ControlStore>) -> Self {
        Self { store }
    }

    /// Record an analyst judgment on an alert. Fails with `NotFound` when
    /// the alert does not exist; a second submission for the same alert
    /// overwrites the first.
    pub async fn submit(
        &self,
        alert_id: Uuid,
        judgment: FeedbackJudgment,
    ) -> AppResult<FeedbackRecord> {
        let alert = self
            .store
            .find_alert(alert_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("alert {}", alert_id)))?;

        let context = self.snapshot_context(&alert).await?;

        self.store
            .upsert_feedback(
                alert_id,
                &judgment,
                alert.risk_score,
                alert.attack_type.as_deref(),
                &context,
            )
            .await
    }

    /// Freeze the shipment context at judgment time so the learning example
    /// reflects what the model actually saw.
    async fn snapshot_context(&self, alert: &Alert) -> AppResult<String> {
        let scenario = match alert.shipment_id {
            Some(shipment_id) => match self.store.find_shipment(shipment_id).await? {
                Some(shipment) => serde_json::to_value(&shipment),
                None => serde_json::to_value(alert),
            },
            None => serde_json::to_value(alert),
        }
        .map_err(|e| AppError::MalformedRecord(e.to_string()))?;

        Ok(scenario.to_string())
    }

    /// Reshape up to `limit` most-recent judgments into learning examples,
    /// newest first. A record whose stored context no longer parses is
    /// skipped; one bad historical row must not block the rest.
    pub async fn build_learning_examples(
        &self,
        limit: i64,
        only_accurate: bool,
    ) -> AppResult<Vec<LearningExample>> {
        let records = self.store.query_feedback(limit, only_accurate).await?;

        let examples = records
            .into_iter()
            .filter_map(|record| match example_from_record(&record) {
                Ok(example) => Some(example),
                Err(e) => {
                    tracing::warn!(
                        alert_id = %record.alert_id,
                        error = %e,
                        "skipping feedback record with unparseable context"
                    );
                    None
                }
            })
            .collect();

        Ok(examples)
    }
}

fn example_from_record(record: &FeedbackRecord) -> AppResult<LearningExample> {
    let scenario: serde_json::Value = serde_json::from_str(&record.shipment_context)
        .map_err(|e| AppError::MalformedRecord(e.to_string()))?;

    Ok(LearningExample {
        scenario,
        ai_prediction: AiPrediction {
            risk_score: record.ai_risk_score,
            attack_type: record.ai_attack_type.clone(),
        },
        actual_result: ActualResult {
            risk_score: record.actual_risk_score,
            attack_type: record.actual_attack_type.clone(),
            was_accurate: record.risk_score_accurate && record.attack_type_correct,
        },
        feedback_notes: record.notes.clone(),
    })
}
