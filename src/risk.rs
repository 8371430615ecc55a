//! Risk-analysis collaborator contract
//!
//! The real scoring model lives outside this subsystem; the control loop
//! only depends on the `RiskAnalyzer` trait. `HeuristicAnalyzer` is the
//! built-in fallback used when no model is wired in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::feedback::LearningExample;
use crate::models::CreateShipmentEvent;

/// Score above which an assessment is treated as a detected threat.
pub const ALERT_THRESHOLD: f32 = 0.5;

/// Score above which an alert is classified critical.
pub const CRITICAL_THRESHOLD: f32 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f32,
    pub attack_type: Option<String>,
    pub summary: String,
}

impl RiskAssessment {
    pub fn is_threat(&self) -> bool {
        self.risk_score >= ALERT_THRESHOLD
    }

    pub fn severity(&self) -> &'static str {
        if self.risk_score >= CRITICAL_THRESHOLD {
            "critical"
        } else if self.risk_score >= ALERT_THRESHOLD {
            "high"
        } else {
            "low"
        }
    }
}

#[async_trait]
pub trait RiskAnalyzer: Send + Sync {
    /// Assess one telemetry event. `recent_examples` carries the latest
    /// analyst-corrected predictions for calibration.
    async fn assess(
        &self,
        event: &CreateShipmentEvent,
        recent_examples: &[LearningExample],
    ) -> AppResult<RiskAssessment>;

    /// Analyzer name for logging
    fn name(&self) -> &str;
}

/// Deterministic feature-weight scoring, stand-in for the external model.
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer;

#[async_trait]
impl RiskAnalyzer for HeuristicAnalyzer {
    async fn assess(
        &self,
        event: &CreateShipmentEvent,
        recent_examples: &[LearningExample],
    ) -> AppResult<RiskAssessment> {
        let mut score: f32 = 0.0;

        // High-value cargo draws targeted attacks
        if event.declared_value_usd >= 250_000.0 {
            score += 0.35;
        } else if event.declared_value_usd >= 100_000.0 {
            score += 0.2;
        }

        // Route deviation is the strongest hijacking signal
        if event.route_deviation_km >= 50.0 {
            score += 0.4;
        } else if event.route_deviation_km >= 15.0 {
            score += 0.2;
        }

        // GPS silence precedes most theft incidents
        if event.gps_gap_minutes >= 60.0 {
            score += 0.3;
        } else if event.gps_gap_minutes >= 20.0 {
            score += 0.15;
        }

        // Calibrate against how often the analysts have upheld recent
        // predictions: a low accuracy rate tempers the score.
        let calibration = accuracy_rate(recent_examples);
        score = (score * (0.8 + 0.2 * calibration)).clamp(0.0, 1.0);

        let attack_type = if score >= ALERT_THRESHOLD {
            Some(classify(event).to_string())
        } else {
            None
        };

        let summary = match &attack_type {
            Some(kind) => format!(
                "{} risk on {} -> {}: suspected {} (score {:.2})",
                if score >= CRITICAL_THRESHOLD { "Critical" } else { "Elevated" },
                event.origin,
                event.destination,
                kind,
                score
            ),
            None => format!(
                "Routine analysis of {} -> {} (score {:.2})",
                event.origin, event.destination, score
            ),
        };

        Ok(RiskAssessment {
            risk_score: score,
            attack_type,
            summary,
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

fn accuracy_rate(examples: &[LearningExample]) -> f32 {
    if examples.is_empty() {
        return 1.0;
    }
    let accurate = examples.iter().filter(|e| e.actual_result.was_accurate).count();
    accurate as f32 / examples.len() as f32
}

fn classify(event: &CreateShipmentEvent) -> &'static str {
    if event.route_deviation_km >= 50.0 {
        "hijacking"
    } else if event.gps_gap_minutes >= 60.0 {
        "gps_jamming"
    } else if event.declared_value_usd >= 250_000.0 {
        "cargo_theft"
    } else {
        "tampering"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{ActualResult, AiPrediction};

    fn event(value: f64, deviation: f64, gap: f64) -> CreateShipmentEvent {
        CreateShipmentEvent {
            reference: "SW-TEST-1".into(),
            origin: "Rotterdam".into(),
            destination: "Hamburg".into(),
            cargo_type: "electronics".into(),
            declared_value_usd: value,
            route_deviation_km: deviation,
            gps_gap_minutes: gap,
        }
    }

    fn example(was_accurate: bool) -> LearningExample {
        LearningExample {
            scenario: serde_json::json!({}),
            ai_prediction: AiPrediction {
                risk_score: 0.5,
                attack_type: None,
            },
            actual_result: ActualResult {
                risk_score: None,
                attack_type: None,
                was_accurate,
            },
            feedback_notes: None,
        }
    }

    #[tokio::test]
    async fn quiet_shipment_scores_low() {
        let assessment = HeuristicAnalyzer
            .assess(&event(20_000.0, 2.0, 5.0), &[])
            .await
            .unwrap();
        assert!(!assessment.is_threat());
        assert!(assessment.attack_type.is_none());
    }

    #[tokio::test]
    async fn deviated_high_value_shipment_is_critical() {
        let assessment = HeuristicAnalyzer
            .assess(&event(300_000.0, 80.0, 90.0), &[])
            .await
            .unwrap();
        assert!(assessment.risk_score >= CRITICAL_THRESHOLD);
        assert_eq!(assessment.severity(), "critical");
        assert_eq!(assessment.attack_type.as_deref(), Some("hijacking"));
    }

    #[tokio::test]
    async fn inaccurate_history_tempers_score() {
        let e = event(300_000.0, 80.0, 90.0);
        let trusted = HeuristicAnalyzer.assess(&e, &[example(true)]).await.unwrap();
        let doubted = HeuristicAnalyzer
            .assess(&e, &[example(false), example(false)])
            .await
            .unwrap();
        assert!(doubted.risk_score < trusted.risk_score);
    }
}
