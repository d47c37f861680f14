//! Collaborators invoked by a check cycle

use async_trait::async_trait;

use super::config::AlertCondition;
use crate::search::{matcher, SearchResult};

/// Boolean predicate over a search result
pub trait Condition: Send + Sync {
    fn evaluate(&self, result: &SearchResult) -> bool;

    /// Human-readable outcome used in notifications
    fn describe(&self, result: &SearchResult) -> String {
        format!("{} documents matched", result.total)
    }
}

impl<F> Condition for F
where
    F: Fn(&SearchResult) -> bool + Send + Sync,
{
    fn evaluate(&self, result: &SearchResult) -> bool {
        self(result)
    }
}

impl Condition for AlertCondition {
    fn evaluate(&self, result: &SearchResult) -> bool {
        match self {
            AlertCondition::HasHits => result.total > 0,
            AlertCondition::NoHits => result.total == 0,
            AlertCondition::HitsAbove { threshold } => result.total > threshold.unwrap_or(0),
            AlertCondition::HitsBelow { threshold } => result.total < *threshold,
            AlertCondition::FieldAbove { field, threshold } => {
                first_numeric(result, field).map(|v| v > *threshold).unwrap_or(false)
            }
            AlertCondition::FieldBelow { field, threshold } => {
                first_numeric(result, field).map(|v| v < *threshold).unwrap_or(false)
            }
            AlertCondition::FieldEquals { field, value } => result
                .first()
                .and_then(|hit| hit.field(field))
                .map(|v| matcher::scalar_eq(v, value))
                .unwrap_or(false),
        }
    }

    fn describe(&self, result: &SearchResult) -> String {
        match self {
            AlertCondition::HasHits | AlertCondition::NoHits => {
                format!("Query returned {} documents", result.total)
            }
            AlertCondition::HitsAbove { threshold } => format!(
                "Hit count {} vs threshold {}",
                result.total,
                threshold.unwrap_or(0)
            ),
            AlertCondition::HitsBelow { threshold } => {
                format!("Hit count {} vs threshold {}", result.total, threshold)
            }
            AlertCondition::FieldAbove { field, threshold }
            | AlertCondition::FieldBelow { field, threshold } => {
                match first_numeric(result, field) {
                    Some(v) => format!("{} = {} vs threshold {}", field, v, threshold),
                    None => format!("{} missing or not numeric", field),
                }
            }
            AlertCondition::FieldEquals { field, value } => {
                format!("{} compared to {}", field, value)
            }
        }
    }
}

/// Numeric value of a field on the first hit
fn first_numeric(result: &SearchResult, field: &str) -> Option<f64> {
    let value = result.first()?.field(field)?;
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Side effects of an alert lifecycle
#[async_trait]
pub trait Action: Send + Sync {
    /// Called when the scheduler decides to alert
    async fn on_condition_met(
        &self,
        check_id: &str,
        result: &SearchResult,
        message: &str,
    ) -> Result<(), ActionError>;

    /// Called once when an alert episode ends
    async fn on_alert_end(&self, check_id: &str) -> Result<(), ActionError>;
}

/// Action errors
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Action failed: {0}")]
    Failed(String),

    #[error("Multiple notification failures: {0:?}")]
    Multiple(Vec<ActionError>),
}
