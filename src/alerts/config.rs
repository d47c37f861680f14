//! Check definition types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ConfigValue;
use crate::query::{translate, FilterNode, Scalar, TranslateError};

/// Check definition as authored in the checks file.
///
/// Durations stay as text here; they are parsed (with defaults) by the
/// scheduler and validated by the runner when the check is registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckDefinition {
    /// Unique check ID (the key in the checks file)
    #[serde(default)]
    pub id: String,
    /// Wait cadence while not alerting, e.g. `5m`
    #[serde(default)]
    pub schedule: String,
    /// Cadence while alerting
    #[serde(default)]
    pub alert_schedule: String,
    /// Only notify on the first alerting cycle of an episode
    #[serde(default)]
    pub alert_onlyonce: Option<bool>,
    /// Notify once when an alert episode ends
    #[serde(default)]
    pub alert_endmsg: Option<bool>,
    /// Per-search timeout, default 30s
    #[serde(default)]
    pub timeout: String,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub condition: AlertCondition,
    #[serde(default = "default_targets")]
    pub targets: Vec<NotifyTarget>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_targets() -> Vec<NotifyTarget> {
    vec![NotifyTarget::Log]
}

fn default_enabled() -> bool {
    true
}

impl CheckDefinition {
    /// Create a definition against an index, sorted by a field
    pub fn new(
        id: impl Into<String>,
        index: impl Into<String>,
        sort_by: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            query: QueryConfig {
                index: index.into(),
                sort_by: sort_by.into(),
                ..QueryConfig::default()
            },
            targets: default_targets(),
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = schedule.into();
        self
    }

    pub fn with_alert_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.alert_schedule = schedule.into();
        self
    }

    pub fn with_alert_onlyonce(mut self, only_once: bool) -> Self {
        self.alert_onlyonce = Some(only_once);
        self
    }

    pub fn with_alert_endmsg(mut self, end_msg: bool) -> Self {
        self.alert_endmsg = Some(end_msg);
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Set the query type and its clause block
    pub fn with_clauses(mut self, query_type: impl Into<String>, clauses: ConfigValue) -> Self {
        self.query.query_type = query_type.into();
        self.query.clauses = clauses;
        self
    }

    pub fn with_condition(mut self, condition: AlertCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Replace notification targets
    pub fn with_targets(mut self, targets: Vec<NotifyTarget>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// The `query` block of a check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// `boolfilter`, `query_string`/`querystring`, or `manual`
    #[serde(rename = "type", default)]
    pub query_type: String,
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub sort_by: String,
    /// `ASC` or `DESC` (default)
    #[serde(default)]
    pub sort_order: String,
    /// Threshold available to conditions; also the fallback search size
    #[serde(default)]
    pub limit: u64,
    /// Number of documents fetched per search
    #[serde(default)]
    pub nb_docs: u64,
    #[serde(default)]
    pub clauses: ConfigValue,
}

impl QueryConfig {
    pub fn is_manual(&self) -> bool {
        self.query_type == "manual"
    }

    /// Translate the clause block into a filter tree
    pub fn translate(&self) -> Result<FilterNode, TranslateError> {
        translate(&self.query_type, &self.clauses)
    }
}

/// Condition evaluated over a search result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertCondition {
    /// Trigger when any document matched
    #[default]
    HasHits,
    /// Trigger when nothing matched
    NoHits,
    /// Trigger when total hits > threshold (defaults to the query `limit`)
    HitsAbove {
        #[serde(default)]
        threshold: Option<u64>,
    },
    /// Trigger when total hits < threshold
    HitsBelow { threshold: u64 },
    /// Trigger when the field of the first hit > threshold
    FieldAbove { field: String, threshold: f64 },
    /// Trigger when the field of the first hit < threshold
    FieldBelow { field: String, threshold: f64 },
    /// Trigger when the field of the first hit equals value
    FieldEquals { field: String, value: Scalar },
}

impl AlertCondition {
    /// Get the field name this condition checks (if any)
    pub fn field(&self) -> Option<&str> {
        match self {
            AlertCondition::FieldAbove { field, .. }
            | AlertCondition::FieldBelow { field, .. }
            | AlertCondition::FieldEquals { field, .. } => Some(field),
            AlertCondition::HasHits
            | AlertCondition::NoHits
            | AlertCondition::HitsAbove { .. }
            | AlertCondition::HitsBelow { .. } => None,
        }
    }

    /// Fill an unset `hits_above` threshold from the query limit
    pub fn with_default_threshold(self, limit: u64) -> Self {
        match self {
            AlertCondition::HitsAbove { threshold: None } => AlertCondition::HitsAbove {
                threshold: Some(limit),
            },
            other => other,
        }
    }
}

/// Notification target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotifyTarget {
    /// Log to tracing
    Log,
    /// HTTP webhook
    Webhook {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}
