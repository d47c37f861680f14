//! One evaluation cycle of a check

use std::sync::Arc;
use std::time::Duration;

use super::action::{Action, ActionError, Condition};
use super::config::CheckDefinition;
use super::scheduler::{Decision, Scheduler};
use crate::dispatch::DispatchError;
use crate::query::{FilterNode, TranslateError};
use crate::search::{SearchBackend, SearchError, SearchRequest, SearchResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SIZE: usize = 10;

/// Outcome of one cycle, used to update the check's status
#[derive(Debug)]
pub struct CycleReport {
    pub condition_met: bool,
    pub decision: Decision,
    pub total_hits: Option<u64>,
    /// Search failure or timeout; the cycle counted as condition-not-met
    pub error: Option<CheckError>,
    pub action_errors: Vec<ActionError>,
}

/// Executes a check's query and drives its alert lifecycle
pub struct CheckRunner {
    definition: CheckDefinition,
    query: FilterNode,
    timeout: Duration,
    sort_ascending: bool,
    size: usize,
    backend: Arc<dyn SearchBackend>,
    condition: Arc<dyn Condition>,
    action: Arc<dyn Action>,
}

impl CheckRunner {
    /// Validate a definition and translate its query
    pub fn new(
        definition: CheckDefinition,
        backend: Arc<dyn SearchBackend>,
        action: Arc<dyn Action>,
    ) -> Result<Self, CheckError> {
        let params = SearchParams::from_definition(&definition)?;
        let query = definition.query.translate()?;
        Ok(Self::build(definition, query, params, backend, action))
    }

    /// Validate a definition whose query is built in code (`manual` checks)
    pub fn with_query(
        definition: CheckDefinition,
        query: FilterNode,
        backend: Arc<dyn SearchBackend>,
        action: Arc<dyn Action>,
    ) -> Result<Self, CheckError> {
        let params = SearchParams::from_definition(&definition)?;
        Ok(Self::build(definition, query, params, backend, action))
    }

    fn build(
        definition: CheckDefinition,
        query: FilterNode,
        params: SearchParams,
        backend: Arc<dyn SearchBackend>,
        action: Arc<dyn Action>,
    ) -> Self {
        let condition = Arc::new(
            definition
                .condition
                .clone()
                .with_default_threshold(definition.query.limit),
        );

        Self {
            definition,
            query,
            timeout: params.timeout,
            sort_ascending: params.sort_ascending,
            size: params.size,
            backend,
            condition,
            action,
        }
    }

    /// Replace the condition derived from the definition
    pub fn with_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.condition = condition;
        self
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &CheckDefinition {
        &self.definition
    }

    pub fn query(&self) -> &FilterNode {
        &self.query
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn sort_ascending(&self) -> bool {
        self.sort_ascending
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The search issued every cycle
    pub fn request(&self) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            index: self.definition.query.index.clone(),
            sort_by: self.definition.query.sort_by.clone(),
            sort_ascending: self.sort_ascending,
            size: self.size,
            timeout: self.timeout,
        }
    }

    /// Run the search within the timeout and evaluate the condition
    pub async fn evaluate(&self) -> Result<(bool, SearchResult), CheckError> {
        let request = self.request();
        let result = tokio::time::timeout(self.timeout, self.backend.search(&request))
            .await
            .map_err(|_| SearchError::Timeout(self.timeout))??;

        let met = self.condition.evaluate(&result);
        Ok((met, result))
    }

    /// Execute one cycle: search, decide, then call the action hooks
    pub async fn run_cycle(&self, scheduler: &mut Scheduler) -> CycleReport {
        let (condition_met, result, error) = match self.evaluate().await {
            Ok((met, result)) => (met, Some(result), None),
            Err(e) => {
                tracing::error!(check_id = %self.id(), error = %e, "Check execution failed");
                (false, None, Some(e))
            }
        };

        let decision = scheduler.on_check_result(condition_met);
        let mut action_errors = Vec::new();

        if decision.alert {
            if let Some(result) = &result {
                let message = self.condition.describe(result);
                if let Err(e) = self.action.on_condition_met(self.id(), result, &message).await {
                    tracing::error!(check_id = %self.id(), error = %e, "Alert action failed");
                    action_errors.push(e);
                }
            }
        }

        if decision.end_message {
            if let Err(e) = self.action.on_alert_end(self.id()).await {
                tracing::error!(check_id = %self.id(), error = %e, "Alert end action failed");
                action_errors.push(e);
            }
        }

        tracing::debug!(
            check_id = %self.id(),
            condition_met,
            alert = decision.alert,
            next_in = ?decision.delay,
            "Check cycle complete"
        );

        CycleReport {
            condition_met,
            decision,
            total_hits: result.map(|r| r.total),
            error,
            action_errors,
        }
    }
}

/// Search parameters validated from a definition
#[derive(Debug, Clone, PartialEq)]
struct SearchParams {
    timeout: Duration,
    sort_ascending: bool,
    size: usize,
}

impl SearchParams {
    fn from_definition(definition: &CheckDefinition) -> Result<Self, CheckError> {
        let query = &definition.query;

        if query.index.trim().is_empty() {
            return Err(CheckError::InvalidCheckConfig(format!(
                "check '{}': missing index",
                definition.id
            )));
        }
        if query.sort_by.trim().is_empty() {
            return Err(CheckError::InvalidCheckConfig(format!(
                "check '{}': missing sort_by",
                definition.id
            )));
        }

        let timeout = if definition.timeout.trim().is_empty() {
            DEFAULT_TIMEOUT
        } else {
            humantime::parse_duration(definition.timeout.trim()).map_err(|e| {
                CheckError::InvalidCheckConfig(format!(
                    "check '{}': invalid timeout '{}': {}",
                    definition.id, definition.timeout, e
                ))
            })?
        };

        let size = match (query.nb_docs, query.limit) {
            (n, _) if n > 0 => n as usize,
            (_, l) if l > 0 => l as usize,
            _ => DEFAULT_SIZE,
        };

        Ok(Self {
            timeout,
            sort_ascending: query.sort_order.eq_ignore_ascii_case("ASC"),
            size,
        })
    }
}

/// Check registration and execution errors
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Invalid check config: {0}")]
    InvalidCheckConfig(String),

    #[error("Translation error: {0}")]
    Translation(#[from] TranslateError),

    #[error("Execution error: {0}")]
    Execution(#[from] SearchError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Check '{0}' already registered")]
    AlreadyRegistered(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
