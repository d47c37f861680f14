//! Registry of running checks

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::action::Action;
use super::config::CheckDefinition;
use super::notifier::Notifier;
use super::runner::{CheckError, CheckRunner, CycleReport};
use super::scheduler::{Mode, Scheduler};
use crate::dispatch::{Dispatcher, WorkItem};
use crate::query::FilterNode;
use crate::search::SearchBackend;

/// Runtime state of a check, as exposed by the status API
#[derive(Debug, Clone, Serialize)]
pub struct CheckStatus {
    pub id: String,
    pub index: String,
    pub enabled: bool,
    pub mode: Mode,
    /// Epoch millis of the last completed cycle
    pub last_checked: Option<i64>,
    /// Epoch millis of the last alert notification
    pub last_triggered: Option<i64>,
    /// Epoch millis of the next scheduled cycle
    pub next_run: Option<i64>,
    pub last_hits: Option<u64>,
    /// Consecutive cycles where the condition held
    pub consecutive_alerting: u64,
    pub alerts_sent: u64,
    pub cycles: u64,
    pub last_error: Option<String>,
}

impl CheckStatus {
    fn new(definition: &CheckDefinition) -> Self {
        Self {
            id: definition.id.clone(),
            index: definition.query.index.clone(),
            enabled: definition.enabled,
            mode: Mode::Normal,
            last_checked: None,
            last_triggered: None,
            next_run: None,
            last_hits: None,
            consecutive_alerting: 0,
            alerts_sent: 0,
            cycles: 0,
            last_error: None,
        }
    }

    fn record(&mut self, scheduler: &Scheduler, report: &CycleReport) {
        let now = chrono::Utc::now().timestamp_millis();

        self.last_checked = Some(now);
        self.next_run = Some(now + report.decision.delay.as_millis() as i64);
        self.cycles += 1;
        self.mode = scheduler.mode();
        self.last_hits = report.total_hits;

        if report.condition_met {
            self.consecutive_alerting += 1;
        } else {
            self.consecutive_alerting = 0;
        }

        if report.decision.alert {
            self.last_triggered = Some(now);
            self.alerts_sent += 1;
        }

        self.last_error = report
            .error
            .as_ref()
            .map(|e| e.to_string())
            .or_else(|| report.action_errors.first().map(|e| e.to_string()));
    }
}

struct CheckEntry {
    definition: CheckDefinition,
    status: Arc<RwLock<CheckStatus>>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

/// Owns the registered checks and their timer tasks
pub struct AlertChecker {
    checks: RwLock<HashMap<String, CheckEntry>>,
    backend: Arc<dyn SearchBackend>,
    dispatcher: Arc<Dispatcher>,
}

impl AlertChecker {
    pub fn new(backend: Arc<dyn SearchBackend>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            checks: RwLock::new(HashMap::new()),
            backend,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Register a check notifying its configured targets
    pub fn register(&self, definition: CheckDefinition) -> Result<(), CheckError> {
        if definition.query.is_manual() {
            return Err(CheckError::InvalidCheckConfig(format!(
                "check '{}': manual queries are registered with register_with_query",
                definition.id
            )));
        }

        let action: Arc<dyn Action> = Arc::new(Notifier::new(definition.targets.clone()));
        let runner = CheckRunner::new(definition, Arc::clone(&self.backend), action)?;
        self.register_runner(runner)
    }

    /// Register a check whose query is supplied in code
    pub fn register_with_query(
        &self,
        definition: CheckDefinition,
        query: FilterNode,
    ) -> Result<(), CheckError> {
        let action: Arc<dyn Action> = Arc::new(Notifier::new(definition.targets.clone()));
        let runner = CheckRunner::with_query(definition, query, Arc::clone(&self.backend), action)?;
        self.register_runner(runner)
    }

    /// Register a prepared runner; its timer starts unless the check is disabled
    pub fn register_runner(&self, runner: CheckRunner) -> Result<(), CheckError> {
        if self.dispatcher.is_stopped() {
            return Err(crate::dispatch::DispatchError::Stopped.into());
        }

        let mut checks = self.checks.write();
        let id = runner.id().to_string();
        if checks.contains_key(&id) {
            return Err(CheckError::AlreadyRegistered(id));
        }

        let definition = runner.definition().clone();
        let status = Arc::new(RwLock::new(CheckStatus::new(&definition)));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = if definition.enabled {
            Some(tokio::spawn(run_timer(
                Arc::new(runner),
                Arc::clone(&self.dispatcher),
                Arc::clone(&status),
                stop_rx,
            )))
        } else {
            tracing::info!(check_id = %id, "Check disabled, not scheduled");
            None
        };

        tracing::info!(
            check_id = %id,
            index = %definition.query.index,
            schedule = %definition.schedule,
            "Check registered"
        );

        checks.insert(
            id,
            CheckEntry {
                definition,
                status,
                stop_tx,
                task,
            },
        );
        Ok(())
    }

    /// Remove a check; its timer exits after any in-flight cycle
    pub fn unregister(&self, id: &str) -> Option<CheckDefinition> {
        let entry = self.checks.write().remove(id)?;
        let _ = entry.stop_tx.send(true);
        tracing::info!(check_id = %id, "Check unregistered");
        Some(entry.definition)
    }

    pub fn get(&self, id: &str) -> Option<CheckStatus> {
        let checks = self.checks.read();
        checks.get(id).map(|entry| entry.status.read().clone())
    }

    pub fn definition(&self, id: &str) -> Option<CheckDefinition> {
        let checks = self.checks.read();
        checks.get(id).map(|entry| entry.definition.clone())
    }

    /// All statuses, ordered by check id
    pub fn list(&self) -> Vec<CheckStatus> {
        let checks = self.checks.read();
        let mut statuses: Vec<CheckStatus> =
            checks.values().map(|entry| entry.status.read().clone()).collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    pub fn len(&self) -> usize {
        self.checks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.read().is_empty()
    }

    /// Stop every timer and wait for them to exit
    pub async fn shutdown(&self) {
        let tasks: Vec<(String, JoinHandle<()>)> = {
            let mut checks = self.checks.write();
            checks
                .drain()
                .filter_map(|(id, mut entry)| {
                    let _ = entry.stop_tx.send(true);
                    entry.task.take().map(|task| (id, task))
                })
                .collect()
        };

        for (id, task) in tasks {
            if let Err(e) = task.await {
                tracing::error!(check_id = %id, error = %e, "Check timer failed");
            }
        }

        tracing::info!("Alert checker shut down");
    }
}

/// Timer loop of one check: sleep, submit a cycle, take the scheduler back
async fn run_timer(
    runner: Arc<CheckRunner>,
    dispatcher: Arc<Dispatcher>,
    status: Arc<RwLock<CheckStatus>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut scheduler = Scheduler::new(runner.definition());

    loop {
        if *stop_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep_until(scheduler.next_fire()) => {}
            _ = stop_rx.changed() => break,
        }

        let (done_tx, done_rx) = oneshot::channel();
        let cycle_runner = Arc::clone(&runner);
        let mut cycle_scheduler = scheduler;
        let item = WorkItem::new(runner.id(), async move {
            let report = cycle_runner.run_cycle(&mut cycle_scheduler).await;
            let _ = done_tx.send((cycle_scheduler, report));
        });

        if let Err(e) = dispatcher.submit(item) {
            tracing::warn!(check_id = %runner.id(), error = %e, "Check timer stopping");
            break;
        }

        scheduler = match done_rx.await {
            Ok((returned, report)) => {
                status.write().record(&returned, &report);
                returned
            }
            Err(_) => {
                if dispatcher.is_stopped() {
                    tracing::info!(
                        check_id = %runner.id(),
                        "Dispatcher stopped, check timer exiting"
                    );
                    break;
                }

                tracing::error!(check_id = %runner.id(), "Check cycle lost, rescheduling");
                let mut fresh = Scheduler::new(runner.definition());
                fresh.postpone(fresh.wait_cadence());

                let mut status = status.write();
                status.mode = fresh.mode();
                status.consecutive_alerting = 0;
                status.last_error = Some("check cycle lost".to_string());
                fresh
            }
        };
    }

    tracing::debug!(check_id = %runner.id(), "Check timer stopped");
}
