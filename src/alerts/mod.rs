//! Scheduled search checks with alert lifecycles
//!
//! Each registered check runs a timer that submits evaluation cycles to the
//! shared dispatcher. A cycle searches, evaluates the check's condition and
//! feeds the outcome to the check's scheduler, which decides the next
//! cadence and whether to notify.

pub mod action;
pub mod checker;
pub mod config;
pub mod notifier;
pub mod runner;
pub mod scheduler;

pub use action::{Action, ActionError, Condition};
pub use checker::{AlertChecker, CheckStatus};
pub use config::{AlertCondition, CheckDefinition, NotifyTarget, QueryConfig};
pub use notifier::{AlertEvent, Notifier};
pub use runner::{CheckError, CheckRunner, CycleReport};
pub use scheduler::{Decision, Mode, Scheduler};
