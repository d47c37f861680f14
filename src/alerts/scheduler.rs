//! Per-check cadence and alert repetition state machine

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::config::CheckDefinition;

/// Cadence used when a schedule string is empty or unparsable
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(10 * 60);

/// Alerting mode of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    Alerting,
}

/// What the check should do after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Delay before the next cycle
    pub delay: Duration,
    /// Invoke the action's condition-met hook
    pub alert: bool,
    /// Invoke the action's alert-end hook
    pub end_message: bool,
}

/// Scheduler for one check
#[derive(Debug, Clone)]
pub struct Scheduler {
    wait_cadence: Duration,
    alert_cadence: Duration,
    alert_only_once: bool,
    alert_end_message: bool,
    mode: Mode,
    already_alerted: bool,
    next_fire: Instant,
}

impl Scheduler {
    /// Initialize from a definition; the first cycle fires immediately
    pub fn new(definition: &CheckDefinition) -> Self {
        let wait_cadence = parse_cadence(&definition.schedule).unwrap_or_else(|| {
            tracing::debug!(
                check_id = %definition.id,
                schedule = %definition.schedule,
                "Using default wait cadence"
            );
            DEFAULT_CADENCE
        });
        // An invalid alert cadence does not inherit the wait cadence
        let alert_cadence = parse_cadence(&definition.alert_schedule).unwrap_or(DEFAULT_CADENCE);

        Self {
            wait_cadence,
            alert_cadence,
            alert_only_once: definition.alert_onlyonce.unwrap_or(true),
            alert_end_message: definition.alert_endmsg.unwrap_or(false),
            mode: Mode::Normal,
            already_alerted: false,
            next_fire: Instant::now(),
        }
    }

    /// Advance the state machine with a cycle outcome
    pub fn on_check_result(&mut self, condition_met: bool) -> Decision {
        let decision = match (self.mode, condition_met) {
            (Mode::Normal, false) => Decision {
                delay: self.wait_cadence,
                alert: false,
                end_message: false,
            },
            (Mode::Normal, true) => {
                self.mode = Mode::Alerting;
                self.already_alerted = true;
                Decision {
                    delay: self.alert_cadence,
                    alert: true,
                    end_message: false,
                }
            }
            (Mode::Alerting, true) => {
                let repeat = !(self.alert_only_once && self.already_alerted);
                self.already_alerted = true;
                Decision {
                    delay: self.alert_cadence,
                    alert: repeat,
                    end_message: false,
                }
            }
            (Mode::Alerting, false) => {
                self.mode = Mode::Normal;
                self.already_alerted = false;
                Decision {
                    delay: self.wait_cadence,
                    alert: false,
                    end_message: self.alert_end_message,
                }
            }
        };

        self.next_fire = Instant::now() + decision.delay;
        decision
    }

    /// Push the next cycle out without changing state
    pub fn postpone(&mut self, delay: Duration) {
        self.next_fire = Instant::now() + delay;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn already_alerted(&self) -> bool {
        self.already_alerted
    }

    pub fn next_fire(&self) -> Instant {
        self.next_fire
    }

    /// Time left until the next cycle
    pub fn until_next_fire(&self) -> Duration {
        self.next_fire.saturating_duration_since(Instant::now())
    }

    pub fn wait_cadence(&self) -> Duration {
        self.wait_cadence
    }

    pub fn alert_cadence(&self) -> Duration {
        self.alert_cadence
    }

    pub fn alert_only_once(&self) -> bool {
        self.alert_only_once
    }

    pub fn alert_end_message(&self) -> bool {
        self.alert_end_message
    }
}

/// Parse a cadence such as `500s`, `30m` or `1h30m`
pub fn parse_cadence(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    humantime::parse_duration(text).ok()
}
