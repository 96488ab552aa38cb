//! Health tracking and notification escalation across cycles.
//!
//! A cycle that returns any outcome, including an abort, counts as the bot
//! working; only an unexpected failure marks it down. At most one push goes
//! out per state transition: one "recovered" per down-to-up edge, and one
//! escalation per continuous outage that crosses the threshold.

use crate::error::BotError;
use crate::notify::Notifier;
use crate::workflow::CycleOutcome;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

/// Up/down state of the polling loop, mutated only between cycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthState {
    pub is_working: bool,
    pub down_since: Option<DateTime<Utc>>,
    pub down_notified: bool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            is_working: true,
            down_since: None,
            down_notified: false,
        }
    }
}

pub struct HealthMonitor {
    state: HealthState,
    notifier: Notifier,
    threshold: Duration,
}

impl HealthMonitor {
    pub fn new(notifier: Notifier, threshold_minutes: i64) -> Self {
        Self {
            state: HealthState::default(),
            notifier,
            threshold: Duration::minutes(threshold_minutes),
        }
    }

    pub fn state(&self) -> &HealthState {
        &self.state
    }

    pub async fn observe(&mut self, result: &Result<CycleOutcome, BotError>) {
        self.observe_at(result, Utc::now()).await;
    }

    pub(crate) async fn observe_at(
        &mut self,
        result: &Result<CycleOutcome, BotError>,
        now: DateTime<Utc>,
    ) {
        match result {
            Ok(_) => {
                let was_down = !self.state.is_working;
                self.state.is_working = true;
                self.state.down_since = None;
                if was_down {
                    self.notifier.send("recovered, working properly again").await;
                    self.state.down_notified = false;
                } else {
                    info!("working properly");
                }
            }
            Err(err) => {
                error!("cycle failed: {err}");
                self.state.is_working = false;
                let since = *self.state.down_since.get_or_insert(now);
                if now - since >= self.threshold && !self.state.down_notified {
                    self.notifier
                        .send(&format!("there is a problem since {since}"))
                        .await;
                    self.state.down_notified = true;
                } else {
                    warn!("there is a problem since {since}");
                }
            }
        }
    }
}
