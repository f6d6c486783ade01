//! Run reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether actions are executed or only planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Apply,
    /// Evaluate guards without touching the host.
    Plan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Action ran and changed the host.
    Applied,
    /// Action ran and found nothing to change.
    Unchanged,
    /// Guard prevented the action.
    Skipped,
    /// Action would run (plan mode).
    Planned,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Unchanged => "unchanged",
            Outcome::Skipped => "skipped",
            Outcome::Planned => "planned",
        }
    }

    /// Counts as a change for subscriptions.
    pub fn is_change(self) -> bool {
        matches!(self, Outcome::Applied | Outcome::Planned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub phase: String,
    pub step: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
        }
    }

    pub(crate) fn record(
        &mut self,
        phase: &str,
        step: &str,
        outcome: Outcome,
        reason: Option<String>,
    ) {
        self.steps.push(StepRecord {
            phase: phase.to_string(),
            step: step.to_string(),
            outcome,
            reason,
        });
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn outcome_of(&self, step: &str) -> Option<Outcome> {
        self.steps
            .iter()
            .rev()
            .find(|r| r.step == step)
            .map(|r| r.outcome)
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.steps.iter().filter(|r| r.outcome == outcome).count()
    }

    /// True if any step changed (or would change) the host.
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|r| r.outcome.is_change())
    }
}
