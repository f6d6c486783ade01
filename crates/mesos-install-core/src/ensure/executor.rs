//! Guarded step execution.

use anyhow::Context;
use tracing::{debug, info};

use super::report::{Outcome, RunMode, RunReport};
use super::step::{Change, Guard, Phase, Postcondition, Step};
use crate::context::ProvisionContext;

/// Result of evaluating a guard.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    Run,
    Skip(String),
}

/// Runs phases in order, evaluating each guard before its action.
///
/// The first failing action or postcondition aborts the run.
#[derive(Debug)]
pub struct Executor<'a> {
    ctx: &'a ProvisionContext,
    mode: RunMode,
}

impl<'a> Executor<'a> {
    pub fn new(ctx: &'a ProvisionContext, mode: RunMode) -> Self {
        Self { ctx, mode }
    }

    pub fn run(&self, phases: &[Phase]) -> anyhow::Result<RunReport> {
        let mut report = RunReport::new(self.mode);

        for phase in phases {
            match self.evaluate(&phase.guard, &report) {
                Decision::Skip(reason) => {
                    debug!(phase = %phase.name, %reason, "phase skipped");
                    for step in &phase.steps {
                        let reason = Some(reason.clone());
                        report.record(&phase.name, &step.name, Outcome::Skipped, reason);
                    }
                }
                Decision::Run => {
                    for step in &phase.steps {
                        self.run_step(&phase.name, step, &mut report)?;
                    }
                }
            }
        }

        report.finish();
        Ok(report)
    }

    fn run_step(&self, phase: &str, step: &Step, report: &mut RunReport) -> anyhow::Result<()> {
        if let Decision::Skip(reason) = self.evaluate(&step.guard, report) {
            debug!(phase, step = %step.name, %reason, "step skipped");
            report.record(phase, &step.name, Outcome::Skipped, Some(reason));
            return Ok(());
        }

        if self.mode == RunMode::Plan {
            let due = match &step.check {
                Some(check) => check(self.ctx)
                    .with_context(|| format!("Check for '{}' ({}) failed", step.name, phase))?,
                None => true,
            };
            let outcome = if due {
                Outcome::Planned
            } else {
                Outcome::Unchanged
            };
            report.record(phase, &step.name, outcome, None);
            return Ok(());
        }

        let change = (step.action)(self.ctx)
            .with_context(|| format!("Step '{}' ({}) failed", step.name, phase))?;

        if let Some(postcondition) = &step.postcondition {
            self.verify(postcondition)
                .with_context(|| format!("Step '{}' ({}) failed", step.name, phase))?;
        }

        let outcome = match change {
            Change::Updated => {
                info!(phase, step = %step.name, "applied");
                Outcome::Applied
            }
            Change::Unchanged => {
                debug!(phase, step = %step.name, "unchanged");
                Outcome::Unchanged
            }
        };
        report.record(phase, &step.name, outcome, None);
        Ok(())
    }

    fn evaluate(&self, guard: &Guard, report: &RunReport) -> Decision {
        match guard {
            Guard::Always => Decision::Run,
            Guard::UnlessExists(path) => {
                if self.ctx.host_path(path).exists() {
                    Decision::Skip(format!("{} exists", path.display()))
                } else {
                    Decision::Run
                }
            }
            Guard::When { condition, reason } => {
                if *condition {
                    Decision::Run
                } else {
                    Decision::Skip(reason.clone())
                }
            }
            Guard::AnyChanged(steps) => {
                let changed = steps
                    .iter()
                    .any(|s| report.outcome_of(s).is_some_and(Outcome::is_change));
                if changed {
                    Decision::Run
                } else {
                    Decision::Skip(format!("no change in {}", steps.join(", ")))
                }
            }
        }
    }

    fn verify(&self, postcondition: &Postcondition) -> anyhow::Result<()> {
        let holds = match postcondition {
            Postcondition::Exists(path) => self.ctx.host_path(path).exists(),
            Postcondition::RegularFile(path) => std::fs::symlink_metadata(self.ctx.host_path(path))
                .map(|meta| meta.file_type().is_file())
                .unwrap_or(false),
        };
        if !holds {
            anyhow::bail!("Postcondition violated: {}", postcondition);
        }
        Ok(())
    }
}
