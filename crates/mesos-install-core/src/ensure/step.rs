//! Step and phase definitions.

use std::fmt;
use std::path::PathBuf;

use crate::context::ProvisionContext;

/// Result of running a step's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The host was modified.
    Updated,
    /// The action ran but found nothing to do.
    Unchanged,
}

/// Precondition deciding whether a step (or phase) runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Always,
    /// Skip when the host path exists.
    UnlessExists(PathBuf),
    /// Static predicate known when the plan is built.
    When { condition: bool, reason: String },
    /// Run only if one of the named steps changed the host earlier in the run.
    AnyChanged(Vec<String>),
}

impl Guard {
    pub fn unless_exists(path: impl Into<PathBuf>) -> Self {
        Guard::UnlessExists(path.into())
    }

    /// Run when `condition` holds; `reason` explains a skip.
    pub fn when(condition: bool, reason: impl Into<String>) -> Self {
        Guard::When {
            condition,
            reason: reason.into(),
        }
    }

    pub fn any_changed<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Guard::AnyChanged(steps.into_iter().map(Into::into).collect())
    }
}

/// Condition that must hold on the host after a step applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postcondition {
    Exists(PathBuf),
    /// Exists and is a regular file, not a symlink.
    RegularFile(PathBuf),
}

impl fmt::Display for Postcondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Postcondition::Exists(path) => write!(f, "{} exists", path.display()),
            Postcondition::RegularFile(path) => {
                write!(f, "{} is a regular file", path.display())
            }
        }
    }
}

type Action = Box<dyn Fn(&ProvisionContext) -> anyhow::Result<Change>>;
type Check = Box<dyn Fn(&ProvisionContext) -> anyhow::Result<bool>>;

/// One idempotent unit of work: guard, action, postcondition.
pub struct Step {
    pub(crate) name: String,
    pub(crate) guard: Guard,
    pub(crate) action: Action,
    pub(crate) check: Option<Check>,
    pub(crate) postcondition: Option<Postcondition>,
}

impl Step {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ProvisionContext) -> anyhow::Result<Change> + 'static,
    {
        Self {
            name: name.into(),
            guard: Guard::Always,
            action: Box::new(action),
            check: None,
            postcondition: None,
        }
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    /// Read-only test reporting whether the action would change the host.
    ///
    /// Plan mode consults it instead of running the action. Steps without a
    /// check are always planned.
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&ProvisionContext) -> anyhow::Result<bool> + 'static,
    {
        self.check = Some(Box::new(check));
        self
    }

    pub fn ensures(mut self, postcondition: Postcondition) -> Self {
        self.postcondition = Some(postcondition);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("guard", &self.guard)
            .field("checked", &self.check.is_some())
            .field("postcondition", &self.postcondition)
            .finish_non_exhaustive()
    }
}

/// Ordered group of steps sharing one guard.
///
/// The phase guard is evaluated once on entry, so a marker created by one
/// step does not cause the remaining steps of the phase to be skipped.
#[derive(Debug)]
pub struct Phase {
    pub(crate) name: String,
    pub(crate) guard: Guard,
    pub(crate) steps: Vec<Step>,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guard: Guard::Always,
            steps: Vec::new(),
        }
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}
