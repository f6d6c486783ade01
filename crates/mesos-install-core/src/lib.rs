//! Mesos Install Core Library
//!
//! Provisions an Apache Mesos base install on a single host: prerequisite
//! packages, the patched Mesos package, the libcurl3 compatibility shim, init
//! unit files and default service state. Every step is guarded so reruns
//! converge instead of repeating work.

pub mod config;
pub mod context;
pub mod ensure;
pub mod host;
pub mod init;
pub mod packages;
pub mod patcher;
pub mod shim;
pub mod types;
pub mod workflow;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{
        AttributeError, AttributeOverrides, Node, NodeAttributes, PackageSource, Settings,
        SettingsStore,
    };

    // Execution
    pub use crate::context::ProvisionContext;
    pub use crate::ensure::{
        Change, Executor, Guard, Outcome, Phase, Postcondition, RunMode, RunReport, Step,
        StepRecord,
    };

    // Host
    pub use crate::host::{CommandOutput, CommandRunner, CommandSpec, Downloader};

    // Domain
    pub use crate::init::ServiceManager;
    pub use crate::types::{InitVariant, PlatformFamily, Role};
    pub use crate::workflow::{Workflow, resolve_node};
}
