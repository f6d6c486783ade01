//! The Mesos provisioning workflow.
//!
//! Phases run strictly in order:
//!  * dependencies: prerequisite packages (and the pinned Mesos rpm on RHEL)
//!  * mesos package: download, patch and install the Mesos deb (Debian)
//!  * libcurl3 shim: manufacture `/usr/lib/libcurl.so.3`
//!  * init configuration: sentinel directory, unit files, systemd reload
//!  * service defaults: stop and disable unclaimed services
//!
//! A rerun re-evaluates every guard and resumes at the first unmet one.

use tracing::info;

use crate::config::{Node, NodeAttributes, OS_RELEASE, detect_platform_family};
use crate::context::ProvisionContext;
use crate::ensure::{Executor, Outcome, Phase, RunMode, RunReport};
use crate::init::{render_phase, service_phase};
use crate::packages::dependency_phase;
use crate::patcher::patch_phase;
use crate::shim::shim_phase;
use crate::types::PlatformFamily;

/// Validate attributes, detecting the platform family under the host root.
pub fn resolve_node(ctx: &ProvisionContext, attributes: NodeAttributes) -> anyhow::Result<Node> {
    let os_release = ctx.host_path(OS_RELEASE);
    let detected = match attributes.platform_family {
        Some(_) => None,
        None => detect_platform_family(&os_release)?,
    };
    Ok(attributes.resolve(detected, &os_release)?)
}

#[derive(Debug, Clone)]
pub struct Workflow {
    node: Node,
}

impl Workflow {
    pub fn new(node: Node) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Build the ordered phase list for this node.
    pub fn phases(&self) -> anyhow::Result<Vec<Phase>> {
        let node = &self.node;
        let mut phases = vec![dependency_phase(node)];

        if node.platform_family == PlatformFamily::Debian {
            phases.push(patch_phase(node));
        }
        phases.push(shim_phase());

        phases.push(render_phase(node)?);
        phases.push(service_phase(node));
        Ok(phases)
    }

    pub fn run(&self, ctx: &ProvisionContext, mode: RunMode) -> anyhow::Result<RunReport> {
        info!(
            platform = %self.node.platform_family,
            version = %self.node.version,
            init = %self.node.init,
            ?mode,
            "provisioning mesos"
        );
        info!("java runtime is expected from the java recipe");
        if self.node.repo {
            info!("package repository is expected from the mesos::repo recipe");
        }

        let phases = self.phases()?;
        let report = Executor::new(ctx, mode).run(&phases)?;

        info!(
            applied = report.count(Outcome::Applied),
            skipped = report.count(Outcome::Skipped),
            "provisioning finished"
        );
        Ok(report)
    }
}
