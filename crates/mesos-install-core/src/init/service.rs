//! Service state control per init system.
//!
//! Services are left stopped and disabled after a base install unless the
//! role recipe (`mesos::master`, `mesos::slave`) is in the node's run list,
//! in which case that recipe owns the service lifecycle and nothing here
//! touches it.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use crate::config::Node;
use crate::context::ProvisionContext;
use crate::ensure::{Change, Guard, Phase, Step};
use crate::host::CommandSpec;
use crate::types::Role;

/// Controls a named service through one init system.
pub trait ServiceManager {
    fn name(&self) -> &'static str;

    fn is_running(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<bool>;

    fn stop(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<()>;

    /// Whether the service starts at boot.
    fn is_enabled(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<bool>;

    fn disable(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<()>;
}

/// Stop the service if it is running.
pub fn ensure_stopped(
    manager: &dyn ServiceManager,
    ctx: &ProvisionContext,
    service: &str,
) -> anyhow::Result<Change> {
    if !manager.is_running(ctx, service)? {
        return Ok(Change::Unchanged);
    }
    manager.stop(ctx, service)?;
    info!(service, manager = manager.name(), "stopped");
    Ok(Change::Updated)
}

/// Disable the service if it is enabled.
pub fn ensure_disabled(
    manager: &dyn ServiceManager,
    ctx: &ProvisionContext,
    service: &str,
) -> anyhow::Result<Change> {
    if !manager.is_enabled(ctx, service)? {
        return Ok(Change::Unchanged);
    }
    manager.disable(ctx, service)?;
    info!(service, manager = manager.name(), "disabled");
    Ok(Change::Updated)
}

/// Stop and disable each role's service unless its role recipe claimed it.
pub fn service_phase(node: &Node) -> Phase {
    let manager = node.init.service_manager();
    let mut phase = Phase::new("service defaults");

    for role in Role::ALL {
        let service = role.service_name();
        let guard = Guard::when(
            !node.role_claimed(role),
            format!("{} manages {}", role.owning_recipe(), service),
        );

        let (stop_service, running_service, enabled_service) =
            (service.clone(), service.clone(), service.clone());
        phase = phase
            .step(
                Step::new(format!("stop {}", service), move |ctx| {
                    ensure_stopped(manager, ctx, &stop_service)
                })
                .check(move |ctx| manager.is_running(ctx, &running_service))
                .guard(guard.clone()),
            )
            .step(
                Step::new(format!("disable {}", service), move |ctx| {
                    ensure_disabled(manager, ctx, &service)
                })
                .check(move |ctx| manager.is_enabled(ctx, &enabled_service))
                .guard(guard),
            );
    }

    phase
}

/// systemd via `systemctl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemdManager;

impl SystemdManager {
    fn systemctl(verb: &str, service: &str) -> CommandSpec {
        CommandSpec::new("systemctl").args([verb, service])
    }
}

impl ServiceManager for SystemdManager {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn is_running(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<bool> {
        ctx.runner()
            .succeeds(&CommandSpec::new("systemctl").args(["is-active", "--quiet", service]))
    }

    fn stop(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<()> {
        ctx.runner().run_checked(&Self::systemctl("stop", service))?;
        Ok(())
    }

    fn is_enabled(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<bool> {
        ctx.runner()
            .succeeds(&CommandSpec::new("systemctl").args(["is-enabled", "--quiet", service]))
    }

    fn disable(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<()> {
        ctx.runner().run_checked(&Self::systemctl("disable", service))?;
        Ok(())
    }
}

/// Debian sysvinit: LSB script in `/etc/init.d`, boot links via `update-rc.d`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebianInitManager;

const RUNLEVEL_DIRS: [&str; 4] = ["/etc/rc2.d", "/etc/rc3.d", "/etc/rc4.d", "/etc/rc5.d"];

impl DebianInitManager {
    fn script(ctx: &ProvisionContext, service: &str) -> PathBuf {
        ctx.host_path(PathBuf::from("/etc/init.d").join(service))
    }
}

impl ServiceManager for DebianInitManager {
    fn name(&self) -> &'static str {
        "debian init"
    }

    fn is_running(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<bool> {
        let script = Self::script(ctx, service);
        if !script.exists() {
            return Ok(false);
        }
        ctx.runner()
            .succeeds(&CommandSpec::new(script.to_string_lossy()).arg("status"))
    }

    fn stop(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<()> {
        let script = Self::script(ctx, service);
        ctx.runner()
            .run_checked(&CommandSpec::new(script.to_string_lossy()).arg("stop"))?;
        Ok(())
    }

    /// Enabled when any multi-user runlevel has a start link (`S20mesos-master`).
    fn is_enabled(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<bool> {
        for dir in RUNLEVEL_DIRS {
            let dir = ctx.host_path(dir);
            if !dir.exists() {
                continue;
            }
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
            for entry in entries {
                let entry = entry
                    .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
                if is_start_link(&entry.file_name().to_string_lossy(), service) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn disable(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<()> {
        ctx.runner()
            .run_checked(&CommandSpec::new("update-rc.d").args([service, "disable"]))?;
        Ok(())
    }
}

fn is_start_link(name: &str, service: &str) -> bool {
    name.strip_prefix('S')
        .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_digit()))
        .is_some_and(|rest| rest == service)
}

/// Upstart: `status`/`stop` job control, disabled through a `manual` override.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpstartManager;

impl UpstartManager {
    fn override_file(ctx: &ProvisionContext, service: &str) -> PathBuf {
        ctx.host_path(PathBuf::from("/etc/init").join(format!("{}.override", service)))
    }
}

impl ServiceManager for UpstartManager {
    fn name(&self) -> &'static str {
        "upstart"
    }

    fn is_running(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<bool> {
        let output = ctx.runner().run(&CommandSpec::new("status").arg(service))?;
        Ok(output.is_success() && output.stdout.contains("start/"))
    }

    fn stop(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<()> {
        ctx.runner()
            .run_checked(&CommandSpec::new("stop").arg(service))?;
        Ok(())
    }

    fn is_enabled(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<bool> {
        let path = Self::override_file(ctx, service);
        if !path.exists() {
            return Ok(true);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(!content.lines().any(|line| line.trim() == "manual"))
    }

    fn disable(&self, ctx: &ProvisionContext, service: &str) -> anyhow::Result<()> {
        let path = Self::override_file(ctx, service);
        let mut content = match std::fs::read_to_string(&path) {
            Ok(existing) => existing,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str("manual\n");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
