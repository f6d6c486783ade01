//! Unit file rendering.

use std::path::Path;
use std::rc::Rc;

use anyhow::Context;
use tera::Tera;
use tracing::info;

use crate::config::Node;
use crate::context::ProvisionContext;
use crate::ensure::{Change, Guard, Phase, Step};
use crate::host::CommandSpec;
use crate::types::{InitVariant, Role, WRAPPER_DIR};

pub const SYSTEMD_TEMPLATE: &str = "systemd.service";
pub const SYSVINIT_DEBIAN_TEMPLATE: &str = "sysvinit_debian";
pub const UPSTART_TEMPLATE: &str = "upstart.conf";

pub const DAEMON_RELOAD_STEP: &str = "systemctl daemon-reload";

/// Renders unit files from the built-in templates.
#[derive(Debug)]
pub struct UnitRenderer {
    tera: Tera,
}

impl UnitRenderer {
    pub fn new() -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_templates(vec![
            (
                SYSTEMD_TEMPLATE,
                include_str!("../../templates/systemd.service.tera"),
            ),
            (
                SYSVINIT_DEBIAN_TEMPLATE,
                include_str!("../../templates/sysvinit_debian.tera"),
            ),
            (
                UPSTART_TEMPLATE,
                include_str!("../../templates/upstart.conf.tera"),
            ),
        ])
        .context("Failed to load unit templates")?;
        Ok(Self { tera })
    }

    /// Render the unit for `role` under `variant`.
    pub fn render(&self, variant: InitVariant, role: Role) -> anyhow::Result<String> {
        let mut context = tera::Context::new();
        context.insert("name", &role.service_name());
        context.insert("wrapper", &role.wrapper_path().to_string_lossy());
        self.tera
            .render(variant.template(), &context)
            .with_context(|| {
                format!("Failed to render {} unit for {}", variant, role.service_name())
            })
    }
}

pub fn render_step_name(role: Role) -> String {
    format!("render {} unit", role.service_name())
}

/// Sentinel directory, one unit per role, and the systemd reload they trigger.
pub fn render_phase(node: &Node) -> anyhow::Result<Phase> {
    let variant = node.init;
    let renderer = Rc::new(UnitRenderer::new()?);

    let mut phase = Phase::new("init configuration").step(
        Step::new(format!("create {}", WRAPPER_DIR), |ctx| {
            let dir = ctx.host_path(WRAPPER_DIR);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            Ok(Change::Updated)
        })
        .guard(Guard::unless_exists(WRAPPER_DIR)),
    );

    for role in Role::ALL {
        let renderer = Rc::clone(&renderer);
        let check_renderer = Rc::clone(&renderer);
        phase = phase.step(
            Step::new(render_step_name(role), move |ctx| {
                let content = renderer.render(variant, role)?;
                let path = ctx.host_path(variant.unit_path(role));
                write_if_changed(&path, &content, variant.unit_mode())
            })
            .check(move |ctx| {
                let content = check_renderer.render(variant, role)?;
                let path = ctx.host_path(variant.unit_path(role));
                unit_is_stale(&path, &content, variant.unit_mode())
            }),
        );
    }

    let reload_guard = if variant.reloads_units() {
        Guard::any_changed(Role::ALL.map(render_step_name))
    } else {
        Guard::when(false, format!("init system is {}", variant))
    };

    Ok(phase.step(
        Step::new(DAEMON_RELOAD_STEP, |ctx: &ProvisionContext| {
            let spec = CommandSpec::new("/bin/systemctl").args(["--system", "daemon-reload"]);
            ctx.runner().run_checked(&spec)?;
            Ok(Change::Updated)
        })
        .guard(reload_guard),
    ))
}

/// Write `content` to `path` only if it differs, then enforce `mode`.
pub fn write_if_changed(path: &Path, content: &str, mode: Option<u32>) -> anyhow::Result<Change> {
    let mut change = Change::Unchanged;

    if content_differs(path, content) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write unit file: {}", path.display()))?;
        info!(path = %path.display(), "unit file written");
        change = Change::Updated;
    }

    if let Some(mode) = mode {
        if mode_differs(path, mode)? {
            set_mode(path, mode)?;
            change = Change::Updated;
        }
    }

    Ok(change)
}

/// True when [`write_if_changed`] would modify `path`.
pub fn unit_is_stale(path: &Path, content: &str, mode: Option<u32>) -> anyhow::Result<bool> {
    if content_differs(path, content) {
        return Ok(true);
    }
    match mode {
        Some(mode) => mode_differs(path, mode),
        None => Ok(false),
    }
}

fn content_differs(path: &Path, content: &str) -> bool {
    let current = std::fs::read(path).ok();
    current.as_deref().map(content_hash) != Some(content_hash(content.as_bytes()))
}

#[cfg(unix)]
fn mode_differs(path: &Path, mode: u32) -> anyhow::Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let current = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat unit file: {}", path.display()))?
        .permissions()
        .mode()
        & 0o7777;
    Ok(current != mode)
}

#[cfg(not(unix))]
fn mode_differs(_path: &Path, _mode: u32) -> anyhow::Result<bool> {
    Ok(false)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set mode on {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
