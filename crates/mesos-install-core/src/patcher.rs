//! Debian package repacking.
//!
//! The upstream Mesos `.deb` declares a dependency on `libcurl3`, which newer
//! Debian/Ubuntu releases only ship as `libcurl4`. The package is unpacked,
//! its control manifest relaxed to `libcurl3|libcurl4`, repacked and installed
//! with dpkg. The whole phase is skipped once the Mesos binary is installed.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::config::Node;
use crate::context::ProvisionContext;
use crate::ensure::{Change, Guard, Phase, Postcondition, Step};
use crate::host::CommandSpec;

/// Present once the Mesos package is installed.
pub const MESOS_BINARY: &str = "/usr/sbin/mesos-master";

pub const LEGACY_DEPENDENCY: &str = "libcurl3";
pub const RELAXED_DEPENDENCY: &str = "libcurl3|libcurl4";

const DOWNLOAD_NAME: &str = "mesos.deb";
const SCRATCH_NAME: &str = "tmp";

/// Host locations used by the patch phase.
#[derive(Debug, Clone)]
pub struct PatchPaths {
    /// Upstream archive as downloaded.
    pub download: PathBuf,
    /// Unpack directory.
    pub scratch: PathBuf,
    /// Repacked archive that gets installed.
    pub repacked: PathBuf,
}

impl PatchPaths {
    pub fn resolve(ctx: &ProvisionContext) -> Self {
        let data_dir = ctx.data_dir();
        Self {
            download: data_dir.join(DOWNLOAD_NAME),
            scratch: data_dir.join(SCRATCH_NAME),
            repacked: ctx.cache_dir().join(DOWNLOAD_NAME),
        }
    }

    pub fn control_file(&self) -> PathBuf {
        self.scratch.join("DEBIAN").join("control")
    }
}

pub fn patch_phase(node: &Node) -> Phase {
    let version = node.version.clone();

    Phase::new("mesos package")
        .guard(Guard::unless_exists(MESOS_BINARY))
        .step(Step::new("download mesos package", move |ctx| {
            download_package(ctx, &version)
        }))
        .step(Step::new("reset scratch directory", |ctx| {
            let paths = PatchPaths::resolve(ctx);
            remove_dir_if_exists(&paths.scratch)?;
            std::fs::create_dir_all(&paths.scratch).with_context(|| {
                format!("Failed to create directory: {}", paths.scratch.display())
            })?;
            Ok(Change::Updated)
        }))
        .step(Step::new("unpack mesos package", |ctx| {
            let paths = PatchPaths::resolve(ctx);
            let spec = CommandSpec::new("dpkg-deb")
                .arg("-R")
                .path_arg(&paths.download)
                .path_arg(&paths.scratch);
            ctx.runner().run_checked(&spec)?;
            Ok(Change::Updated)
        }))
        .step(Step::new("update control file", |ctx| {
            patch_control_file(&PatchPaths::resolve(ctx).control_file())
        }))
        .step(Step::new("repack mesos package", |ctx| {
            let paths = PatchPaths::resolve(ctx);
            if let Some(parent) = paths.repacked.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
            let spec = CommandSpec::new("dpkg-deb")
                .arg("-b")
                .path_arg(&paths.scratch)
                .path_arg(&paths.repacked);
            ctx.runner().run_checked(&spec)?;
            Ok(Change::Updated)
        }))
        .step(Step::new("remove scratch directory", |ctx| {
            remove_dir_if_exists(&PatchPaths::resolve(ctx).scratch)
        }))
        .step(
            Step::new("install mesos package", |ctx| {
                let paths = PatchPaths::resolve(ctx);
                let spec = CommandSpec::new("dpkg").arg("-i").path_arg(&paths.repacked);
                ctx.runner().run_checked(&spec)?;
                Ok(Change::Updated)
            })
            .ensures(Postcondition::Exists(MESOS_BINARY.into())),
        )
}

fn download_package(ctx: &ProvisionContext, version: &str) -> anyhow::Result<Change> {
    let dest = PatchPaths::resolve(ctx).download;
    if dest.exists() {
        return Ok(Change::Unchanged);
    }
    let url = ctx.settings().package.package_url(version)?;
    ctx.downloader().download(&url, &dest)?;
    Ok(Change::Updated)
}

/// Relax the legacy curl dependency in a control manifest.
pub fn patch_control_file(path: &Path) -> anyhow::Result<Change> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read control file: {}", path.display()))?;

    let Some(patched) = relax_dependency(&content) else {
        warn!(
            path = %path.display(),
            "control file has no bare {} dependency; leaving it untouched",
            LEGACY_DEPENDENCY
        );
        return Ok(Change::Unchanged);
    };

    std::fs::write(path, patched)
        .with_context(|| format!("Failed to write control file: {}", path.display()))?;
    info!(path = %path.display(), "relaxed {} dependency", LEGACY_DEPENDENCY);
    Ok(Change::Updated)
}

/// Replace every bare `libcurl3` token with `libcurl3|libcurl4`.
///
/// Tokens that are already relaxed, or that are a prefix of a longer package
/// name such as `libcurl3-gnutls`, are left alone. Returns `None` if nothing
/// was replaced.
pub fn relax_dependency(content: &str) -> Option<String> {
    let mut out = String::with_capacity(content.len() + 16);
    let mut replaced = false;
    let mut rest = content;

    while let Some(idx) = rest.find(LEGACY_DEPENDENCY) {
        let (before, tail) = rest.split_at(idx);
        let after = &tail[LEGACY_DEPENDENCY.len()..];
        out.push_str(before);

        let preceded = out.chars().next_back().is_some_and(is_package_char);
        let followed = after.chars().next().is_some_and(is_package_char);
        let relaxed = after.starts_with("|libcurl4");

        if preceded || followed || relaxed {
            out.push_str(LEGACY_DEPENDENCY);
        } else {
            out.push_str(RELAXED_DEPENDENCY);
            replaced = true;
        }
        rest = after;
    }
    out.push_str(rest);

    replaced.then_some(out)
}

fn is_package_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '+')
}

fn remove_dir_if_exists(path: &Path) -> anyhow::Result<Change> {
    if !path.exists() {
        return Ok(Change::Unchanged);
    }
    std::fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    Ok(Change::Updated)
}
