//! Prerequisite and Mesos package installation through the OS package manager.

use tracing::info;

use crate::config::Node;
use crate::context::ProvisionContext;
use crate::ensure::{Change, Phase, Step};
use crate::host::CommandSpec;
use crate::types::PlatformFamily;

pub const DEBIAN_DEPENDENCIES: [&str; 5] = [
    "unzip",
    "default-jre-headless",
    "libcurl4",
    "libcurl4-openssl-dev",
    "libsvn1",
];

pub const RHEL_DEPENDENCIES: [&str; 3] = ["unzip", "libcurl", "subversion"];

pub const MESOS_PACKAGE: &str = "mesos";

/// Package manager front end for a platform family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// apt-get for installs, dpkg-query for state.
    Apt,
    /// yum for installs, rpm for state.
    Yum,
}

impl PackageManager {
    pub fn for_platform(platform: PlatformFamily) -> Self {
        match platform {
            PlatformFamily::Debian => PackageManager::Apt,
            PlatformFamily::Rhel => PackageManager::Yum,
        }
    }

    pub fn query_command(self, package: &str) -> CommandSpec {
        match self {
            PackageManager::Apt => {
                CommandSpec::new("dpkg-query").args(["-W", "-f=${Status}", package])
            }
            PackageManager::Yum => CommandSpec::new("rpm").args(["-q", package]),
        }
    }

    pub fn install_command(self, package: &str) -> CommandSpec {
        match self {
            PackageManager::Apt => CommandSpec::new("apt-get")
                .args(["install", "-y", "-q", package])
                .env("DEBIAN_FRONTEND", "noninteractive"),
            PackageManager::Yum => CommandSpec::new("yum").args(["install", "-y", package]),
        }
    }

    pub fn is_installed(self, ctx: &ProvisionContext, package: &str) -> anyhow::Result<bool> {
        let output = ctx.runner().run(&self.query_command(package))?;
        Ok(match self {
            PackageManager::Apt => {
                output.is_success() && output.stdout.trim() == "install ok installed"
            }
            PackageManager::Yum => output.is_success(),
        })
    }

    /// Install `package` unless already present.
    pub fn ensure_installed(self, ctx: &ProvisionContext, package: &str) -> anyhow::Result<Change> {
        if self.is_installed(ctx, package)? {
            return Ok(Change::Unchanged);
        }
        ctx.runner().run_checked(&self.install_command(package))?;
        info!(package, "installed");
        Ok(Change::Updated)
    }
}

/// Prerequisite packages, plus the version-pinned Mesos package on RHEL.
pub fn dependency_phase(node: &Node) -> Phase {
    let manager = PackageManager::for_platform(node.platform_family);
    let packages: &[&str] = match node.platform_family {
        PlatformFamily::Debian => &DEBIAN_DEPENDENCIES,
        PlatformFamily::Rhel => &RHEL_DEPENDENCIES,
    };

    let mut phase = Phase::new("dependencies");
    for package in packages {
        let package = package.to_string();
        let queried = package.clone();
        phase = phase.step(
            Step::new(format!("install {}", package), move |ctx| {
                manager.ensure_installed(ctx, &package)
            })
            .check(move |ctx| Ok(!manager.is_installed(ctx, &queried)?)),
        );
    }

    if node.platform_family == PlatformFamily::Rhel {
        let version = node.version.clone();
        let queried = node.version.clone();
        phase = phase.step(
            Step::new("install mesos package", move |ctx| {
                PackageManager::Yum.ensure_installed(ctx, &rhel_package(ctx, &version)?)
            })
            .check(move |ctx| {
                let package = rhel_package(ctx, &queried)?;
                Ok(!PackageManager::Yum.is_installed(ctx, &package)?)
            }),
        );
    }

    phase
}

/// `mesos-<version>-<release>` as known to yum.
fn rhel_package(ctx: &ProvisionContext, version: &str) -> anyhow::Result<String> {
    let version_release = resolve_rhel_version(ctx, version)?;
    Ok(format!("{}-{}", MESOS_PACKAGE, version_release))
}

/// Look up the full `version-release` string yum knows for `version`.
pub fn resolve_rhel_version(ctx: &ProvisionContext, version: &str) -> anyhow::Result<String> {
    let spec = CommandSpec::new("yum").args(["-q", "--showduplicates", "list", MESOS_PACKAGE]);
    let output = ctx.runner().run_checked(&spec)?;
    find_version_release(&output.stdout, MESOS_PACKAGE, version).ok_or_else(|| {
        anyhow::anyhow!(
            "No {} package matching version {} in the package database",
            MESOS_PACKAGE,
            version
        )
    })
}

/// Scan `yum list` output for `name.<arch>  [epoch:]version-release  repo`
/// rows whose version equals `version` exactly.
pub fn find_version_release(listing: &str, name: &str, version: &str) -> Option<String> {
    let prefix = format!("{}.", name);
    listing.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let package = fields.next()?;
        let version_release = fields.next()?;
        if !package.starts_with(&prefix) {
            return None;
        }
        let version_release = version_release
            .split_once(':')
            .map_or(version_release, |(_, rest)| rest);
        let (found, _release) = version_release.split_once('-')?;
        (found == version).then(|| version_release.to_string())
    })
}
