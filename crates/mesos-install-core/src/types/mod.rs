//! Shared core types used across configuration and workflow layers.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Operating system family of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    /// Debian, Ubuntu and derivatives (apt/dpkg).
    Debian,
    /// RHEL, CentOS and derivatives (yum/rpm).
    Rhel,
}

impl PlatformFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformFamily::Debian => "debian",
            PlatformFamily::Rhel => "rhel",
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Init system that supervises the Mesos daemons.
///
/// Exactly one variant is active per run. Behavior (unit paths, templates,
/// service control) lives in [`crate::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitVariant {
    #[default]
    Systemd,
    SysvinitDebian,
    Upstart,
}

impl InitVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            InitVariant::Systemd => "systemd",
            InitVariant::SysvinitDebian => "sysvinit_debian",
            InitVariant::Upstart => "upstart",
        }
    }
}

impl fmt::Display for InitVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mesos daemon role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

/// Directory holding the per-role wrapper scripts.
pub const WRAPPER_DIR: &str = "/etc/mesos-chef";

impl Role {
    pub const ALL: [Role; 2] = [Role::Master, Role::Slave];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Slave => "slave",
        }
    }

    /// Service name shared by unit file and service manager (`mesos-master`).
    pub fn service_name(self) -> String {
        format!("mesos-{}", self.as_str())
    }

    /// Wrapper script the unit executes.
    pub fn wrapper_path(self) -> PathBuf {
        PathBuf::from(WRAPPER_DIR).join(self.service_name())
    }

    /// Recipe that takes over lifecycle management for this role.
    pub fn owning_recipe(self) -> String {
        format!("mesos::{}", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
