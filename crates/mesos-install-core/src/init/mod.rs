//! Init system support.
//!
//! [`InitVariant`] is selected once per run and carries everything that
//! differs between init systems: where the unit lives, which template renders
//! it, its file mode and the service manager that controls it.
//!
//! | variant           | unit path                                  | mode   | manager      |
//! |-------------------|--------------------------------------------|--------|--------------|
//! | `systemd`         | `/etc/systemd/system/mesos-<role>.service` | -      | `systemctl`  |
//! | `sysvinit_debian` | `/etc/init.d/mesos-<role>`                 | `0755` | `update-rc.d` |
//! | `upstart`         | `/etc/init/mesos-<role>.conf`              | -      | override file |

pub mod render;
pub mod service;

use std::path::PathBuf;

pub use crate::types::InitVariant;
use crate::types::Role;
pub use render::{UnitRenderer, render_phase, render_step_name, unit_is_stale, write_if_changed};
pub use service::{
    DebianInitManager, ServiceManager, SystemdManager, UpstartManager, service_phase,
};

static SYSTEMD: SystemdManager = SystemdManager;
static SYSVINIT_DEBIAN: DebianInitManager = DebianInitManager;
static UPSTART: UpstartManager = UpstartManager;

impl InitVariant {
    /// Unit file location for a role; the same naming is used for both roles.
    pub fn unit_path(self, role: Role) -> PathBuf {
        let service = role.service_name();
        match self {
            InitVariant::Systemd => {
                PathBuf::from("/etc/systemd/system").join(format!("{}.service", service))
            }
            InitVariant::SysvinitDebian => PathBuf::from("/etc/init.d").join(service),
            InitVariant::Upstart => PathBuf::from("/etc/init").join(format!("{}.conf", service)),
        }
    }

    /// Name of the template rendering this variant's unit.
    pub fn template(self) -> &'static str {
        match self {
            InitVariant::Systemd => render::SYSTEMD_TEMPLATE,
            InitVariant::SysvinitDebian => render::SYSVINIT_DEBIAN_TEMPLATE,
            InitVariant::Upstart => render::UPSTART_TEMPLATE,
        }
    }

    /// Required file mode of the rendered unit, if any.
    pub fn unit_mode(self) -> Option<u32> {
        match self {
            InitVariant::SysvinitDebian => Some(0o755),
            InitVariant::Systemd | InitVariant::Upstart => None,
        }
    }

    pub fn service_manager(self) -> &'static dyn ServiceManager {
        match self {
            InitVariant::Systemd => &SYSTEMD,
            InitVariant::SysvinitDebian => &SYSVINIT_DEBIAN,
            InitVariant::Upstart => &UPSTART,
        }
    }

    /// Whether changed units must be followed by a manager reload.
    pub fn reloads_units(self) -> bool {
        matches!(self, InitVariant::Systemd)
    }
}
