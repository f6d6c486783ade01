//! Configuration inputs.
//!
//! Two independent documents feed a run:
//! - node attributes (JSON): what to provision on this host
//! - tool settings (TOML): where the tool reads and writes

pub mod detect;
pub mod node;
pub mod parser;
pub mod schema;
pub mod store;

pub use detect::{OS_RELEASE, detect_platform_family};
pub use node::{AttributeError, AttributeOverrides, MesosAttributes, Node, NodeAttributes};
pub use parser::{parse_settings_toml, parse_settings_toml_str, to_toml};
pub use schema::{PackageSource, Settings};
pub use store::SettingsStore;
