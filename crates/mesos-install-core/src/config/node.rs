//! Node attributes: the read-only description of the host being provisioned.
//!
//! Attributes arrive as a JSON document in the familiar node-attribute shape:
//!
//! ```json
//! {
//!   "platform_family": "debian",
//!   "mesos": { "version": "1.4.1", "init": "systemd", "repo": true },
//!   "recipes": ["mesos::install", "mesos::master"]
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::types::{InitVariant, PlatformFamily, Role};

/// Raw attribute document as written by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// Detected from the host when absent.
    #[serde(default)]
    pub platform_family: Option<PlatformFamily>,

    #[serde(default)]
    pub mesos: MesosAttributes,

    /// Recipes already applied to this node, in run-list order.
    #[serde(default)]
    pub recipes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MesosAttributes {
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub init: InitVariant,

    /// Whether the package repository recipe is part of the run.
    #[serde(default = "default_repo")]
    pub repo: bool,
}

impl Default for MesosAttributes {
    fn default() -> Self {
        Self {
            version: None,
            init: InitVariant::default(),
            repo: default_repo(),
        }
    }
}

fn default_repo() -> bool {
    true
}

/// Command-line overrides layered on top of the attribute document.
#[derive(Debug, Clone, Default)]
pub struct AttributeOverrides {
    pub platform_family: Option<PlatformFamily>,
    pub version: Option<String>,
    pub init: Option<InitVariant>,
    pub recipes: Vec<String>,
}

/// Node attributes could not be turned into a usable [`Node`].
#[derive(Debug, thiserror::Error)]
pub enum AttributeError {
    #[error("invalid node attributes: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("mesos.version is required")]
    MissingVersion,

    #[error("mesos.version '{version}' is not a valid version: {source}")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },

    #[error("platform_family is not set and could not be detected from {0}")]
    UndetectedPlatform(String),
}

impl NodeAttributes {
    /// Load attributes from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read attributes file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse attributes file: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self, AttributeError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply command-line overrides. Override recipes are appended.
    pub fn apply_overrides(&mut self, overrides: AttributeOverrides) {
        if let Some(platform) = overrides.platform_family {
            self.platform_family = Some(platform);
        }
        if let Some(version) = overrides.version {
            self.mesos.version = Some(version);
        }
        if let Some(init) = overrides.init {
            self.mesos.init = init;
        }
        for recipe in overrides.recipes {
            if !self.recipes.contains(&recipe) {
                self.recipes.push(recipe);
            }
        }
    }

    /// Validate and resolve into a [`Node`].
    ///
    /// `detected` is consulted only when `platform_family` is not set.
    pub fn resolve(
        self,
        detected: Option<PlatformFamily>,
        detect_source: &Path,
    ) -> Result<Node, AttributeError> {
        let version = self.mesos.version.ok_or(AttributeError::MissingVersion)?;
        if let Err(source) = semver::Version::parse(&version) {
            return Err(AttributeError::InvalidVersion { version, source });
        }

        let platform_family = match self.platform_family.or(detected) {
            Some(platform) => platform,
            None => {
                return Err(AttributeError::UndetectedPlatform(
                    detect_source.display().to_string(),
                ));
            }
        };

        Ok(Node {
            platform_family,
            version,
            init: self.mesos.init,
            repo: self.mesos.repo,
            recipes: self.recipes,
        })
    }
}

/// Validated node attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub platform_family: PlatformFamily,
    pub version: String,
    pub init: InitVariant,
    pub repo: bool,
    pub recipes: Vec<String>,
}

impl Node {
    pub fn has_recipe(&self, recipe: &str) -> bool {
        self.recipes.iter().any(|r| r == recipe)
    }

    /// True when the role recipe owns the service lifecycle.
    pub fn role_claimed(&self, role: Role) -> bool {
        self.has_recipe(&role.owning_recipe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "/etc/os-release";

    #[test]
    fn test_parse_full_document() {
        let attrs = NodeAttributes::from_json(
            r#"{
                "platform_family": "rhel",
                "mesos": { "version": "1.4.1", "init": "upstart", "repo": false },
                "recipes": ["java", "mesos::install", "mesos::slave"]
            }"#,
        )
        .unwrap();

        let node = attrs.resolve(None, Path::new(SOURCE)).unwrap();
        assert_eq!(node.platform_family, PlatformFamily::Rhel);
        assert_eq!(node.version, "1.4.1");
        assert_eq!(node.init, InitVariant::Upstart);
        assert!(!node.repo);
        assert!(node.role_claimed(Role::Slave));
        assert!(!node.role_claimed(Role::Master));
    }

    #[test]
    fn test_defaults_for_init_repo_and_recipes() {
        let attrs = NodeAttributes::from_json(r#"{ "mesos": { "version": "1.4.1" } }"#).unwrap();
        let node = attrs
            .resolve(Some(PlatformFamily::Debian), Path::new(SOURCE))
            .unwrap();

        assert_eq!(node.init, InitVariant::Systemd);
        assert!(node.repo);
        assert!(node.recipes.is_empty());
        assert_eq!(node.platform_family, PlatformFamily::Debian);
    }

    #[test]
    fn test_explicit_platform_wins_over_detection() {
        let attrs = NodeAttributes::from_json(
            r#"{ "platform_family": "debian", "mesos": { "version": "1.4.1" } }"#,
        )
        .unwrap();
        let node = attrs
            .resolve(Some(PlatformFamily::Rhel), Path::new(SOURCE))
            .unwrap();
        assert_eq!(node.platform_family, PlatformFamily::Debian);
    }

    #[test]
    fn test_unknown_platform_family_is_rejected() {
        let err = NodeAttributes::from_json(
            r#"{ "platform_family": "suse", "mesos": { "version": "1.4.1" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, AttributeError::Parse(_)));
    }

    #[test]
    fn test_missing_and_invalid_version() {
        let err = NodeAttributes::default()
            .resolve(Some(PlatformFamily::Debian), Path::new(SOURCE))
            .unwrap_err();
        assert!(matches!(err, AttributeError::MissingVersion));

        let attrs =
            NodeAttributes::from_json(r#"{ "mesos": { "version": "one.four" } }"#).unwrap();
        let err = attrs
            .resolve(Some(PlatformFamily::Debian), Path::new(SOURCE))
            .unwrap_err();
        assert!(matches!(err, AttributeError::InvalidVersion { .. }));
    }

    #[test]
    fn test_undetected_platform() {
        let attrs = NodeAttributes::from_json(r#"{ "mesos": { "version": "1.4.1" } }"#).unwrap();
        let err = attrs.resolve(None, Path::new(SOURCE)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "platform_family is not set and could not be detected from /etc/os-release"
        );
    }

    #[test]
    fn test_overrides_replace_scalars_and_append_recipes() {
        let mut attrs = NodeAttributes::from_json(
            r#"{ "mesos": { "version": "1.4.1" }, "recipes": ["mesos::install"] }"#,
        )
        .unwrap();

        attrs.apply_overrides(AttributeOverrides {
            platform_family: Some(PlatformFamily::Rhel),
            version: Some("1.5.0".to_string()),
            init: Some(InitVariant::SysvinitDebian),
            recipes: vec!["mesos::install".to_string(), "mesos::master".to_string()],
        });

        assert_eq!(attrs.platform_family, Some(PlatformFamily::Rhel));
        assert_eq!(attrs.mesos.version.as_deref(), Some("1.5.0"));
        assert_eq!(attrs.mesos.init, InitVariant::SysvinitDebian);
        assert_eq!(attrs.recipes, vec!["mesos::install", "mesos::master"]);
    }
}
