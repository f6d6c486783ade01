//! Tool settings schema (`config.toml`).

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// Settings for the provisioning tool itself, as opposed to the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Host root under which every absolute path is resolved.
    pub root: PathBuf,

    /// Download and scratch area.
    pub data_dir: PathBuf,

    /// Where the repacked package is written before installation.
    pub cache_dir: PathBuf,

    pub package: PackageSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            data_dir: PathBuf::from("/data"),
            cache_dir: PathBuf::from("/var/cache/mesos-install"),
            package: PackageSource::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, path) in [("data_dir", &self.data_dir), ("cache_dir", &self.cache_dir)] {
            if !path.is_absolute() {
                anyhow::bail!("{} must be an absolute path: {}", field, path.display());
            }
        }
        self.package.base_url()?;
        Ok(())
    }
}

/// Upstream location of the Debian Mesos package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSource {
    pub base_url: String,
    /// Packaging release appended to the Mesos version.
    pub release: String,
    pub arch: String,
    pub user_agent: String,
}

impl Default for PackageSource {
    fn default() -> Self {
        Self {
            base_url: "http://repos.mesosphere.com/debian/pool/main/m/mesos/".to_string(),
            release: "2.0.6.debian9".to_string(),
            arch: "amd64".to_string(),
            user_agent: format!("mesos-install/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl PackageSource {
    /// Parsed base URL, always ending in `/` so joins append.
    pub fn base_url(&self) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid package base_url: {}", self.base_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("Package base_url cannot be a base URL: {}", self.base_url);
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// `mesos_<version>-<release>_<arch>.deb`
    pub fn file_name(&self, version: &str) -> String {
        format!("mesos_{}-{}_{}.deb", version, self.release, self.arch)
    }

    pub fn package_url(&self, version: &str) -> anyhow::Result<Url> {
        let file = self.file_name(version);
        self.base_url()?
            .join(&file)
            .with_context(|| format!("Failed to build package URL for {}", file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_package_url() {
        let url = PackageSource::default().package_url("1.4.1").unwrap();
        assert_eq!(
            url.as_str(),
            "http://repos.mesosphere.com/debian/pool/main/m/mesos/\
             mesos_1.4.1-2.0.6.debian9_amd64.deb"
        );
    }

    #[test]
    fn test_base_url_without_trailing_slash() {
        let source = PackageSource {
            base_url: "https://mirror.example.com/mesos".to_string(),
            ..PackageSource::default()
        };
        let url = source.package_url("1.5.0").unwrap();
        assert_eq!(
            url.as_str(),
            "https://mirror.example.com/mesos/mesos_1.5.0-2.0.6.debian9_amd64.deb"
        );
    }

    #[test]
    fn test_validate_rejects_relative_dirs_and_bad_urls() {
        let settings = Settings {
            data_dir: PathBuf::from("data"),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.package.base_url = "not a url".to_string();
        assert!(settings.validate().is_err());

        assert!(Settings::default().validate().is_ok());
    }
}
