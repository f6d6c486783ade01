//! Provisioning context for unified dependency injection.

use std::path::{Component, Path, PathBuf};

use crate::config::Settings;
use crate::host::{CommandRunner, Downloader, HttpDownloader, SystemRunner};

/// Shared services and paths for a provisioning run.
///
/// Frontends create this once; every step receives it. Absolute host paths
/// are always resolved through [`ProvisionContext::host_path`] so a run can
/// target a directory other than `/`.
pub struct ProvisionContext {
    settings: Settings,
    runner: Box<dyn CommandRunner>,
    downloader: Box<dyn Downloader>,
}

impl ProvisionContext {
    /// Context backed by real processes and HTTP.
    pub fn new(settings: Settings) -> Self {
        let downloader = HttpDownloader::new(settings.package.user_agent.clone());
        Self::with_backends(settings, Box::new(SystemRunner), Box::new(downloader))
    }

    /// Context with custom command and download backends (for testing).
    pub fn with_backends(
        settings: Settings,
        runner: Box<dyn CommandRunner>,
        downloader: Box<dyn Downloader>,
    ) -> Self {
        Self {
            settings,
            runner,
            downloader,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn root(&self) -> &Path {
        &self.settings.root
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn downloader(&self) -> &dyn Downloader {
        self.downloader.as_ref()
    }

    /// Resolve an absolute host path under the configured root.
    pub fn host_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let relative: PathBuf = path
            .as_ref()
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.settings.root.join(relative)
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.host_path(&self.settings.data_dir)
    }

    /// Resolved cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.host_path(&self.settings.cache_dir)
    }
}

impl std::fmt::Debug for ProvisionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_path_under_default_root() {
        let ctx = ProvisionContext::new(Settings::default());
        assert_eq!(
            ctx.host_path("/usr/lib/libcurl.so.3"),
            PathBuf::from("/usr/lib/libcurl.so.3")
        );
        assert_eq!(ctx.data_dir(), PathBuf::from("/data"));
    }

    #[test]
    fn test_host_path_under_custom_root() {
        let settings = Settings {
            root: PathBuf::from("/mnt/target"),
            ..Settings::default()
        };
        let ctx = ProvisionContext::new(settings);
        assert_eq!(
            ctx.host_path("/etc/init.d/mesos-master"),
            PathBuf::from("/mnt/target/etc/init.d/mesos-master")
        );
        assert_eq!(
            ctx.host_path("/../../etc/passwd"),
            PathBuf::from("/mnt/target/etc/passwd")
        );
        assert_eq!(
            ctx.cache_dir(),
            PathBuf::from("/mnt/target/var/cache/mesos-install")
        );
    }
}
