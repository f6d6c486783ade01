//! libcurl3 compatibility shim.
//!
//! Mesos links against `libcurl.so.3`, which current Debian-family releases
//! no longer ship standalone. The legacy package is downloaded (not
//! installed), its `libcurl.so.4` payload extracted and copied to
//! `/usr/lib/libcurl.so.3`.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::context::ProvisionContext;
use crate::ensure::{Change, Guard, Phase, Postcondition, Step};
use crate::host::CommandSpec;

/// The shim itself; its presence skips the whole phase.
pub const SHIM_TARGET: &str = "/usr/lib/libcurl.so.3";

pub const LEGACY_PACKAGE: &str = "libcurl3";

/// User apt drops privileges to while downloading.
pub const DOWNLOAD_OWNER: &str = "_apt:root";

const DATA_ARCHIVE: &str = "data.tar.xz";
const PAYLOAD: &str = "usr/lib/x86_64-linux-gnu/libcurl.so.4";

fn scratch_dir(ctx: &ProvisionContext) -> PathBuf {
    ctx.data_dir().join(LEGACY_PACKAGE)
}

pub fn shim_phase() -> Phase {
    Phase::new("libcurl3 shim")
        .guard(Guard::unless_exists(SHIM_TARGET))
        .step(Step::new("create libcurl3 scratch directory", |ctx| {
            let dir = scratch_dir(ctx);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            let spec = CommandSpec::new("chown").arg(DOWNLOAD_OWNER).path_arg(&dir);
            ctx.runner().run_checked(&spec)?;
            Ok(Change::Updated)
        }))
        .step(Step::new("download libcurl3", |ctx| {
            let dir = scratch_dir(ctx);
            let spec = CommandSpec::new("apt-get")
                .arg("download")
                .arg(format!("-o=dir::cache={}", dir.display()))
                .arg(LEGACY_PACKAGE)
                .current_dir(&dir);
            ctx.runner().run_checked(&spec)?;
            Ok(Change::Updated)
        }))
        .step(Step::new("extract libcurl3 data archive", |ctx| {
            let dir = scratch_dir(ctx);
            let deb = find_package_archive(&dir)?;
            let spec = CommandSpec::new("ar")
                .arg("x")
                .path_arg(&deb)
                .arg(DATA_ARCHIVE)
                .current_dir(&dir);
            ctx.runner().run_checked(&spec)?;
            Ok(Change::Updated)
        }))
        .step(Step::new("extract libcurl3 library", |ctx| {
            let dir = scratch_dir(ctx);
            let spec = CommandSpec::new("tar")
                .args(["xf", DATA_ARCHIVE])
                .current_dir(&dir);
            ctx.runner().run_checked(&spec)?;
            Ok(Change::Updated)
        }))
        .step(Step::new("remove stale libcurl.so.3", |ctx| {
            remove_dangling_link(&ctx.host_path(SHIM_TARGET))
        }))
        .step(
            Step::new("copy libcurl.so.4 to libcurl.so.3", |ctx| {
                let source = scratch_dir(ctx).join(PAYLOAD);
                copy_dereferenced(&source, &ctx.host_path(SHIM_TARGET))?;
                Ok(Change::Updated)
            })
            .ensures(Postcondition::RegularFile(SHIM_TARGET.into())),
        )
        .step(Step::new("remove libcurl3 scratch directory", |ctx| {
            let dir = scratch_dir(ctx);
            if !dir.exists() {
                return Ok(Change::Unchanged);
            }
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove directory: {}", dir.display()))?;
            Ok(Change::Updated)
        }))
}

/// The `libcurl3*.deb` apt left in the scratch directory.
fn find_package_archive(dir: &Path) -> anyhow::Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| n.starts_with(LEGACY_PACKAGE) && n.ends_with(".deb"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next().ok_or_else(|| {
        anyhow::anyhow!("No {}*.deb found in {}", LEGACY_PACKAGE, dir.display())
    })
}

/// Remove `path` if it is a symlink whose target is gone.
fn remove_dangling_link(path: &Path) -> anyhow::Result<Change> {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return Ok(Change::Unchanged);
    };
    if !meta.file_type().is_symlink() || path.exists() {
        return Ok(Change::Unchanged);
    }
    std::fs::remove_file(path)
        .with_context(|| format!("Failed to remove stale link: {}", path.display()))?;
    Ok(Change::Updated)
}

/// Copy following symlinks at the source, so the destination is a regular file.
fn copy_dereferenced(source: &Path, dest: &Path) -> anyhow::Result<()> {
    if !source.exists() {
        anyhow::bail!("Extracted library not found: {}", source.display());
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::copy(source, dest).with_context(|| {
        format!("Failed to copy {} to {}", source.display(), dest.display())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_package_archive_picks_legacy_deb() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("data.tar.xz"), "").unwrap();
        std::fs::write(temp.path().join("libcurl3_7.58.0-2ubuntu2_amd64.deb"), "").unwrap();

        let found = find_package_archive(temp.path()).unwrap();
        assert_eq!(
            found.file_name().unwrap(),
            "libcurl3_7.58.0-2ubuntu2_amd64.deb"
        );
    }

    #[test]
    fn test_find_package_archive_missing() {
        let temp = TempDir::new().unwrap();
        let err = find_package_archive(temp.path()).unwrap_err();
        assert!(err.to_string().starts_with("No libcurl3*.deb found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_dangling_link_only() {
        let temp = TempDir::new().unwrap();
        let dangling = temp.path().join("libcurl.so.3");
        std::os::unix::fs::symlink(temp.path().join("gone"), &dangling).unwrap();
        assert_eq!(remove_dangling_link(&dangling).unwrap(), Change::Updated);
        assert!(std::fs::symlink_metadata(&dangling).is_err());

        let regular = temp.path().join("regular");
        std::fs::write(&regular, "elf").unwrap();
        assert_eq!(remove_dangling_link(&regular).unwrap(), Change::Unchanged);
        assert!(regular.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dereferenced_produces_regular_file() {
        let temp = TempDir::new().unwrap();
        let lib_dir = temp.path().join("x86_64-linux-gnu");
        std::fs::create_dir_all(&lib_dir).unwrap();
        std::fs::write(lib_dir.join("libcurl.so.4.5.0"), "ELF curl").unwrap();
        std::os::unix::fs::symlink("libcurl.so.4.5.0", lib_dir.join("libcurl.so.4")).unwrap();

        let dest = temp.path().join("usr").join("lib").join("libcurl.so.3");
        copy_dereferenced(&lib_dir.join("libcurl.so.4"), &dest).unwrap();

        let meta = std::fs::symlink_metadata(&dest).unwrap();
        assert!(meta.file_type().is_file());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "ELF curl");
    }
}
