//! Platform family detection from `/etc/os-release`.

use std::path::Path;

use anyhow::Context;

use crate::types::PlatformFamily;

/// Location of os-release relative to the host root.
pub const OS_RELEASE: &str = "/etc/os-release";

/// Detect the platform family from an os-release file.
///
/// Returns `Ok(None)` when the file is missing or names an unsupported family.
pub fn detect_platform_family(os_release: &Path) -> anyhow::Result<Option<PlatformFamily>> {
    if !os_release.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(os_release)
        .with_context(|| format!("Failed to read {}", os_release.display()))?;
    Ok(platform_family_from_os_release(&content))
}

/// `ID` is checked before `ID_LIKE`.
pub fn platform_family_from_os_release(content: &str) -> Option<PlatformFamily> {
    let id = os_release_value(content, "ID");
    let id_like = os_release_value(content, "ID_LIKE");

    id.iter()
        .chain(id_like.iter())
        .flat_map(|value| value.split_whitespace())
        .find_map(family_for_id)
}

fn family_for_id(id: &str) -> Option<PlatformFamily> {
    match id {
        "debian" | "ubuntu" | "linuxmint" | "raspbian" => Some(PlatformFamily::Debian),
        "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "ol" | "amzn" => {
            Some(PlatformFamily::Rhel)
        }
        _ => None,
    }
}

fn os_release_value(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        if k != key {
            return None;
        }
        Some(v.trim_matches(|c| c == '"' || c == '\'').to_string())
    })
}
