//! TOML parser with helpful error messages

use super::schema::Settings;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse config.toml with detailed error messages
pub fn parse_settings_toml(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_settings_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse config.toml content from string
pub fn parse_settings_toml_str(content: &str) -> Result<Settings> {
    let settings: Settings =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    settings.validate()?;

    Ok(settings)
}

/// Enhance TOML parsing errors with the offending lines
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let error_msg = error.message().to_string();

    let line_hint = error
        .span()
        .and_then(|span| content.get(..span.start))
        .map(|prefix| prefix.matches('\n').count() + 1);

    if let Some(line_num) = line_hint {
        let context = get_line_context(content, line_num);
        anyhow::anyhow!(
            "TOML parsing error at line {}:\n{}\n\nError: {}",
            line_num,
            context,
            error_msg
        )
    } else {
        anyhow::anyhow!("TOML parsing error: {}", error_msg)
    }
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 1).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize settings to a TOML string
pub fn to_toml(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(settings).with_context(|| "Failed to serialize settings to TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let settings = parse_settings_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
data_dir = "/srv/data"

[package]
release = "2.0.1.ubuntu1604"
"#;

        let settings = parse_settings_toml_str(toml).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(settings.root, PathBuf::from("/"));
        assert_eq!(settings.package.release, "2.0.1.ubuntu1604");
        assert_eq!(settings.package.arch, "amd64");
    }

    #[test]
    fn test_parse_invalid_toml_points_at_line() {
        let toml = "root = \"/\"\n[package\nrelease = \"x\"\n";

        let err = parse_settings_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("TOML parsing error at line"));
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = parse_settings_toml_str("cache_dir = \"relative/cache\"\n").unwrap_err();
        assert!(err.to_string().contains("cache_dir must be an absolute path"));
    }

    #[test]
    fn test_parse_from_file_and_roundtrip() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "root = \"/mnt/target\"").unwrap();

        let settings = parse_settings_toml(file.path()).unwrap();
        assert_eq!(settings.root, PathBuf::from("/mnt/target"));

        let reparsed = parse_settings_toml_str(&to_toml(&settings).unwrap()).unwrap();
        assert_eq!(reparsed, settings);
    }
}
