//! CLI configuration discovery and loading.

use anyhow::{Context, Result};
use quill_orchestrator::{ConfigLoader, QuillConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "QUILL_CONFIG";

/// Configuration file picked up from the working directory.
pub const LOCAL_CONFIG: &str = "quill.toml";

/// Finds the configuration file to load.
///
/// Precedence:
/// 1. `--config`
/// 2. `QUILL_CONFIG`
/// 3. `./quill.toml`, if it exists
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    local.is_file().then_some(local)
}

/// Loads the configuration, falling back to defaults when no file is found.
pub fn load_config(explicit: Option<&Path>) -> Result<QuillConfig> {
    match resolve_config_path(explicit) {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration");
            ConfigLoader::load(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => {
            debug!("No configuration file found, using defaults");
            Ok(QuillConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/quill.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/quill.toml"));
    }
}
