use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::types::AgsConfig;
use crate::error::{AgsError, Result};

/// Get the default configuration file path (~/.ags/config.toml)
pub fn get_config_path() -> PathBuf {
    if let Some(base_dirs) = directories::BaseDirs::new() {
        base_dirs.home_dir().join(".ags").join("config.toml")
    } else {
        // Fallback to home directory
        dirs_fallback().join(".ags").join("config.toml")
    }
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load configuration from file, with defaults for missing values, then
/// apply `AGS_*` environment overrides.
pub fn load_config(config_path: Option<&Path>) -> Result<AgsConfig> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        debug!(path = %path.display(), "Loaded configuration file");
        toml::from_str(&content).map_err(|e| AgsError::TomlParse(e.to_string()))?
    } else {
        AgsConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut AgsConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let set = |target: &mut String, key: &str| {
        if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
            *target = value;
        }
    };

    set(&mut config.backend, "AGS_BACKEND");
    set(&mut config.e2b.api_key, "AGS_E2B_API_KEY");
    set(&mut config.e2b.domain, "AGS_E2B_DOMAIN");
    set(&mut config.e2b.region, "AGS_E2B_REGION");
    set(&mut config.cloud.secret_id, "AGS_CLOUD_SECRET_ID");
    set(&mut config.cloud.secret_key, "AGS_CLOUD_SECRET_KEY");
    set(&mut config.cloud.region, "AGS_CLOUD_REGION");

    if let Some(internal) = lookup("AGS_CLOUD_INTERNAL") {
        config.cloud.internal = matches!(internal.trim(), "1" | "true" | "TRUE" | "True");
    }
}
