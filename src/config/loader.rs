//! Configuration loading and discovery for `assets.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::MillConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "assets.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse assets.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override destination root
    pub out: Option<PathBuf>,
    /// Override the styles source root
    pub styles_src: Option<PathBuf>,
    /// Override the dev server port
    pub port: Option<u16>,
}

/// Find assets.toml by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if an assets.toml file is found
/// - `None` if no config file is found
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find assets.toml by walking up from a specific directory.
///
/// This is the internal implementation that allows specifying the start
/// directory, useful for testing.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            // Reached root, no config found
            return None;
        }
    }
}

/// Load configuration from an assets.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses
/// [`find_config`] to locate it. If no config file is found, returns a
/// default configuration.
pub fn load_config(path: Option<&Path>) -> Result<MillConfig, ConfigError> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    let config = match path {
        Some(p) => {
            let contents = fs::read_to_string(&p)?;
            toml::from_str(&contents)?
        }
        None => default_config(),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    Ok(config)
}

/// Return the built-in default configuration.
pub fn default_config() -> MillConfig {
    MillConfig::default()
}

/// Apply CLI overrides on top of a loaded configuration.
pub fn merge_cli_overrides(config: &mut MillConfig, overrides: &CliOverrides) {
    if let Some(out) = &overrides.out {
        config.project.out = out.clone();
    }
    if let Some(src) = &overrides.styles_src {
        config.styles.src = src.clone();
    }
    if let Some(port) = overrides.port {
        config.serve.port = port;
    }
}
