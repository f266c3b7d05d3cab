//! Configuration schema types for `assets.toml`
//!
//! Defines the structure and defaults for assetmill project configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,
    /// Destination root for all built assets
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_name(), out: default_out() }
    }
}

fn default_name() -> String {
    "assets".to_string()
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

/// Style sheet pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Root directory of the style sources
    #[serde(default = "default_styles_src")]
    pub src: PathBuf,
    /// Output subdirectory under the destination root
    #[serde(default = "default_styles_out")]
    pub out: PathBuf,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self { src: default_styles_src(), out: default_styles_out() }
    }
}

fn default_styles_src() -> PathBuf {
    PathBuf::from("scss")
}

fn default_styles_out() -> PathBuf {
    PathBuf::from("css")
}

/// Script pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Ordered module list file, re-read on every build
    #[serde(default = "default_modules_file")]
    pub modules: PathBuf,
    /// Name of the concatenated bundle
    #[serde(default = "default_bundle")]
    pub bundle: String,
    /// Output subdirectory under the destination root
    #[serde(default = "default_scripts_out")]
    pub out: PathBuf,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            modules: default_modules_file(),
            bundle: default_bundle(),
            out: default_scripts_out(),
        }
    }
}

fn default_modules_file() -> PathBuf {
    PathBuf::from("js/modules.toml")
}

fn default_bundle() -> String {
    "app.js".to_string()
}

fn default_scripts_out() -> PathBuf {
    PathBuf::from("js")
}

/// Image pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Root directory of the image sources
    #[serde(default = "default_images_src")]
    pub src: PathBuf,
    /// Output subdirectory under the destination root
    #[serde(default = "default_images_out")]
    pub out: PathBuf,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { src: default_images_src(), out: default_images_out() }
    }
}

fn default_images_src() -> PathBuf {
    PathBuf::from("img")
}

fn default_images_out() -> PathBuf {
    PathBuf::from("img")
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: false }
    }
}

/// Dev server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Complete assets.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MillConfig {
    /// Project metadata
    #[serde(default)]
    pub project: ProjectConfig,
    /// Style sheet pipeline
    #[serde(default)]
    pub styles: StylesConfig,
    /// Script pipeline
    #[serde(default)]
    pub scripts: ScriptsConfig,
    /// Image pipeline
    #[serde(default)]
    pub images: ImagesConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Dev server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl MillConfig {
    /// Validate the configuration, returning a list of problems.
    ///
    /// An empty list means the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push("project.name must not be empty".to_string());
        }
        if self.project.out.as_os_str().is_empty() {
            errors.push("project.out must not be empty".to_string());
        }
        if self.scripts.bundle.is_empty() {
            errors.push("scripts.bundle must not be empty".to_string());
        }
        if !self.scripts.bundle.ends_with(".js") {
            errors.push(format!(
                "scripts.bundle must end with .js, got '{}'",
                self.scripts.bundle
            ));
        }
        if self.watch.debounce_ms == 0 {
            errors.push("watch.debounce_ms must be greater than zero".to_string());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MillConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.project.out, PathBuf::from("dist"));
        assert_eq!(config.styles.src, PathBuf::from("scss"));
        assert_eq!(config.scripts.bundle, "app.js");
        assert_eq!(config.watch.debounce_ms, 100);
        assert_eq!(config.serve.port, 3000);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: MillConfig = toml::from_str("").unwrap();
        assert_eq!(config.project.name, "assets");
        assert_eq!(config.images.src, PathBuf::from("img"));
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: MillConfig = toml::from_str(
            r#"
            [project]
            out = "public"

            [scripts]
            bundle = "site.js"

            [serve]
            port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(config.project.out, PathBuf::from("public"));
        assert_eq!(config.scripts.bundle, "site.js");
        assert_eq!(config.serve.port, 8080);
        // untouched sections keep defaults
        assert_eq!(config.styles.src, PathBuf::from("scss"));
    }

    #[test]
    fn test_validate_rejects_bad_bundle_name() {
        let mut config = MillConfig::default();
        config.scripts.bundle = "app.css".to_string();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("scripts.bundle"));
    }

    #[test]
    fn test_validate_rejects_zero_debounce() {
        let mut config = MillConfig::default();
        config.watch.debounce_ms = 0;
        assert!(!config.validate().is_empty());
    }
}
