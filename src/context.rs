//! Task context containing configuration and resolved paths for a build.

use crate::config::MillConfig;
use std::path::{Path, PathBuf};

/// Context shared by every pipeline and task run.
///
/// The context provides access to all information needed to execute a task:
/// the loaded configuration, the project root, and the resolved source and
/// destination directories.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// The loaded configuration
    config: MillConfig,
    /// Project root directory (where assets.toml is located)
    project_root: PathBuf,
    /// Whether to run in verbose mode
    verbose: bool,
    /// Whether to do a dry run (resolve and report, write nothing)
    dry_run: bool,
}

impl TaskContext {
    /// Create a new task context.
    pub fn new(config: MillConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, verbose: false, dry_run: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MillConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Destination root (resolved to an absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// Style source root.
    pub fn styles_src(&self) -> PathBuf {
        self.resolve_path(&self.config.styles.src)
    }

    /// Style output directory under the destination root.
    pub fn styles_out(&self) -> PathBuf {
        self.out_dir().join(&self.config.styles.out)
    }

    /// Module list file for the scripts pipeline.
    pub fn modules_file(&self) -> PathBuf {
        self.resolve_path(&self.config.scripts.modules)
    }

    /// Script output directory under the destination root.
    pub fn scripts_out(&self) -> PathBuf {
        self.out_dir().join(&self.config.scripts.out)
    }

    /// Image source root.
    pub fn images_src(&self) -> PathBuf {
        self.resolve_path(&self.config.images.src)
    }

    /// Image output directory under the destination root.
    pub fn images_out(&self) -> PathBuf {
        self.out_dir().join(&self.config.images.out)
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Whether dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
