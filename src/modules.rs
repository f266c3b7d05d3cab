//! Module list loading for the scripts pipeline.
//!
//! The module list is a hand-maintained TOML file giving the exact
//! concatenation order of the script bundle. It is read from disk at the
//! start of every scripts build, never cached, so edits take effect without
//! restarting a watch session.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Module list loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleListError {
    /// The list file could not be read
    #[error("failed to read module list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The list file is not valid TOML
    #[error("failed to parse module list {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ModuleList {
    #[serde(default)]
    modules: Vec<PathBuf>,
}

/// Read the ordered module list from disk.
///
/// Relative entries resolve against the list file's directory. Paths are
/// not checked for existence here; a missing module fails when the scripts
/// pipeline reads it.
pub fn load(path: &Path) -> Result<Vec<PathBuf>, ModuleListError> {
    let contents = fs::read_to_string(path).map_err(|source| ModuleListError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let list: ModuleList = toml::from_str(&contents).map_err(|source| ModuleListError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(list
        .modules
        .into_iter()
        .map(|p| if p.is_absolute() { p } else { base.join(p) })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_preserves_order() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("modules.toml");
        fs::write(&list, "modules = [\"util.js\", \"dom.js\", \"main.js\"]\n").unwrap();

        let modules = load(&list).unwrap();
        assert_eq!(
            modules,
            vec![
                temp.path().join("util.js"),
                temp.path().join("dom.js"),
                temp.path().join("main.js"),
            ]
        );
    }

    #[test]
    fn test_load_reflects_edits_between_calls() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("modules.toml");
        fs::write(&list, "modules = [\"a.js\"]\n").unwrap();
        assert_eq!(load(&list).unwrap().len(), 1);

        fs::write(&list, "modules = [\"b.js\", \"a.js\"]\n").unwrap();
        let modules = load(&list).unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0], temp.path().join("b.js"));
    }

    #[test]
    fn test_load_keeps_absolute_paths() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("modules.toml");
        fs::write(&list, "modules = [\"/opt/js/vendor.js\"]\n").unwrap();

        let modules = load(&list).unwrap();
        assert_eq!(modules, vec![PathBuf::from("/opt/js/vendor.js")]);
    }

    #[test]
    fn test_load_empty_list() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("modules.toml");
        fs::write(&list, "").unwrap();
        assert!(load(&list).unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/modules.toml")).unwrap_err();
        assert!(matches!(err, ModuleListError::Io { .. }));
    }

    #[test]
    fn test_load_bad_toml() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("modules.toml");
        fs::write(&list, "modules = not-a-list").unwrap();
        assert!(matches!(load(&list).unwrap_err(), ModuleListError::Parse { .. }));
    }
}
