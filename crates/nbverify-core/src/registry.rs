//! Notebook registry.
//!
//! The list of notebooks under test is data, not code. A registry file
//! (`nbverify.toml` by default) looks like:
//!
//! ```toml
//! exclude = ["slow/long_run.ipynb"]
//!
//! [engine]
//! kernel = "python"
//! timeout_secs = 3600
//!
//! [[notebook]]
//! path = "Welcome_to_TerrainBento.ipynb"
//!
//! [[notebook]]
//! path = "example_usage/introduction_to_boundary_conditions.ipynb"
//! name = "boundary_conditions"
//! expect = "clean"
//! timeout_secs = 7200
//! ```
//!
//! Notebook paths are relative to the registry file's directory.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::case::{Expectation, VerificationCase, default_case_name};
use crate::error::{Error, Result};
use crate::invoke::EngineConfig;

/// Default registry file name.
pub const DEFAULT_REGISTRY_FILE: &str = "nbverify.toml";

/// Registry file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryFile {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Notebook paths that are listed but not executed.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Notebooks under test, in run order.
    #[serde(default, rename = "notebook")]
    pub notebooks: Vec<NotebookEntry>,
}

/// One `[[notebook]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotebookEntry {
    /// Notebook path, relative to the registry file.
    pub path: String,

    /// Case name; defaults to the notebook's file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Expected outcome.
    #[serde(default)]
    pub expect: Expectation,

    /// Per-case deadline override in seconds; 0 disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// A resolved registry: engine settings plus ordered cases.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Engine settings.
    pub engine: EngineConfig,
    /// Cases in run order.
    pub cases: Vec<RegisteredCase>,
}

/// A case together with its exclusion flag.
#[derive(Debug, Clone)]
pub struct RegisteredCase {
    pub case: VerificationCase,
    pub skip: bool,
}

impl Registry {
    /// Load a registry file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Registry(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file: RegistryFile = toml::from_str(&content)
            .map_err(|e| Error::Registry(format!("{}: {}", path.display(), e)))?;

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::from_file(file, base)
    }

    /// Resolve parsed registry contents against `base`.
    pub fn from_file(file: RegistryFile, base: &Path) -> Result<Self> {
        let excluded: HashSet<&str> = file.exclude.iter().map(|s| s.trim()).collect();
        let default_timeout = file.engine.timeout();

        let mut names = HashSet::new();
        let mut cases = Vec::with_capacity(file.notebooks.len());

        for entry in &file.notebooks {
            let rel = entry.path.trim();
            if rel.is_empty() {
                return Err(Error::Registry("notebook entry with empty path".to_string()));
            }

            let notebook = base.join(rel);
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| default_case_name(&notebook));
            if !names.insert(name.clone()) {
                return Err(Error::Registry(format!("duplicate case name '{name}'")));
            }

            let timeout = match entry.timeout_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => default_timeout,
            };

            cases.push(RegisteredCase {
                case: VerificationCase {
                    name,
                    notebook,
                    expect: entry.expect,
                    timeout,
                },
                skip: excluded.contains(rel),
            });
        }

        Ok(Self {
            engine: file.engine,
            cases,
        })
    }

    /// Build an ad-hoc registry from notebook paths, with default engine
    /// settings and clean expectations.
    pub fn from_paths<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();

        // Repeated stems fall back to the path without extension, so that
        // `X/run.ipynb` and `Y/run.ipynb` become `X/run` and `Y/run`.
        let mut stems: HashMap<String, usize> = HashMap::new();
        for path in &paths {
            *stems.entry(default_case_name(path)).or_default() += 1;
        }

        let file = RegistryFile {
            notebooks: paths
                .iter()
                .map(|p| {
                    let name = (stems[&default_case_name(p)] > 1)
                        .then(|| p.with_extension("").to_string_lossy().into_owned());
                    NotebookEntry {
                        path: p.to_string_lossy().into_owned(),
                        name,
                        expect: Expectation::Clean,
                        timeout_secs: None,
                    }
                })
                .collect(),
            ..RegistryFile::default()
        };
        Self::from_file(file, Path::new(""))
    }

    /// Replace the deadline of every case.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.engine.timeout_secs = timeout.map(|t| t.as_secs()).unwrap_or(0);
        for registered in &mut self.cases {
            registered.case.timeout = timeout;
        }
    }

    /// Keep only cases whose name contains `pattern`.
    pub fn retain_matching(&mut self, pattern: &str) {
        self.cases.retain(|c| c.case.name.contains(pattern));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"
exclude = ["coupled/slow.ipynb"]

[engine]
kernel = "python3"
timeout_secs = 120

[[notebook]]
path = "Welcome.ipynb"

[[notebook]]
path = "coupled/slow.ipynb"

[[notebook]]
path = "usage/broken.ipynb"
name = "broken_on_purpose"
expect = "errors"
timeout_secs = 0
"#;

    #[test]
    fn test_load_registry() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_REGISTRY_FILE);
        fs::write(&path, REGISTRY).unwrap();

        let registry = Registry::load(&path).unwrap();
        assert_eq!(registry.engine.kernel, "python3");
        assert_eq!(registry.engine.program, "jupyter");
        assert_eq!(registry.cases.len(), 3);

        let welcome = &registry.cases[0];
        assert_eq!(welcome.case.name, "Welcome");
        assert_eq!(welcome.case.notebook, temp.path().join("Welcome.ipynb"));
        assert_eq!(welcome.case.timeout, Some(Duration::from_secs(120)));
        assert!(!welcome.skip);

        assert!(registry.cases[1].skip);

        let broken = &registry.cases[2].case;
        assert_eq!(broken.name, "broken_on_purpose");
        assert_eq!(broken.expect, Expectation::Errors);
        assert_eq!(broken.timeout, None);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let file: RegistryFile = toml::from_str(
            r#"
[[notebook]]
path = "X/run.ipynb"

[[notebook]]
path = "Y/run.ipynb"
"#,
        )
        .unwrap();
        let err = Registry::from_file(file, Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("duplicate case name 'run'"));
    }

    #[test]
    fn test_same_base_name_with_explicit_names() {
        let file: RegistryFile = toml::from_str(
            r#"
[[notebook]]
path = "X/run.ipynb"
name = "x_run"

[[notebook]]
path = "Y/run.ipynb"
name = "y_run"
"#,
        )
        .unwrap();
        let registry = Registry::from_file(file, Path::new(".")).unwrap();
        assert_eq!(registry.cases.len(), 2);
    }

    #[test]
    fn test_empty_path_rejected() {
        let file: RegistryFile = toml::from_str("[[notebook]]\npath = \"  \"\n").unwrap();
        assert!(matches!(
            Registry::from_file(file, Path::new(".")),
            Err(Error::Registry(_))
        ));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_REGISTRY_FILE);
        fs::write(&path, "[[notebook]]\npath = \"a.ipynb\"\nkernal = \"py\"\n").unwrap();
        assert!(matches!(Registry::load(&path), Err(Error::Registry(_))));
    }

    #[test]
    fn test_from_paths_and_overrides() {
        let mut registry = Registry::from_paths(["a/first.ipynb", "b/second.ipynb"]).unwrap();
        assert_eq!(registry.cases[0].case.notebook, PathBuf::from("a/first.ipynb"));
        assert_eq!(registry.cases[1].case.timeout, registry.engine.timeout());

        registry.set_timeout(Some(Duration::from_secs(9)));
        assert!(
            registry
                .cases
                .iter()
                .all(|c| c.case.timeout == Some(Duration::from_secs(9)))
        );

        registry.retain_matching("sec");
        assert_eq!(registry.cases.len(), 1);
        assert_eq!(registry.cases[0].case.name, "second");
    }

    #[test]
    fn test_from_paths_same_base_name() {
        let registry = Registry::from_paths(["X/run.ipynb", "Y/run.ipynb", "Z/other.ipynb"]).unwrap();
        let names: Vec<_> = registry.cases.iter().map(|c| c.case.name.as_str()).collect();
        assert_eq!(names, ["X/run", "Y/run", "other"]);
    }
}
