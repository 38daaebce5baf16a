//! Suite discovery collaborator (out of scope beyond its
//! interface): "a finite sequence of `DiscoveredSuite` descriptors and, on
//! demand, a parsed `Suite`". Grounded in the pack's `loader` module
//! (reads a single file path into a `Plan` via `serde_yaml`/`serde_json`)
//! generalized from one file to a directory walk (`walkdir`, already a
//! pack-adjacent dependency) over many suite files, with a
//! `sha2` content hash per file for the scheduler's `ResultCache` key.

use crate::errors::{EngineError, ErrorCode};
use crate::model::{Priority, Suite};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct DiscoveredSuite {
    pub node_id: String,
    pub suite_name: String,
    pub priority: Priority,
    pub depends: Vec<String>,
    pub estimated_duration_ms: Option<u64>,
    pub discovery_index: usize,
    pub content_hash: String,
    pub has_input_step: bool,
}

pub trait SuiteSource: Send + Sync {
    /// Enumerates every discoverable suite without fully materializing its
    /// step list (the descriptor carries only what the scheduler needs).
    fn discover(&self) -> Result<Vec<DiscoveredSuite>, EngineError>;

    /// Loads and parses the full `Suite` for a previously discovered
    /// `node_id`.
    fn load(&self, node_id: &str) -> Result<Suite, EngineError>;

    /// Resolves a `call` step's `test` reference, which may name either a
    /// `node_id` or a filesystem path relative to the source root.
    fn load_by_ref(&self, reference: &str) -> Result<Suite, EngineError>;
}

/// Default collaborator: walks a directory for `*.yaml`/`*.yml` files and
/// parses each into a `Suite`.
pub struct FileSuiteSource {
    root: PathBuf,
    index: RwLock<HashMap<String, PathBuf>>,
}

impl FileSuiteSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: RwLock::new(HashMap::new()),
        }
    }

    fn parse_file(path: &Path) -> Result<(Suite, String), EngineError> {
        let bytes = fs::read(path).map_err(|e| {
            EngineError::Internal(format!("reading suite file {}: {}", path.display(), e))
        })?;
        let suite: Suite = serde_yaml::from_slice(&bytes).map_err(|e| {
            EngineError::Internal(format!("parsing suite file {}: {}", path.display(), e))
        })?;
        let hash = format!("{:x}", Sha256::digest(&bytes));
        Ok((suite, hash))
    }

    fn has_input_step(suite: &Suite) -> bool {
        suite.steps.iter().any(|s| s.input.is_some())
    }
}

impl SuiteSource for FileSuiteSource {
    fn discover(&self) -> Result<Vec<DiscoveredSuite>, EngineError> {
        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                matches!(
                    e.path().extension().and_then(|x| x.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .map(|e| e.into_path())
            .collect();
        // Stable discovery order: sorted by path, independent of the OS's
        // directory-entry ordering.
        paths.sort();

        let mut discovered = Vec::with_capacity(paths.len());
        let mut index = self.index.write().unwrap();
        index.clear();
        for (i, path) in paths.into_iter().enumerate() {
            let (suite, hash) = Self::parse_file(&path)?;
            if index.contains_key(&suite.node_id) {
                return Err(EngineError::DuplicateNodeId(suite.node_id));
            }
            index.insert(suite.node_id.clone(), path);
            discovered.push(DiscoveredSuite {
                node_id: suite.node_id.clone(),
                suite_name: suite.suite_name.clone(),
                priority: suite.priority(),
                depends: suite.depends.clone(),
                estimated_duration_ms: suite.metadata.as_ref().and_then(|m| m.estimated_duration_ms),
                discovery_index: i,
                content_hash: hash,
                has_input_step: Self::has_input_step(&suite),
            });
        }
        Ok(discovered)
    }

    fn load(&self, node_id: &str) -> Result<Suite, EngineError> {
        let path = {
            let index = self.index.read().unwrap();
            index.get(node_id).cloned()
        };
        let path = match path {
            Some(p) => p,
            None => {
                // Lazily (re)discover in case `load` is called before `discover`.
                self.discover()?;
                self.index
                    .read()
                    .unwrap()
                    .get(node_id)
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::Internal(format!("unknown suite node_id: {}", node_id))
                    })?
            }
        };
        Self::parse_file(&path).map(|(s, _)| s)
    }

    fn load_by_ref(&self, reference: &str) -> Result<Suite, EngineError> {
        if let Ok(suite) = self.load(reference) {
            return Ok(suite);
        }
        let candidate = self.root.join(reference);
        let path = if candidate.exists() {
            candidate
        } else {
            PathBuf::from(reference)
        };
        Self::parse_file(&path).map(|(s, _)| s)
    }
}

pub fn unknown_dependency_warning(node_id: &str, missing: &str) -> String {
    format!(
        "[{}] suite '{}' depends on unknown node_id '{}'; ignoring the edge",
        ErrorCode::MISSING_DEPENDENCY,
        node_id,
        missing
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_suite(dir: &Path, file_name: &str, yaml: &str) {
        let mut f = fs::File::create(dir.join(file_name)).unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
    }

    #[test]
    fn discovers_suites_in_stable_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(
            dir.path(),
            "b.yaml",
            "node_id: b\nsuite_name: B\nsteps:\n  - name: s1\n    request: {method: GET, url: /x}\n",
        );
        write_suite(
            dir.path(),
            "a.yaml",
            "node_id: a\nsuite_name: A\nsteps: []\n",
        );

        let source = FileSuiteSource::new(dir.path());
        let discovered = source.discover().unwrap();

        assert_eq!(discovered.len(), 2);
        assert_eq!(discovered[0].node_id, "a");
        assert_eq!(discovered[1].node_id, "b");
        assert!(!discovered[0].content_hash.is_empty());
    }

    #[test]
    fn load_returns_full_parsed_suite() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(
            dir.path(),
            "login.yaml",
            "node_id: login\nsuite_name: Login\nsteps:\n  - name: s1\n    request: {method: GET, url: /x}\n",
        );
        let source = FileSuiteSource::new(dir.path());
        source.discover().unwrap();

        let suite = source.load("login").unwrap();
        assert_eq!(suite.suite_name, "Login");
        assert_eq!(suite.steps.len(), 1);
    }

    #[test]
    fn detects_input_step_presence() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(
            dir.path(),
            "interactive.yaml",
            "node_id: i\nsuite_name: I\nsteps:\n  - name: ask\n    input: {prompts: [{variable: x, prompt: 'x?'}]}\n",
        );
        let source = FileSuiteSource::new(dir.path());
        let discovered = source.discover().unwrap();
        assert!(discovered[0].has_input_step);
    }

    #[test]
    fn duplicate_node_id_across_files_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(
            dir.path(),
            "a.yaml",
            "node_id: dup\nsuite_name: A\nsteps: []\n",
        );
        write_suite(
            dir.path(),
            "b.yaml",
            "node_id: dup\nsuite_name: B\nsteps: []\n",
        );
        let source = FileSuiteSource::new(dir.path());
        let err = source.discover().unwrap_err();
        assert!(matches!(err, EngineError::DuplicateNodeId(id) if id == "dup"));
    }
}
