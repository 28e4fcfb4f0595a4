//! The exposed symbols index and its persisted JSON artifact.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ExposeError, Result};
use crate::purpose::PurposeTree;
use crate::reflect::Reflection;
use crate::symbol::{ClassRecord, MethodRecord};

/// File name of the artifact inside the output directory.
pub const DEFAULT_ARTIFACT_NAME: &str = "exposed.classes.json";

/// Which purpose tree a registration goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurposeKind {
    Class,
    Method,
}

/// Everything discovery produced, in the shape it is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedSymbolsIndex {
    #[serde(rename = "purposes", default)]
    pub class_purposes: PurposeTree,
    #[serde(default)]
    pub method_purposes: PurposeTree,
    /// Class records keyed by qualified class name.
    #[serde(default)]
    pub classes: IndexMap<String, ClassRecord>,
    /// Method records keyed by `Class::method`.
    #[serde(default)]
    pub methods: IndexMap<String, MethodRecord>,
}

impl ExposedSymbolsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.methods.is_empty()
    }

    pub fn register_purpose(&mut self, purpose: &str, name: &str, kind: PurposeKind) -> bool {
        match kind {
            PurposeKind::Class => self.class_purposes.register(purpose, name),
            PurposeKind::Method => self.method_purposes.register(purpose, name),
        }
    }

    /// Merge one reflected class.
    pub fn merge(&mut self, reflection: Reflection) {
        let Reflection {
            class_name,
            record,
            purposes,
            methods,
            method_purposes,
        } = reflection;

        for purpose in &purposes {
            self.register_purpose(purpose, &class_name, PurposeKind::Class);
        }
        self.classes.insert(class_name, record);
        for (key, record) in methods {
            self.methods.insert(key, record);
        }
        for (purpose, key) in &method_purposes {
            self.register_purpose(purpose, key, PurposeKind::Method);
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Write the artifact to `path` through a sibling temp file, so readers
    /// never see a partial file.
    pub fn write_artifact(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut json = self.to_json()?;
        json.push('\n');

        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), classes = self.classes.len(), "wrote artifact");
        Ok(())
    }

    /// Load an index from an artifact path or take an in-memory one.
    pub fn load(source: impl Into<IndexSource>) -> Result<Self> {
        match source.into() {
            IndexSource::Index(index) => Ok(index),
            IndexSource::Path(path) => {
                if !path.is_file() {
                    return Err(ExposeError::ArtifactNotFound(path));
                }
                let json = fs::read_to_string(&path)?;
                Self::from_json(&json).map_err(|source| ExposeError::MalformedArtifact { path, source })
            }
        }
    }
}

/// Where an index comes from.
#[derive(Debug, Clone)]
pub enum IndexSource {
    Path(PathBuf),
    Index(ExposedSymbolsIndex),
}

impl From<PathBuf> for IndexSource {
    fn from(path: PathBuf) -> Self {
        IndexSource::Path(path)
    }
}

impl From<&Path> for IndexSource {
    fn from(path: &Path) -> Self {
        IndexSource::Path(path.to_path_buf())
    }
}

impl From<&str> for IndexSource {
    fn from(path: &str) -> Self {
        IndexSource::Path(PathBuf::from(path))
    }
}

impl From<ExposedSymbolsIndex> for IndexSource {
    fn from(index: ExposedSymbolsIndex) -> Self {
        IndexSource::Index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ExposedSymbolsIndex {
        let mut index = ExposedSymbolsIndex::new();
        index.register_purpose("ACTIONCONTROLLER", "App\\Index", PurposeKind::Class);
        index.classes.insert(
            "App\\Index".to_string(),
            ClassRecord {
                display_name: Some("Home".to_string()),
                method_names: vec!["run".to_string()],
                ..Default::default()
            },
        );
        index.methods.insert(
            "App\\Index::run".to_string(),
            MethodRecord {
                is_public: true,
                ..Default::default()
            },
        );
        index.register_purpose("ACTION.RUN", "App\\Index::run", PurposeKind::Method);
        index
    }

    #[test]
    fn test_artifact_keys() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["purposes", "method_purposes", "classes", "methods"]);
        assert_eq!(value["purposes"]["ACTIONCONTROLLER"]["#"][0], "App\\Index");
        assert_eq!(value["method_purposes"]["ACTION"]["RUN"]["#"][0], "App\\Index::run");
    }

    #[test]
    fn test_write_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("build").join(DEFAULT_ARTIFACT_NAME);
        let index = sample();
        index.write_artifact(&path).unwrap();

        assert!(!dir.path().join("build").join("exposed.classes.json.tmp").exists());
        let loaded = ExposedSymbolsIndex::load(path.as_path()).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_load_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let error = ExposedSymbolsIndex::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(error, ExposeError::ArtifactNotFound(_)));
    }

    #[test]
    fn test_load_malformed_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let error = ExposedSymbolsIndex::load(path).unwrap_err();
        assert!(matches!(error, ExposeError::MalformedArtifact { .. }));
    }

    #[test]
    fn test_load_in_memory() {
        let index = sample();
        assert_eq!(ExposedSymbolsIndex::load(index.clone()).unwrap(), index);
    }

    #[test]
    fn test_missing_sections_default() {
        let index = ExposedSymbolsIndex::from_json(r#"{"classes": {}}"#).unwrap();
        assert!(index.is_empty());
        assert!(index.class_purposes.is_empty());
    }
}
