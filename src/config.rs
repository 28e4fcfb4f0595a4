//! Build configuration for expose-symbols.
//!
//! Read from `expose.yaml`; every field has a default so an empty file (or
//! no file at all) describes a conventional `src/` tree.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::index::DEFAULT_ARTIFACT_NAME;
use crate::reflect::Capabilities;

/// Config file names searched for, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["expose.yaml", "expose.yml", ".expose.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Logical search root name to the directories it covers.
    pub search_paths: IndexMap<String, Vec<PathBuf>>,
    /// Logical roots to scan. A name not in `search_paths` is used as a
    /// directory.
    pub roots: Vec<String>,
    /// Source file extension, without the dot.
    pub file_extension: String,
    pub output_dir: PathBuf,
    pub artifact_name: String,
    /// Module name to the directory its classes live under.
    pub modules: IndexMap<String, PathBuf>,
    /// Namespace prefix to the directories it autoloads from.
    pub autoload: IndexMap<String, Vec<PathBuf>>,
    pub capabilities: CapabilityConfig,
    /// Glob patterns for directories to skip (e.g. "vendor", "**/tests").
    pub excluded_dirs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut search_paths = IndexMap::new();
        search_paths.insert("classes".to_string(), vec![PathBuf::from("src")]);
        Self {
            search_paths,
            roots: vec!["classes".to_string()],
            file_extension: "php".to_string(),
            output_dir: PathBuf::from("build"),
            artifact_name: DEFAULT_ARTIFACT_NAME.to_string(),
            modules: IndexMap::new(),
            autoload: IndexMap::new(),
            capabilities: CapabilityConfig::default(),
            excluded_dirs: Vec::new(),
        }
    }
}

/// Names of the capability interfaces classes implement to be exposed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CapabilityConfig {
    pub expose_class: String,
    pub expose_methods: String,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        let defaults = Capabilities::default();
        Self {
            expose_class: defaults.expose_class,
            expose_methods: defaults.expose_methods,
        }
    }
}

impl From<&CapabilityConfig> for Capabilities {
    fn from(config: &CapabilityConfig) -> Self {
        Capabilities {
            expose_class: config.expose_class.trim_start_matches('\\').to_string(),
            expose_methods: config.expose_methods.trim_start_matches('\\').to_string(),
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        // An empty document deserializes as null.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Where the artifact goes, relative paths taken from `base`.
    pub fn artifact_path(&self, base: &Path) -> PathBuf {
        base.join(&self.output_dir).join(&self.artifact_name)
    }

    /// File name pattern for candidate class files: a class-like stem and
    /// the configured extension.
    pub fn file_pattern(&self) -> anyhow::Result<Regex> {
        let pattern = format!(
            r"(?i)^([a-z_][a-z_0-9]*?)\.{}$",
            regex::escape(&self.file_extension)
        );
        Ok(Regex::new(&pattern)?)
    }

    /// Compiled `excluded_dirs`; invalid patterns are skipped.
    pub fn excluded_set(&self) -> globset::GlobSet {
        let mut builder = globset::GlobSetBuilder::new();
        for pattern in &self.excluded_dirs {
            if let Ok(glob) = globset::Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| globset::GlobSet::empty())
    }
}

/// Find a config file in `dir`.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Validate a config.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    let extension = &config.file_extension;
    if extension.is_empty() || extension.starts_with('.') || extension.contains(['/', '\\']) {
        anyhow::bail!(
            "invalid file_extension {:?}, expected a bare extension such as \"php\"",
            extension
        );
    }

    if config.artifact_name.is_empty() || config.artifact_name.contains(['/', '\\']) {
        anyhow::bail!("invalid artifact_name {:?}", config.artifact_name);
    }

    if config.roots.is_empty() {
        anyhow::bail!("no roots configured");
    }

    for (name, value) in [
        ("expose_class", &config.capabilities.expose_class),
        ("expose_methods", &config.capabilities.expose_methods),
    ] {
        if value.trim_start_matches('\\').is_empty() {
            anyhow::bail!("capabilities.{} must name an interface", name);
        }
    }

    for pattern in &config.excluded_dirs {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_dirs pattern {:?}: {}", pattern, e))?;
    }

    Ok(())
}
