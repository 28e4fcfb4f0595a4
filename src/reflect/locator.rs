//! Lookup strategies the registry uses to load classes on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Maps a class name to the files that may declare it.
pub trait ClassLocator {
    fn candidates(&self, class_name: &str) -> Vec<PathBuf>;
}

/// Namespace-prefix autoloading: `Vendor\Pkg\` maps onto one or more
/// directories and the rest of the name onto a relative file path.
#[derive(Debug, Clone)]
pub struct PrefixLocator {
    /// Longest prefix first.
    prefixes: Vec<(String, Vec<PathBuf>)>,
    extension: String,
}

impl PrefixLocator {
    pub fn new<I>(mappings: I, extension: &str) -> Self
    where
        I: IntoIterator<Item = (String, Vec<PathBuf>)>,
    {
        let mut prefixes: Vec<(String, Vec<PathBuf>)> = mappings
            .into_iter()
            .map(|(prefix, dirs)| {
                let prefix = prefix.trim_matches('\\');
                let prefix = if prefix.is_empty() {
                    String::new()
                } else {
                    format!("{}\\", prefix)
                };
                (prefix, dirs)
            })
            .collect();
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            prefixes,
            extension: extension.to_string(),
        }
    }
}

impl ClassLocator for PrefixLocator {
    fn candidates(&self, class_name: &str) -> Vec<PathBuf> {
        let name = class_name.trim_start_matches('\\');
        let mut found = Vec::new();
        for (prefix, dirs) in &self.prefixes {
            let Some(rest) = name.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let relative = format!("{}.{}", rest.replace('\\', "/"), self.extension);
            found.extend(
                dirs.iter()
                    .map(|dir| dir.join(&relative))
                    .filter(|path| path.is_file()),
            );
        }
        found
    }
}

/// Fallback for source trees that do not follow a prefix layout: any
/// enumerated file whose stem equals the class base name.
#[derive(Debug, Clone, Default)]
pub struct StemLocator {
    by_stem: HashMap<String, Vec<PathBuf>>,
}

impl StemLocator {
    pub fn from_files<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut by_stem: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for path in files {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                by_stem
                    .entry(stem.to_ascii_lowercase())
                    .or_default()
                    .push(path.to_path_buf());
            }
        }
        Self { by_stem }
    }
}

impl ClassLocator for StemLocator {
    fn candidates(&self, class_name: &str) -> Vec<PathBuf> {
        let base = class_name.rsplit('\\').next().unwrap_or(class_name);
        self.by_stem
            .get(&base.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}
