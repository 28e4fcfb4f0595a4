//! Source file enumeration.

use std::path::{Path, PathBuf};

use globset::GlobSet;
use indexmap::IndexMap;
use regex::Regex;
use walkdir::WalkDir;

/// Supplies candidate source files and their module membership.
pub trait SourceEnumerator {
    /// Files under `roots` whose file name matches `pattern`, lazily.
    fn source_files<'a>(&'a self, pattern: &'a Regex, roots: &'a [String]) -> Box<dyn Iterator<Item = PathBuf> + 'a>;

    /// The module a file belongs to, if any.
    fn module_of(&self, path: &Path) -> Option<String>;
}

/// Walks the configured directories in sorted order.
#[derive(Debug, Clone)]
pub struct WalkSourceEnumerator {
    search_paths: IndexMap<String, Vec<PathBuf>>,
    modules: Vec<(String, PathBuf)>,
    excluded: GlobSet,
    base: PathBuf,
}

impl WalkSourceEnumerator {
    /// All directories are taken relative to `base`.
    pub fn new(base: &Path, search_paths: IndexMap<String, Vec<PathBuf>>) -> Self {
        let search_paths = search_paths
            .into_iter()
            .map(|(root, dirs)| (root, dirs.iter().map(|d| base.join(d)).collect()))
            .collect();
        Self {
            search_paths,
            modules: Vec::new(),
            excluded: GlobSet::empty(),
            base: base.to_path_buf(),
        }
    }

    pub fn with_modules<I>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        self.modules = modules
            .into_iter()
            .map(|(name, dir)| (name, self.base.join(dir)))
            .collect();
        // Deepest directory first so nested modules win.
        self.modules
            .sort_by(|a, b| b.1.components().count().cmp(&a.1.components().count()));
        self
    }

    pub fn with_excluded(mut self, excluded: GlobSet) -> Self {
        self.excluded = excluded;
        self
    }

    fn root_dirs(&self, root: &str) -> Vec<PathBuf> {
        match self.search_paths.get(root) {
            Some(dirs) => dirs.clone(),
            None => vec![self.base.join(root)],
        }
    }

    fn is_excluded(&self, dir: &Path, root: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        let name = dir.file_name().map(Path::new);
        let relative = dir.strip_prefix(root).unwrap_or(dir);
        self.excluded.is_match(relative) || name.map_or(false, |n| self.excluded.is_match(n))
    }
}

impl SourceEnumerator for WalkSourceEnumerator {
    fn source_files<'a>(&'a self, pattern: &'a Regex, roots: &'a [String]) -> Box<dyn Iterator<Item = PathBuf> + 'a> {
        let iter = roots
            .iter()
            .flat_map(move |root| self.root_dirs(root))
            .flat_map(move |dir| {
                if !dir.is_dir() {
                    tracing::warn!(dir = %dir.display(), "search directory does not exist");
                }
                let walk_root = dir.clone();
                WalkDir::new(dir)
                    .follow_links(true)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(move |entry| {
                        if entry.depth() == 0 || !entry.file_type().is_dir() {
                            return true;
                        }
                        let name = entry.file_name().to_string_lossy();
                        // Skip hidden directories
                        !name.starts_with('.') && !self.is_excluded(entry.path(), &walk_root)
                    })
                    .filter_map(|entry| match entry {
                        Ok(entry) => Some(entry),
                        Err(error) => {
                            tracing::warn!("skipping unreadable entry: {}", error);
                            None
                        }
                    })
            })
            .filter(move |entry| {
                entry.file_type().is_file()
                    && entry
                        .file_name()
                        .to_str()
                        .map_or(false, |name| pattern.is_match(name))
            })
            .map(|entry| entry.into_path());
        Box::new(iter)
    }

    fn module_of(&self, path: &Path) -> Option<String> {
        self.modules
            .iter()
            .find(|(_, dir)| path.starts_with(dir))
            .map(|(name, _)| name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<?php").unwrap();
    }

    fn pattern() -> Regex {
        Regex::new(r"(?i)^([a-z_][a-z_0-9]*?)\.php$").unwrap()
    }

    #[test]
    fn test_enumerates_sorted_matching_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/B.php"));
        touch(&dir.path().join("src/A.php"));
        touch(&dir.path().join("src/Sub/C.php"));
        touch(&dir.path().join("src/not-a-class.php"));
        touch(&dir.path().join("src/readme.md"));
        touch(&dir.path().join("src/.hidden/D.php"));

        let mut paths = IndexMap::new();
        paths.insert("classes".to_string(), vec![PathBuf::from("src")]);
        let enumerator = WalkSourceEnumerator::new(dir.path(), paths);

        let pattern = pattern();
        let roots = vec!["classes".to_string()];
        let files: Vec<String> = enumerator
            .source_files(&pattern, &roots)
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(files, vec!["src/A.php", "src/B.php", "src/Sub/C.php"]);
    }

    #[test]
    fn test_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/A.php"));
        touch(&dir.path().join("src/tests/T.php"));

        let mut builder = globset::GlobSetBuilder::new();
        builder.add(globset::Glob::new("tests").unwrap());
        let enumerator = WalkSourceEnumerator::new(dir.path(), IndexMap::new())
            .with_excluded(builder.build().unwrap());

        let pattern = pattern();
        let roots = vec!["src".to_string()];
        let files: Vec<PathBuf> = enumerator.source_files(&pattern, &roots).collect();
        assert_eq!(files, vec![dir.path().join("src/A.php")]);
    }

    #[test]
    fn test_root_dirs_fall_back_to_directory_name() {
        let mut paths = IndexMap::new();
        paths.insert("classes".to_string(), vec![PathBuf::from("src"), PathBuf::from("lib")]);
        let enumerator = WalkSourceEnumerator::new(Path::new("/p"), paths);
        assert_eq!(
            enumerator.root_dirs("classes"),
            vec![PathBuf::from("/p/src"), PathBuf::from("/p/lib")]
        );
        assert_eq!(enumerator.root_dirs("extra"), vec![PathBuf::from("/p/extra")]);
    }

    #[test]
    fn test_module_of_prefers_deepest() {
        let base = Path::new("/p");
        let enumerator = WalkSourceEnumerator::new(base, IndexMap::new()).with_modules(vec![
            ("Shop".to_string(), PathBuf::from("src/Shop")),
            ("Checkout".to_string(), PathBuf::from("src/Shop/Checkout")),
        ]);
        assert_eq!(
            enumerator.module_of(Path::new("/p/src/Shop/Checkout/Pay.php")).as_deref(),
            Some("Checkout")
        );
        assert_eq!(
            enumerator.module_of(Path::new("/p/src/Shop/Cart.php")).as_deref(),
            Some("Shop")
        );
        assert_eq!(enumerator.module_of(Path::new("/p/src/Other.php")), None);
    }
}
