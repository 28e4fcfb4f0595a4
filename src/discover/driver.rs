//! The discovery pass: enumerate files, resolve their classes, reflect the
//! exposable ones into an index.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ExposeError, Result};
use crate::index::ExposedSymbolsIndex;
use crate::reflect::{reflect, LoadedClass, StemLocator, TypeRegistry};

use super::source_files::SourceEnumerator;

lazy_static! {
    static ref NAMESPACE_DECL: Regex =
        Regex::new(r"(?im)^\s*namespace\s+([a-z_0-9\\]+)\s*;").unwrap();
}

/// One file that could not be processed.
#[derive(Debug)]
pub struct DiscoveryFailure {
    pub file: PathBuf,
    /// The class the file was expected to declare, when known.
    pub class: Option<String>,
    pub error: ExposeError,
}

/// Counters and failures of one discovery run.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Files whose name matched the class file pattern.
    pub scanned: usize,
    /// Classes merged into the index.
    pub indexed: usize,
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Result of a discovery run.
pub struct Discovery {
    pub index: ExposedSymbolsIndex,
    /// Every class a scanned file resolved to, exposable or not.
    pub handles: IndexMap<String, Arc<LoadedClass>>,
    pub report: DiscoveryReport,
}

/// The qualified class name a file is expected to declare.
///
/// The stem of the file, prefixed with the first `namespace` declaration of
/// the text if there is one.
pub fn expected_class_name(source: &str, stem: &str) -> String {
    match NAMESPACE_DECL.captures(source) {
        Some(caps) => format!("{}\\{}", caps[1].trim_start_matches('\\'), stem),
        None => stem.to_string(),
    }
}

/// Whether the text contains a `class <stem>` declaration.
pub fn declares_class(source: &str, stem: &str) -> bool {
    let pattern = format!(r"(?i)class\s+{}\b", regex::escape(stem));
    Regex::new(&pattern).map_or(false, |re| re.is_match(source))
}

/// Drives one discovery run over an enumerator.
pub struct DiscoveryDriver<'e> {
    enumerator: &'e dyn SourceEnumerator,
    registry: TypeRegistry,
    roots: Vec<String>,
    file_pattern: Regex,
}

impl<'e> DiscoveryDriver<'e> {
    pub fn new(enumerator: &'e dyn SourceEnumerator, registry: TypeRegistry, roots: Vec<String>, file_pattern: Regex) -> Self {
        Self {
            enumerator,
            registry,
            roots,
            file_pattern,
        }
    }

    pub fn run(mut self) -> Discovery {
        let files: Vec<PathBuf> = self
            .enumerator
            .source_files(&self.file_pattern, &self.roots)
            .collect();
        tracing::debug!(files = files.len(), "enumerated source files");

        // Lets ancestors that come later in enumeration order be loaded on
        // demand.
        self.registry
            .add_locator(Box::new(StemLocator::from_files(files.iter().map(PathBuf::as_path))));

        let mut discovery = Discovery {
            index: ExposedSymbolsIndex::new(),
            handles: IndexMap::new(),
            report: DiscoveryReport::default(),
        };

        for path in &files {
            let Some(stem) = self.class_stem(path) else {
                continue;
            };
            discovery.report.scanned += 1;

            let source = match fs::read_to_string(path) {
                Ok(source) => source,
                Err(error) => {
                    tracing::error!(file = %path.display(), "cannot read source: {}", error);
                    discovery.report.failures.push(DiscoveryFailure {
                        file: path.clone(),
                        class: None,
                        error: error.into(),
                    });
                    continue;
                }
            };

            if !declares_class(&source, &stem) {
                tracing::trace!(file = %path.display(), "no class declaration, skipping");
                continue;
            }

            let class_name = expected_class_name(&source, &stem);
            match self.index_class(path, &class_name, &source, &mut discovery) {
                Ok(true) => discovery.report.indexed += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::error!(file = %path.display(), class = %class_name, "{}", error);
                    discovery.report.failures.push(DiscoveryFailure {
                        file: path.clone(),
                        class: Some(class_name),
                        error,
                    });
                }
            }
        }

        tracing::debug!(
            scanned = discovery.report.scanned,
            indexed = discovery.report.indexed,
            failed = discovery.report.failures.len(),
            "discovery finished"
        );
        discovery
    }

    fn class_stem(&self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        self.file_pattern
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|stem| stem.as_str().to_string())
    }

    /// Returns whether the class was merged into the index.
    fn index_class(&mut self, path: &Path, class_name: &str, source: &str, discovery: &mut Discovery) -> Result<bool> {
        let handle = self.resolve_or_load(path, class_name, source)?;
        discovery
            .handles
            .insert(handle.name().to_string(), handle.clone());

        let module = self.enumerator.module_of(path);
        let Some(reflection) = reflect(handle.as_ref(), source, module.as_deref())? else {
            return Ok(false);
        };
        discovery.index.merge(reflection);
        Ok(true)
    }

    /// Resolve the class, loading its file once if it is not known yet.
    fn resolve_or_load(&mut self, path: &Path, class_name: &str, source: &str) -> Result<Arc<LoadedClass>> {
        let mut loaded = false;
        loop {
            if let Some(handle) = self.registry.resolve(class_name)? {
                return Ok(handle);
            }
            if loaded {
                return Err(ExposeError::UnresolvableType(class_name.to_string()));
            }
            self.registry.load_source(path, source)?;
            loaded = true;
        }
    }
}
