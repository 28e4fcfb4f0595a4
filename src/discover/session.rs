//! Build-time view of a finished discovery run, for later build steps that
//! still need the live class handles.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::index::ExposedSymbolsIndex;
use crate::purpose::PurposeMatches;
use crate::reflect::{LoadedClass, MethodFilter, MethodInfo};

use super::driver::Discovery;

pub struct BuildSession {
    index: ExposedSymbolsIndex,
    handles: IndexMap<String, Arc<LoadedClass>>,
    exclude_magic: bool,
}

impl From<Discovery> for BuildSession {
    fn from(discovery: Discovery) -> Self {
        Self::new(discovery.index, discovery.handles)
    }
}

impl BuildSession {
    pub fn new(index: ExposedSymbolsIndex, handles: IndexMap<String, Arc<LoadedClass>>) -> Self {
        Self {
            index,
            handles,
            exclude_magic: true,
        }
    }

    /// Whether [`find_class_methods`](Self::find_class_methods) drops `__*`
    /// methods. On by default.
    pub fn exclude_magic(mut self, exclude: bool) -> Self {
        self.exclude_magic = exclude;
        self
    }

    pub fn index(&self) -> &ExposedSymbolsIndex {
        &self.index
    }

    pub fn into_index(self) -> ExposedSymbolsIndex {
        self.index
    }

    /// Names of every class a scanned file resolved to.
    pub fn registered_class_names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    pub fn class_handle(&self, name: &str) -> Option<&Arc<LoadedClass>> {
        self.handles.get(name.trim_start_matches('\\'))
    }

    /// Methods declared by the class itself that pass `filter`, keyed by name.
    pub fn find_class_methods(&self, class_name: &str, filter: MethodFilter) -> Option<IndexMap<&str, &MethodInfo>> {
        let handle = self.class_handle(class_name)?;
        let methods = handle
            .declared_methods()
            .filter(|method| filter.admits(method))
            .filter(|method| !(self.exclude_magic && method.is_magic()))
            .map(|method| (method.name.as_str(), method))
            .collect();
        Some(methods)
    }

    pub fn yield_classes(&self, pattern: &str, include_parents: bool) -> PurposeMatches<'_> {
        self.index.class_purposes.search(pattern, include_parents)
    }

    pub fn yield_methods(&self, pattern: &str, include_parents: bool) -> PurposeMatches<'_> {
        self.index.method_purposes.search(pattern, include_parents)
    }

    /// Every class name registered under any purpose, in tree order.
    pub fn exposed_classes(&self) -> Vec<&str> {
        self.index.class_purposes.names()
    }

    /// Every method name registered under any purpose, in tree order.
    pub fn exposed_methods(&self) -> Vec<&str> {
        self.index.method_purposes.names()
    }

    /// Resolve a short symbol through the imports of `class_context`'s file.
    ///
    /// `None` when the class is not indexed or its file has no imports; a
    /// symbol without a matching import comes back unchanged.
    pub fn qualify_symbol(&self, symbol: &str, class_context: &str) -> Option<String> {
        let record = self.index.classes.get(class_context)?;
        if record.import_aliases.is_empty() {
            return None;
        }
        Some(
            record
                .import_aliases
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| symbol.to_string()),
        )
    }

    pub fn declared_module(&self, class_name: &str) -> Option<&str> {
        self.index.classes.get(class_name)?.module_name.as_deref()
    }
}
