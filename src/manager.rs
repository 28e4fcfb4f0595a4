//! Query access to a persisted index, hydrating symbols on demand.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::index::{ExposedSymbolsIndex, IndexSource};
use crate::purpose::PurposeMatches;
use crate::symbol::{method_key, split_method_key, ClassSymbol, MethodSymbol};

/// Cache slots: `None` records a miss so repeated lookups stay cheap.
type Cache<T> = RwLock<HashMap<String, Option<Arc<T>>>>;

/// Read-side entry point to the exposed symbols.
///
/// Records are hydrated into [`ClassSymbol`]s and [`MethodSymbol`]s on first
/// lookup and cached; later lookups return the same `Arc`.
pub struct SymbolManager {
    index: ExposedSymbolsIndex,
    classes: Cache<ClassSymbol>,
    methods: Cache<MethodSymbol>,
}

fn cached<T>(cache: &Cache<T>, name: &str) -> Option<Option<Arc<T>>> {
    cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}

/// Insert unless another caller got there first; returns the winning slot
/// and whether it is ours.
fn insert_first<T>(cache: &Cache<T>, name: &str, slot: Option<Arc<T>>) -> (Option<Arc<T>>, bool) {
    let mut cache = cache.write().unwrap_or_else(PoisonError::into_inner);
    match cache.get(name) {
        Some(existing) => (existing.clone(), false),
        None => {
            cache.insert(name.to_string(), slot.clone());
            (slot, true)
        }
    }
}

impl SymbolManager {
    /// Open an artifact path or wrap an in-memory index.
    pub fn open(source: impl Into<IndexSource>) -> Result<Self> {
        ExposedSymbolsIndex::load(source).map(Self::new)
    }

    pub fn new(index: ExposedSymbolsIndex) -> Self {
        Self {
            index,
            classes: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
        }
    }

    pub fn index(&self) -> &ExposedSymbolsIndex {
        &self.index
    }

    /// Names of classes registered under purposes matching `pattern`.
    pub fn yield_classes(&self, pattern: &str, include_parents: bool) -> PurposeMatches<'_> {
        self.index.class_purposes.search(pattern, include_parents)
    }

    /// `Class::method` names registered under purposes matching `pattern`.
    pub fn yield_methods(&self, pattern: &str, include_parents: bool) -> PurposeMatches<'_> {
        self.index.method_purposes.search(pattern, include_parents)
    }

    pub fn exposed_class_names(&self) -> impl Iterator<Item = &str> {
        self.index.classes.keys().map(String::as_str)
    }

    pub fn exposed_method_names(&self) -> impl Iterator<Item = &str> {
        self.index.methods.keys().map(String::as_str)
    }

    pub fn display_name_of_class(&self, name: &str) -> Option<&str> {
        self.index.classes.get(name)?.display_name.as_deref()
    }

    pub fn display_name_of_method(&self, name: &str) -> Option<&str> {
        self.index.methods.get(name)?.display_name.as_deref()
    }

    /// The hydrated class, or `None` if the index has no such class.
    ///
    /// A class is published together with its methods, so every caller sees
    /// the complete method list.
    pub fn exposed_class(&self, name: &str) -> Option<Arc<ClassSymbol>> {
        if let Some(slot) = cached(&self.classes, name) {
            return slot;
        }

        let Some(record) = self.index.classes.get(name) else {
            return insert_first(&self.classes, name, None).0;
        };

        let mut hydrated = Vec::new();
        let symbol = ClassSymbol::hydrate(name, record, |method, parent| {
            let key = method_key(name, method);
            let method = Arc::new(MethodSymbol::from_record(
                &key,
                self.index.methods.get(&key)?,
                parent.clone(),
            ));
            hydrated.push((key, Arc::clone(&method)));
            Some(method)
        });

        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = classes.get(name) {
            return existing.clone();
        }
        {
            let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);
            for (key, method) in hydrated {
                methods.insert(key, Some(method));
            }
        }
        classes.insert(name.to_string(), Some(Arc::clone(&symbol)));
        tracing::trace!(class = name, methods = symbol.exposed_methods().len(), "hydrated class");
        Some(symbol)
    }

    /// The hydrated method for `Class::method`.
    pub fn exposed_method(&self, name: &str) -> Option<Arc<MethodSymbol>> {
        if let Some(slot) = cached(&self.methods, name) {
            return slot;
        }

        let Some(record) = self.index.methods.get(name) else {
            return insert_first(&self.methods, name, None).0;
        };

        // Methods the class lists are published with it.
        let parent = split_method_key(name).and_then(|(class, _)| self.exposed_class(class));
        if let Some(slot) = cached(&self.methods, name) {
            return slot;
        }

        let parent = parent.as_ref().map(Arc::downgrade).unwrap_or_default();
        let symbol = Arc::new(MethodSymbol::from_record(name, record, parent));
        insert_first(&self.methods, name, Some(symbol)).0
    }
}
