//! Hydrated symbols handed out by the [`SymbolManager`](crate::SymbolManager).

use std::fmt;
use std::sync::{Arc, Weak};

use super::records::{ClassRecord, MethodRecord};

/// Common accessors of class and method symbols.
pub trait Symbol {
    /// The fully qualified name (`Vendor\Class` or `Vendor\Class::method`).
    fn qualified_name(&self) -> &str;

    /// The `@display` name, if the declaration carried one.
    fn display_name(&self) -> Option<&str>;

    fn module_name(&self) -> Option<&str> {
        None
    }

    /// Display name, falling back to the last namespace segment.
    fn symbol_name(&self) -> &str {
        self.display_name()
            .unwrap_or_else(|| base_name(self.qualified_name()))
    }

    /// Everything before the last namespace separator.
    fn namespace(&self) -> Option<&str> {
        self.qualified_name()
            .rsplit_once('\\')
            .map(|(ns, _)| ns)
            .filter(|ns| !ns.is_empty())
    }
}

fn base_name(qualified: &str) -> &str {
    qualified.rsplit('\\').next().unwrap_or(qualified)
}

/// A hydrated exposed class.
pub struct ClassSymbol {
    qualified_name: String,
    display_name: Option<String>,
    module_name: Option<String>,
    inheritance: Vec<String>,
    instantiable: bool,
    exposed_methods: Vec<Arc<MethodSymbol>>,
}

impl ClassSymbol {
    /// Build a class symbol whose methods point back at it.
    ///
    /// `hydrate_method` is called with the still unpublished class for every
    /// listed method; methods it returns `None` for are left out.
    pub(crate) fn hydrate<F>(qualified_name: &str, record: &ClassRecord, mut hydrate_method: F) -> Arc<Self>
    where
        F: FnMut(&str, &Weak<ClassSymbol>) -> Option<Arc<MethodSymbol>>,
    {
        Arc::new_cyclic(|this| Self {
            qualified_name: qualified_name.to_string(),
            display_name: record.display_name.clone(),
            module_name: record.module_name.clone(),
            inheritance: record.inheritance_chain.clone(),
            instantiable: !record.is_abstract,
            exposed_methods: record
                .method_names
                .iter()
                .filter_map(|method| hydrate_method(method.as_str(), this))
                .collect(),
        })
    }

    /// Ancestor class names, root first.
    pub fn inheritance(&self) -> &[String] {
        &self.inheritance
    }

    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    pub fn exposed_methods(&self) -> &[Arc<MethodSymbol>] {
        &self.exposed_methods
    }

    /// Whether `ancestor` appears anywhere in the inheritance chain.
    pub fn inherits(&self, ancestor: &str) -> bool {
        self.inheritance.iter().any(|name| name == ancestor)
    }
}

impl Symbol for ClassSymbol {
    fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }
}

impl fmt::Debug for ClassSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSymbol")
            .field("qualified_name", &self.qualified_name)
            .field("display_name", &self.display_name)
            .field("module_name", &self.module_name)
            .field("inheritance", &self.inheritance)
            .field("instantiable", &self.instantiable)
            .field(
                "exposed_methods",
                &self
                    .exposed_methods()
                    .iter()
                    .map(|m| m.qualified_name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A hydrated exposed method.
///
/// The owning class is held weakly; it stays reachable for as long as the
/// manager that produced both symbols is alive.
pub struct MethodSymbol {
    qualified_name: String,
    record: MethodRecord,
    parent_class: Weak<ClassSymbol>,
}

impl MethodSymbol {
    pub(crate) fn from_record(
        qualified_name: &str,
        record: &MethodRecord,
        parent_class: Weak<ClassSymbol>,
    ) -> Self {
        Self {
            qualified_name: qualified_name.to_string(),
            record: record.clone(),
            parent_class,
        }
    }

    pub fn parent_class(&self) -> Option<Arc<ClassSymbol>> {
        self.parent_class.upgrade()
    }

    /// The method name without its class.
    pub fn method_name(&self) -> &str {
        self.qualified_name
            .split_once("::")
            .map(|(_, m)| m)
            .unwrap_or(&self.qualified_name)
    }

    pub fn is_public(&self) -> bool {
        self.record.is_public
    }

    pub fn is_protected(&self) -> bool {
        self.record.is_protected
    }

    pub fn is_private(&self) -> bool {
        self.record.is_private
    }

    pub fn is_static(&self) -> bool {
        self.record.is_static
    }

    pub fn is_abstract(&self) -> bool {
        self.record.is_abstract
    }

    pub fn is_final(&self) -> bool {
        self.record.is_final
    }

    pub fn is_internal(&self) -> bool {
        self.record.is_internal
    }

    pub fn is_constructor(&self) -> bool {
        self.record.is_constructor
    }

    pub fn is_destructor(&self) -> bool {
        self.record.is_destructor
    }

    pub fn is_deprecated(&self) -> bool {
        self.record.is_deprecated
    }

    pub fn return_type(&self) -> Option<&str> {
        self.record.return_type_name.as_deref()
    }
}

impl Symbol for MethodSymbol {
    fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    fn display_name(&self) -> Option<&str> {
        self.record.display_name.as_deref()
    }

    fn module_name(&self) -> Option<&str> {
        None
    }

    /// Namespace of the owning class.
    fn namespace(&self) -> Option<&str> {
        let class = self
            .qualified_name
            .split_once("::")
            .map(|(c, _)| c)
            .unwrap_or(&self.qualified_name);
        class
            .rsplit_once('\\')
            .map(|(ns, _)| ns)
            .filter(|ns| !ns.is_empty())
    }
}

impl fmt::Debug for MethodSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSymbol")
            .field("qualified_name", &self.qualified_name)
            .field("record", &self.record)
            .field("has_parent", &(self.parent_class.strong_count() > 0))
            .finish()
    }
}
