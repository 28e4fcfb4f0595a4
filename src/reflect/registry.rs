//! The type registry: declarations loaded from source files, linked on
//! demand into class handles.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ExposeError, Result};

use super::capability::{
    builtin_filter_constant, ExposeClass, ExposeClassMethods, MethodFilter, MethodInfo, TypeHandle,
};
use super::locator::ClassLocator;
use super::source::{parse_source, BinaryOp, ClassDecl, ClassKind, ConstExpr, MethodDecl};

/// Constant references are followed at most this deep.
const MAX_CONST_DEPTH: usize = 32;

/// Names of the two capability interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub expose_class: String,
    pub expose_methods: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            expose_class: "Skyline\\Kernel\\ExposeClassInterface".to_string(),
            expose_methods: "Skyline\\Kernel\\ExposeClassMethodsInterface".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Declared {
    decl: Arc<ClassDecl>,
    file: PathBuf,
}

/// Holds every declaration seen so far and the classes linked from them.
///
/// A class is linked the first time it is resolved: its parent, traits and
/// interfaces are resolved first (autoloading through the locators when
/// needed), then its method table and capability answers are computed.
pub struct TypeRegistry {
    capabilities: Capabilities,
    declared: HashMap<String, Declared>,
    linked: HashMap<String, Arc<LoadedClass>>,
    loaded_files: HashSet<PathBuf>,
    locators: Vec<Box<dyn ClassLocator>>,
    /// Classes currently being linked, innermost last.
    linking: Vec<String>,
}

fn registry_key(name: &str) -> String {
    name.trim_start_matches('\\').to_ascii_lowercase()
}

impl TypeRegistry {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            declared: HashMap::new(),
            linked: HashMap::new(),
            loaded_files: HashSet::new(),
            locators: Vec::new(),
            linking: Vec::new(),
        }
    }

    pub fn add_locator(&mut self, locator: Box<dyn ClassLocator>) {
        self.locators.push(locator);
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(&registry_key(name))
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.loaded_files.contains(path)
    }

    /// Read and scan a file. Loading the same path twice is a no-op.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        if self.is_loaded(path) {
            return Ok(0);
        }
        let source = fs::read_to_string(path)?;
        self.load_source(path, &source)
    }

    /// Scan already-read source text on behalf of `path`.
    ///
    /// Returns the number of classes the file declared.
    pub fn load_source(&mut self, path: &Path, source: &str) -> Result<usize> {
        if !self.loaded_files.insert(path.to_path_buf()) {
            return Ok(0);
        }

        let unit = parse_source(source).map_err(|reason| ExposeError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        let mut count = 0;
        for decl in unit.classes {
            let key = registry_key(&decl.name);
            if let Some(existing) = self.declared.get(&key) {
                return Err(ExposeError::DuplicateDeclaration {
                    name: decl.name,
                    previous: existing.file.clone(),
                });
            }
            self.declared.insert(
                key,
                Declared {
                    decl: Arc::new(decl),
                    file: path.to_path_buf(),
                },
            );
            count += 1;
        }

        tracing::debug!(file = %path.display(), classes = count, "loaded source");
        Ok(count)
    }

    /// An already linked class.
    pub fn get(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.linked.get(&registry_key(name)).cloned()
    }

    /// Resolve a class by name, autoloading and linking it as needed.
    ///
    /// `Ok(None)` means no loaded or locatable file declares the class.
    pub fn resolve(&mut self, name: &str) -> Result<Option<Arc<LoadedClass>>> {
        let key = registry_key(name);
        if let Some(class) = self.linked.get(&key) {
            return Ok(Some(class.clone()));
        }

        if !self.declared.contains_key(&key) {
            self.autoload(name);
        }
        let Some(declared) = self.declared.get(&key).cloned() else {
            return Ok(None);
        };

        if self.linking.contains(&key) {
            return Err(ExposeError::CyclicInheritance(declared.decl.name.clone()));
        }

        self.linking.push(key.clone());
        let linked = self.link(declared);
        self.linking.pop();

        let class = Arc::new(linked?);
        self.linked.insert(key, class.clone());
        Ok(Some(class))
    }

    fn autoload(&mut self, name: &str) {
        let candidates: Vec<PathBuf> = self
            .locators
            .iter()
            .flat_map(|locator| locator.candidates(name))
            .collect();

        for path in candidates {
            if self.is_loaded(&path) {
                continue;
            }
            if let Err(error) = self.load_file(&path) {
                tracing::warn!(file = %path.display(), class = name, "autoload failed: {}", error);
                continue;
            }
            if self.is_declared(name) {
                tracing::trace!(file = %path.display(), class = name, "autoloaded");
                return;
            }
        }
    }

    fn require(&mut self, name: &str) -> Result<Arc<LoadedClass>> {
        self.resolve(name)?
            .ok_or_else(|| ExposeError::UnresolvableType(name.to_string()))
    }

    fn link(&mut self, declared: Declared) -> Result<LoadedClass> {
        let decl = declared.decl;

        let (parent, interface_names) = match decl.kind {
            ClassKind::Interface => (None, decl.extends.clone()),
            _ => {
                let parent = match decl.extends.first() {
                    Some(name) => Some(self.require(name)?),
                    None => None,
                };
                (parent, decl.implements.clone())
            }
        };

        let mut interfaces = InterfaceSet::default();
        let mut interface_handles = Vec::new();
        if let Some(parent) = &parent {
            for name in &parent.interfaces {
                interfaces.insert(name);
            }
        }
        for name in &interface_names {
            if name.eq_ignore_ascii_case(&self.capabilities.expose_methods) {
                interfaces.insert(name);
                interfaces.insert(&self.capabilities.expose_class);
                continue;
            }
            if name.eq_ignore_ascii_case(&self.capabilities.expose_class) {
                interfaces.insert(name);
                continue;
            }
            match self.resolve(name)? {
                Some(interface) => {
                    interfaces.insert(&interface.decl.name);
                    for inherited in &interface.interfaces {
                        interfaces.insert(inherited);
                    }
                    interface_handles.push(interface);
                }
                None => {
                    tracing::debug!(class = %decl.name, interface = %name, "interface not found, keeping name only");
                    interfaces.insert(name);
                }
            }
        }

        let mut traits = Vec::new();
        for name in &decl.traits {
            traits.push(self.require(name)?);
        }

        let methods = build_method_table(&decl, &traits, parent.as_deref());
        let instantiable = decl.kind == ClassKind::Class
            && !decl.is_abstract
            && methods
                .iter()
                .find(|m| m.is_constructor())
                .map_or(true, MethodInfo::is_public);

        let mut class = LoadedClass {
            decl,
            file: declared.file,
            parent,
            interface_handles,
            interfaces: interfaces.into_names(),
            methods,
            instantiable,
            capability: Capability::None,
        };
        class.capability = self.capability_for(&class);

        tracing::trace!(class = %class.decl.name, "linked");
        Ok(class)
    }

    fn capability_for(&mut self, class: &LoadedClass) -> Capability {
        let exposes_methods = class.implements(&self.capabilities.expose_methods);
        let exposes = exposes_methods || class.implements(&self.capabilities.expose_class);
        if !exposes {
            return Capability::None;
        }

        let purposes = self
            .eval_static_return(class, "getPurposes")
            .and_then(Value::into_string_list);
        if !exposes_methods {
            return Capability::Class(ExposedClass {
                class: class.decl.name.clone(),
                purposes,
            });
        }

        let filter = self
            .eval_static_return(class, "getMethodFilterOptions")
            .and_then(Value::into_int)
            .and_then(|bits| {
                u32::try_from(bits)
                    .map(MethodFilter::from_bits)
                    .map_err(|_| format!("{} is not a valid method filter", bits))
            });
        Capability::Methods(ExposedMethods {
            class: class.decl.name.clone(),
            purposes,
            filter,
        })
    }

    /// Evaluate the constant `return` of a method on `class`.
    fn eval_static_return(&mut self, class: &LoadedClass, method: &str) -> Result<Value, String> {
        let Some(info) = class.method(method) else {
            return Err(format!("{}() is not declared", method));
        };
        let Some(expr) = &info.returns else {
            return Err(format!("{}::{}() has no return", info.declaring_class, method));
        };
        let expr = expr.clone();
        let owner = info.declaring_class.clone();
        self.eval(&expr, class, &owner, 0)
            .map_err(|reason| format!("{}::{}(): {}", owner, method, reason))
    }

    /// Evaluate a constant expression. `owner` is the class `self::` refers
    /// to; `static::` always refers to the class being linked.
    fn eval(&mut self, expr: &ConstExpr, context: &LoadedClass, owner: &str, depth: usize) -> Result<Value, String> {
        if depth > MAX_CONST_DEPTH {
            return Err("constant references nest too deeply".to_string());
        }
        match expr {
            ConstExpr::Str(value) => Ok(Value::Str(value.clone())),
            ConstExpr::Int(value) => Ok(Value::Int(*value)),
            ConstExpr::Array(items) => items
                .iter()
                .map(|item| self.eval(item, context, owner, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            ConstExpr::BitOr(terms) => {
                let mut bits = 0;
                for term in terms {
                    bits |= self.eval(term, context, owner, depth + 1)?.into_int()?;
                }
                Ok(Value::Int(bits))
            }
            ConstExpr::Binary { op, left, right } => {
                let left = self.eval(left, context, owner, depth + 1)?;
                let right = self.eval(right, context, owner, depth + 1)?;
                apply_binary(*op, left, right)
            }
            ConstExpr::ClassConst { class, name } => {
                self.eval_class_constant(class, name, context, owner, depth)
            }
            ConstExpr::Unsupported => Err("return value is not a constant expression".to_string()),
        }
    }

    fn eval_class_constant(
        &mut self,
        class: &str,
        name: &str,
        context: &LoadedClass,
        owner: &str,
        depth: usize,
    ) -> Result<Value, String> {
        let target = match class {
            "self" => owner.to_string(),
            "static" => context.decl.name.clone(),
            "parent" => self
                .parent_name_of(owner, context)
                .ok_or_else(|| format!("{} has no parent", owner))?,
            _ => class.to_string(),
        };

        if name.eq_ignore_ascii_case("class") {
            return Ok(Value::Str(target));
        }

        let found = if target.eq_ignore_ascii_case(&context.decl.name) {
            find_constant(context, name)
        } else {
            match self.resolve(&target) {
                Ok(Some(resolved)) => find_constant(&resolved, name),
                Ok(None) => None,
                Err(error) => return Err(error.to_string()),
            }
        };

        match found {
            Some((expr, declared_in)) => self.eval(&expr, context, &declared_in, depth + 1),
            None => builtin_filter_constant(name)
                .map(Value::Int)
                .ok_or_else(|| format!("undefined constant {}::{}", target, name)),
        }
    }

    fn parent_name_of(&self, owner: &str, context: &LoadedClass) -> Option<String> {
        let parent = if owner.eq_ignore_ascii_case(&context.decl.name) {
            context.parent.clone()
        } else {
            self.get(owner).and_then(|class| class.parent.clone())
        };
        parent.map(|p| p.decl.name.clone())
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, String> {
    if op == BinaryOp::Concat {
        return Ok(Value::Str(format!("{}{}", left.into_text()?, right.into_text()?)));
    }

    let (left, right) = (left.into_int()?, right.into_int()?);
    let result = match op {
        BinaryOp::Add => left.checked_add(right),
        BinaryOp::Sub => left.checked_sub(right),
        BinaryOp::Mul => left.checked_mul(right),
        BinaryOp::ShiftLeft => u32::try_from(right).ok().and_then(|shift| left.checked_shl(shift)),
        BinaryOp::ShiftRight => u32::try_from(right).ok().and_then(|shift| left.checked_shr(shift)),
        BinaryOp::BitAnd => Some(left & right),
        BinaryOp::BitXor => Some(left ^ right),
        BinaryOp::Concat => None,
    };
    result
        .map(Value::Int)
        .ok_or_else(|| format!("integer operation {:?} overflows", op))
}

/// Find a constant on a class, its ancestors or its interfaces. Returns the
/// expression and the class that declares it.
fn find_constant(class: &LoadedClass, name: &str) -> Option<(ConstExpr, String)> {
    if let Some(expr) = class.decl.constants.get(name) {
        return Some((expr.clone(), class.decl.name.clone()));
    }
    if let Some(found) = class.parent.as_deref().and_then(|p| find_constant(p, name)) {
        return Some(found);
    }
    class
        .interface_handles
        .iter()
        .find_map(|interface| find_constant(interface, name))
}

fn method_info(method: &MethodDecl, declaring_class: &str) -> MethodInfo {
    MethodInfo {
        name: method.name.clone(),
        declaring_class: declaring_class.to_string(),
        doc: method.doc.clone(),
        visibility: method.visibility,
        is_static: method.is_static,
        is_abstract: method.is_abstract,
        is_final: method.is_final,
        is_deprecated: method.is_deprecated,
        return_type: method.return_type.clone(),
        returns: method.returns.clone(),
    }
}

/// Own methods, then trait methods, then non-private inherited ones. A name
/// already present shadows later ones.
fn build_method_table(decl: &ClassDecl, traits: &[Arc<LoadedClass>], parent: Option<&LoadedClass>) -> Vec<MethodInfo> {
    let mut seen = HashSet::new();
    let mut methods = Vec::new();

    for method in &decl.methods {
        if seen.insert(method.name.to_ascii_lowercase()) {
            methods.push(method_info(method, &decl.name));
        }
    }

    for used in traits {
        for method in &used.methods {
            if seen.insert(method.name.to_ascii_lowercase()) {
                let mut method = method.clone();
                method.declaring_class = decl.name.clone();
                methods.push(method);
            }
        }
    }

    if let Some(parent) = parent {
        for method in &parent.methods {
            if method.is_private() {
                continue;
            }
            if seen.insert(method.name.to_ascii_lowercase()) {
                methods.push(method.clone());
            }
        }
    }

    methods
}

/// Ordered, case-insensitively distinct interface names.
#[derive(Default)]
struct InterfaceSet {
    keys: HashSet<String>,
    names: Vec<String>,
}

impl InterfaceSet {
    fn insert(&mut self, name: &str) {
        if self.keys.insert(registry_key(name)) {
            self.names.push(name.trim_start_matches('\\').to_string());
        }
    }

    fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// A value produced by evaluating a constant expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String),
    Int(i64),
    List(Vec<Value>),
}

impl Value {
    fn into_int(self) -> Result<i64, String> {
        match self {
            Value::Int(value) => Ok(value),
            other => Err(format!("expected an integer, found {}", other.describe())),
        }
    }

    /// Scalars as PHP's string conversion renders them.
    fn into_text(self) -> Result<String, String> {
        match self {
            Value::Str(value) => Ok(value),
            Value::Int(value) => Ok(value.to_string()),
            other => Err(format!("expected a string, found {}", other.describe())),
        }
    }

    fn into_string_list(self) -> Result<Vec<String>, String> {
        let items = match self {
            Value::List(items) => items,
            other => return Err(format!("expected an array, found {}", other.describe())),
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Str(value) => Ok(value),
                other => Err(format!("expected a string, found {}", other.describe())),
            })
            .collect()
    }

    fn describe(&self) -> &'static str {
        match self {
            Value::Str(_) => "a string",
            Value::Int(_) => "an integer",
            Value::List(_) => "an array",
        }
    }
}

/// Answers of a class that implements the class-exposing interface.
#[derive(Debug, Clone)]
pub struct ExposedClass {
    class: String,
    purposes: Result<Vec<String>, String>,
}

impl ExposeClass for ExposedClass {
    fn purposes(&self) -> Result<Vec<String>> {
        self.purposes
            .clone()
            .map_err(|reason| ExposeError::reflection(&self.class, reason))
    }
}

/// Answers of a class that implements the method-exposing interface.
#[derive(Debug, Clone)]
pub struct ExposedMethods {
    class: String,
    purposes: Result<Vec<String>, String>,
    filter: Result<MethodFilter, String>,
}

impl ExposeClass for ExposedMethods {
    fn purposes(&self) -> Result<Vec<String>> {
        self.purposes
            .clone()
            .map_err(|reason| ExposeError::reflection(&self.class, reason))
    }
}

impl ExposeClassMethods for ExposedMethods {
    fn method_filter_options(&self) -> Result<MethodFilter> {
        self.filter
            .clone()
            .map_err(|reason| ExposeError::reflection(&self.class, reason))
    }
}

#[derive(Debug, Clone)]
enum Capability {
    None,
    Class(ExposedClass),
    Methods(ExposedMethods),
}

/// A linked class.
#[derive(Debug)]
pub struct LoadedClass {
    decl: Arc<ClassDecl>,
    file: PathBuf,
    parent: Option<Arc<LoadedClass>>,
    interface_handles: Vec<Arc<LoadedClass>>,
    /// Every implemented interface, inherited ones included.
    interfaces: Vec<String>,
    methods: Vec<MethodInfo>,
    instantiable: bool,
    capability: Capability,
}

impl LoadedClass {
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn kind(&self) -> ClassKind {
        self.decl.kind
    }

    /// The file the class was declared in.
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn implements(&self, interface: &str) -> bool {
        let interface = interface.trim_start_matches('\\');
        self.interfaces
            .iter()
            .any(|name| name.eq_ignore_ascii_case(interface))
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|method| method.name.eq_ignore_ascii_case(name))
    }

    /// Methods whose declaring class is this class.
    pub fn declared_methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods
            .iter()
            .filter(move |method| method.declaring_class == self.decl.name)
    }
}

impl TypeHandle for LoadedClass {
    fn qualified_name(&self) -> &str {
        &self.decl.name
    }

    fn parent(&self) -> Option<&dyn TypeHandle> {
        self.parent.as_deref().map(|p| p as &dyn TypeHandle)
    }

    fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    fn doc_comment(&self) -> Option<&str> {
        self.decl.doc.as_deref()
    }

    fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    fn exposable(&self) -> Option<&dyn ExposeClass> {
        match &self.capability {
            Capability::None => None,
            Capability::Class(exposed) => Some(exposed as &dyn ExposeClass),
            Capability::Methods(exposed) => Some(exposed as &dyn ExposeClass),
        }
    }

    fn method_exposable(&self) -> Option<&dyn ExposeClassMethods> {
        match &self.capability {
            Capability::Methods(exposed) => Some(exposed as &dyn ExposeClassMethods),
            _ => None,
        }
    }
}
