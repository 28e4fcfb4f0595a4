//! Declaration scanner for PHP source files.
//!
//! Parses a file with tree-sitter and extracts the declaration skeleton the
//! registry links into class handles: namespace, `use` aliases, classes,
//! interfaces, traits and enums with their modifiers, parents, constants and
//! methods. Method bodies are skipped except for the first top-level
//! `return`, which is kept as a constant expression when it is one.

#[cfg(feature = "tree-sitter")]
use streaming_iterator::StreamingIterator;
#[cfg(feature = "tree-sitter")]
use tree_sitter::{Language, Node, Parser as TsParser, Query, QueryCursor};

use indexmap::IndexMap;

/// Names PHP resolves without consulting the namespace.
const RESERVED_TYPES: &[&str] = &[
    "self", "static", "parent", "int", "float", "string", "bool", "array", "callable",
    "iterable", "object", "mixed", "void", "null", "never", "false", "true",
];

/// Resolve a class or type name the way PHP does for declarations.
///
/// Fully qualified names lose their leading backslash, the first segment is
/// looked up among the `use` aliases, anything else is prefixed with the
/// current namespace. Builtin types and `self`/`static`/`parent` are
/// returned lowercased.
pub fn resolve_name(name: &str, namespace: Option<&str>, aliases: &IndexMap<String, String>) -> String {
    if let Some(absolute) = name.strip_prefix('\\') {
        return absolute.to_string();
    }

    let lower = name.to_ascii_lowercase();
    if RESERVED_TYPES.contains(&lower.as_str()) {
        return lower;
    }

    let (first, rest) = match name.split_once('\\') {
        Some((first, rest)) => (first, Some(rest)),
        None => (name, None),
    };

    if first.eq_ignore_ascii_case("namespace") {
        let rest = rest.unwrap_or_default();
        return match namespace {
            Some(ns) => format!("{}\\{}", ns, rest),
            None => rest.to_string(),
        };
    }

    if let Some(target) = aliases.get(&first.to_ascii_lowercase()) {
        return match rest {
            Some(rest) => format!("{}\\{}", target, rest),
            None => target.clone(),
        };
    }

    match namespace {
        Some(ns) => format!("{}\\{}", ns, name),
        None => name.to_string(),
    }
}

/// Binary operators a constant expression may combine terms with, besides `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitXor,
    Concat,
}

impl BinaryOp {
    #[cfg_attr(not(feature = "tree-sitter"), allow(dead_code))]
    fn from_operator(operator: &str) -> Option<Self> {
        match operator {
            "+" => Some(BinaryOp::Add),
            "-" => Some(BinaryOp::Sub),
            "*" => Some(BinaryOp::Mul),
            "<<" => Some(BinaryOp::ShiftLeft),
            ">>" => Some(BinaryOp::ShiftRight),
            "&" => Some(BinaryOp::BitAnd),
            "^" => Some(BinaryOp::BitXor),
            "." => Some(BinaryOp::Concat),
            _ => None,
        }
    }
}

/// A constant expression as far as a declaration scanner can see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstExpr {
    Str(String),
    Int(i64),
    /// `Class::NAME`; the class is resolved unless it is `self`, `static` or `parent`.
    ClassConst { class: String, name: String },
    Array(Vec<ConstExpr>),
    BitOr(Vec<ConstExpr>),
    Binary {
        op: BinaryOp,
        left: Box<ConstExpr>,
        right: Box<ConstExpr>,
    },
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub doc: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    /// Carries the `#[\Deprecated]` attribute.
    pub is_deprecated: bool,
    pub return_type: Option<String>,
    /// The first top-level `return` expression of the body.
    pub returns: Option<ConstExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    /// Fully qualified name.
    pub name: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub is_final: bool,
    pub doc: Option<String>,
    /// Parent class, or parent interfaces for an interface.
    pub extends: Vec<String>,
    pub implements: Vec<String>,
    pub traits: Vec<String>,
    pub constants: IndexMap<String, ConstExpr>,
    pub methods: Vec<MethodDecl>,
}

impl ClassDecl {
    #[cfg_attr(not(feature = "tree-sitter"), allow(dead_code))]
    fn new(name: String, kind: ClassKind) -> Self {
        Self {
            name,
            kind,
            is_abstract: false,
            is_final: false,
            doc: None,
            extends: Vec::new(),
            implements: Vec::new(),
            traits: Vec::new(),
            constants: IndexMap::new(),
            methods: Vec::new(),
        }
    }
}

/// Everything the scanner extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceUnit {
    pub namespace: Option<String>,
    /// Lowercased alias to fully qualified name.
    pub aliases: IndexMap<String, String>,
    pub classes: Vec<ClassDecl>,
}

/// Statements that change the naming context, and the declarations
/// resolved against it, in document order.
#[cfg(feature = "tree-sitter")]
const DECLARATION_QUERY: &str = r#"
(namespace_definition) @namespace
(namespace_use_declaration) @use
(class_declaration) @class
(interface_declaration) @interface
(trait_declaration) @trait
(enum_declaration) @enum
"#;

#[cfg(feature = "tree-sitter")]
fn language() -> Language {
    tree_sitter_php::LANGUAGE_PHP.into()
}

/// Scan PHP source text for declarations.
#[cfg(feature = "tree-sitter")]
pub fn parse_source(src: &str) -> Result<SourceUnit, String> {
    let language = language();
    let mut parser = TsParser::new();
    parser.set_language(&language).map_err(|e| e.to_string())?;
    let tree = parser
        .parse(src, None)
        .ok_or_else(|| "failed to parse source".to_string())?;

    let source = src.as_bytes();
    let query = Query::new(&language, DECLARATION_QUERY).map_err(|e| e.to_string())?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);

    let mut found: Vec<(Node, &str)> = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let capture_name = query.capture_names()[capture.index as usize];
            found.push((capture.node, capture_name));
        }
    }
    found.sort_by_key(|(node, _)| node.start_byte());

    let mut scanner = Scanner {
        source,
        unit: SourceUnit::default(),
    };
    for (node, capture_name) in found {
        if !at_declaration_level(node) {
            continue;
        }
        match capture_name {
            "namespace" => scanner.enter_namespace(node),
            "use" => scanner.add_imports(node),
            "class" => scanner.add_class(node, ClassKind::Class),
            "interface" => scanner.add_class(node, ClassKind::Interface),
            "trait" => scanner.add_class(node, ClassKind::Trait),
            "enum" => scanner.add_class(node, ClassKind::Enum),
            _ => {}
        }
    }
    Ok(scanner.unit)
}

/// Scan PHP source text for declarations (unavailable without tree-sitter).
#[cfg(not(feature = "tree-sitter"))]
pub fn parse_source(_src: &str) -> Result<SourceUnit, String> {
    Err("built without tree-sitter support".to_string())
}

/// Top-level statements, directly or inside a braced namespace. Declarations
/// nested in functions or conditionals only exist once that code runs.
#[cfg(feature = "tree-sitter")]
fn at_declaration_level(node: Node) -> bool {
    match node.parent() {
        Some(parent) if parent.kind() == "program" => true,
        Some(parent) if parent.kind() == "compound_statement" => parent
            .parent()
            .map_or(false, |grand| grand.kind() == "namespace_definition"),
        _ => false,
    }
}

/// Named children minus comments and other extras.
#[cfg(feature = "tree-sitter")]
fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

/// The doc block right before a declaration, skipping plain comments.
#[cfg(feature = "tree-sitter")]
fn doc_comment(node: Node, source: &[u8]) -> Option<String> {
    let mut previous = node.prev_named_sibling();
    while let Some(sibling) = previous {
        if sibling.kind() != "comment" {
            return None;
        }
        let text = sibling.utf8_text(source).unwrap_or("");
        if text.starts_with("/**") && text != "/**/" {
            return Some(text.to_string());
        }
        previous = sibling.prev_named_sibling();
    }
    None
}

#[cfg(feature = "tree-sitter")]
fn parse_int(text: &str) -> Option<i64> {
    let clean = text.replace('_', "");
    let lower = clean.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        i64::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}

/// Decode an escape sequence of a double quoted string.
#[cfg(feature = "tree-sitter")]
fn unescape(sequence: &str) -> String {
    match sequence {
        "\\n" => "\n".to_string(),
        "\\t" => "\t".to_string(),
        "\\r" => "\r".to_string(),
        "\\v" => "\u{0B}".to_string(),
        "\\e" => "\u{1B}".to_string(),
        "\\f" => "\u{0C}".to_string(),
        "\\\\" => "\\".to_string(),
        "\\$" => "$".to_string(),
        "\\\"" => "\"".to_string(),
        "\\'" => "'".to_string(),
        _ => sequence.to_string(),
    }
}

#[cfg(feature = "tree-sitter")]
struct Scanner<'s> {
    source: &'s [u8],
    unit: SourceUnit,
}

#[cfg(feature = "tree-sitter")]
impl<'s> Scanner<'s> {
    fn text(&self, node: Node) -> &'s str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn resolve(&self, name: &str) -> String {
        resolve_name(name, self.unit.namespace.as_deref(), &self.unit.aliases)
    }

    fn enter_namespace(&mut self, node: Node) {
        self.unit.namespace = node
            .child_by_field_name("name")
            .map(|name| self.text(name).trim_start_matches('\\').to_string());
        self.unit.aliases.clear();
    }

    /// Record the class aliases of a `use` statement. Function and constant
    /// imports are ignored.
    fn add_imports(&mut self, node: Node) {
        if node.child_by_field_name("type").is_some() {
            return;
        }

        match node.child_by_field_name("body") {
            Some(group) => {
                let prefix = named_children(node)
                    .into_iter()
                    .find(|child| child.kind() == "namespace_name")
                    .map(|prefix| self.text(prefix).trim_matches('\\').to_string())
                    .unwrap_or_default();
                for clause in named_children(group) {
                    if clause.kind() == "namespace_use_clause" && clause.child_by_field_name("type").is_none() {
                        self.add_import(clause, &prefix);
                    }
                }
            }
            None => {
                for clause in named_children(node) {
                    if clause.kind() == "namespace_use_clause" {
                        self.add_import(clause, "");
                    }
                }
            }
        }
    }

    fn add_import(&mut self, clause: Node, prefix: &str) {
        let Some(target) = named_children(clause)
            .into_iter()
            .find(|child| matches!(child.kind(), "name" | "qualified_name"))
        else {
            return;
        };
        let target = self.text(target).trim_start_matches('\\');
        let name = if prefix.is_empty() {
            target.to_string()
        } else {
            format!("{}\\{}", prefix, target)
        };
        let alias = match clause.child_by_field_name("alias") {
            Some(alias) => self.text(alias).to_string(),
            None => name.rsplit('\\').next().unwrap_or(&name).to_string(),
        };
        self.unit.aliases.insert(alias.to_ascii_lowercase(), name);
    }

    fn add_class(&mut self, node: Node, kind: ClassKind) {
        let Some(short_name) = node.child_by_field_name("name").map(|name| self.text(name)) else {
            return;
        };
        let name = match &self.unit.namespace {
            Some(ns) => format!("{}\\{}", ns, short_name),
            None => short_name.to_string(),
        };

        let mut decl = ClassDecl::new(name, kind);
        decl.doc = doc_comment(node, self.source);
        for child in named_children(node) {
            match child.kind() {
                "abstract_modifier" => decl.is_abstract = true,
                "final_modifier" => decl.is_final = true,
                "base_clause" => decl.extends = self.resolve_names(child),
                "class_interface_clause" => decl.implements = self.resolve_names(child),
                _ => {}
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            for member in named_children(body) {
                match member.kind() {
                    "method_declaration" => {
                        if let Some(method) = self.method(member, kind) {
                            decl.methods.push(method);
                        }
                    }
                    "const_declaration" => self.add_constants(member, &mut decl),
                    "use_declaration" => decl.traits.extend(self.resolve_names(member)),
                    _ => {}
                }
            }
        }

        self.unit.classes.push(decl);
    }

    fn resolve_names(&self, list: Node) -> Vec<String> {
        named_children(list)
            .into_iter()
            .filter(|child| matches!(child.kind(), "name" | "qualified_name" | "relative_name"))
            .map(|child| self.resolve(self.text(child)))
            .collect()
    }

    fn add_constants(&self, node: Node, decl: &mut ClassDecl) {
        for element in named_children(node) {
            if element.kind() != "const_element" {
                continue;
            }
            let parts = named_children(element);
            if let [name, value, ..] = parts.as_slice() {
                decl.constants
                    .insert(self.text(*name).to_string(), self.const_expr(*value));
            }
        }
    }

    fn method(&self, node: Node, kind: ClassKind) -> Option<MethodDecl> {
        let name = self.text(node.child_by_field_name("name")?).to_string();

        let mut method = MethodDecl {
            name,
            doc: doc_comment(node, self.source),
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_final: false,
            is_deprecated: self.has_attribute(node, "Deprecated"),
            return_type: node.child_by_field_name("return_type").map(|ty| self.type_name(ty)),
            returns: None,
        };
        for child in named_children(node) {
            match child.kind() {
                "visibility_modifier" => {
                    method.visibility = match self.text(child).to_ascii_lowercase().as_str() {
                        "private" => Visibility::Private,
                        "protected" => Visibility::Protected,
                        _ => Visibility::Public,
                    }
                }
                "static_modifier" => method.is_static = true,
                "abstract_modifier" => method.is_abstract = true,
                "final_modifier" => method.is_final = true,
                _ => {}
            }
        }

        match node.child_by_field_name("body") {
            Some(body) => method.returns = self.first_return(body),
            None => method.is_abstract |= kind == ClassKind::Interface,
        }
        Some(method)
    }

    /// Whether a declaration carries the attribute with the qualified name `name`.
    fn has_attribute(&self, node: Node, name: &str) -> bool {
        let Some(list) = node.child_by_field_name("attributes") else {
            return false;
        };
        named_children(list)
            .into_iter()
            .flat_map(named_children)
            .filter(|attribute| attribute.kind() == "attribute")
            .filter_map(|attribute| named_children(attribute).first().copied())
            .any(|attribute| self.resolve(self.text(attribute)).eq_ignore_ascii_case(name))
    }

    /// A declared type; nullable types keep the inner type and unions or
    /// intersections are joined with `|`.
    fn type_name(&self, node: Node) -> String {
        match node.kind() {
            "optional_type" | "named_type" => match named_children(node).first() {
                Some(inner) => self.type_name(*inner),
                None => self.resolve(self.text(node)),
            },
            "union_type" | "intersection_type" | "disjunctive_normal_form_type" => named_children(node)
                .into_iter()
                .map(|part| self.type_name(part))
                .collect::<Vec<_>>()
                .join("|"),
            _ => self.resolve(self.text(node).trim()),
        }
    }

    fn first_return(&self, body: Node) -> Option<ConstExpr> {
        let statement = named_children(body)
            .into_iter()
            .find(|statement| statement.kind() == "return_statement")?;
        Some(match named_children(statement).first() {
            Some(value) => self.const_expr(*value),
            None => ConstExpr::Unsupported,
        })
    }

    fn const_expr(&self, node: Node) -> ConstExpr {
        match node.kind() {
            "integer" => parse_int(self.text(node))
                .map(ConstExpr::Int)
                .unwrap_or(ConstExpr::Unsupported),
            "string" | "encapsed_string" => self.string_literal(node),
            "heredoc" | "nowdoc" => self.doc_string(node),
            "parenthesized_expression" => match named_children(node).first() {
                Some(inner) => self.const_expr(*inner),
                None => ConstExpr::Unsupported,
            },
            "unary_op_expression" => {
                let operator = node.child_by_field_name("operator").map(|op| self.text(op));
                let operand = node
                    .child_by_field_name("argument")
                    .or_else(|| named_children(node).last().copied())
                    .map(|argument| self.const_expr(argument));
                match (operator, operand) {
                    (Some("-"), Some(ConstExpr::Int(value))) => ConstExpr::Int(-value),
                    (Some("+"), Some(ConstExpr::Int(value))) => ConstExpr::Int(value),
                    _ => ConstExpr::Unsupported,
                }
            }
            "array_creation_expression" => ConstExpr::Array(
                named_children(node)
                    .into_iter()
                    .filter(|element| element.kind() == "array_element_initializer")
                    .map(|element| self.array_value(element))
                    .collect(),
            ),
            "class_constant_access_expression" => self.class_constant(node),
            "binary_expression" => self.binary(node),
            _ => ConstExpr::Unsupported,
        }
    }

    /// The value of an array element; keys are dropped.
    fn array_value(&self, element: Node) -> ConstExpr {
        let parts = named_children(element);
        match parts.last() {
            Some(value) if !matches!(value.kind(), "by_ref" | "variadic_unpacking") => self.const_expr(*value),
            _ => ConstExpr::Unsupported,
        }
    }

    fn class_constant(&self, node: Node) -> ConstExpr {
        let parts = named_children(node);
        let [scope, name] = parts.as_slice() else {
            return ConstExpr::Unsupported;
        };
        if name.kind() != "name" {
            return ConstExpr::Unsupported;
        }
        let class = match scope.kind() {
            "relative_scope" => self.text(*scope).to_ascii_lowercase(),
            "name" | "qualified_name" | "relative_name" => self.resolve(self.text(*scope)),
            _ => return ConstExpr::Unsupported,
        };
        ConstExpr::ClassConst {
            class,
            name: self.text(*name).to_string(),
        }
    }

    fn binary(&self, node: Node) -> ConstExpr {
        let (Some(left), Some(operator), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("operator"),
            node.child_by_field_name("right"),
        ) else {
            return ConstExpr::Unsupported;
        };
        let left = self.const_expr(left);
        let right = self.const_expr(right);
        if left == ConstExpr::Unsupported || right == ConstExpr::Unsupported {
            return ConstExpr::Unsupported;
        }

        match self.text(operator) {
            "|" => match left {
                ConstExpr::BitOr(mut terms) => {
                    terms.push(right);
                    ConstExpr::BitOr(terms)
                }
                left => ConstExpr::BitOr(vec![left, right]),
            },
            operator => match BinaryOp::from_operator(operator) {
                Some(op) => ConstExpr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                None => ConstExpr::Unsupported,
            },
        }
    }

    /// Quoted strings without interpolation.
    fn string_literal(&self, node: Node) -> ConstExpr {
        let single_quoted = node.kind() == "string";
        let mut value = String::new();
        for part in named_children(node) {
            match part.kind() {
                "string_content" => value.push_str(self.text(part)),
                "escape_sequence" if single_quoted => value.push_str(&self.text(part)[1..]),
                "escape_sequence" => value.push_str(&unescape(self.text(part))),
                _ => return ConstExpr::Unsupported,
            }
        }
        ConstExpr::Str(value)
    }

    /// Heredoc and nowdoc bodies, as written, when nothing is interpolated.
    fn doc_string(&self, node: Node) -> ConstExpr {
        let Some(body) = node.child_by_field_name("value") else {
            return ConstExpr::Str(String::new());
        };
        let interpolated = named_children(body)
            .iter()
            .any(|part| !matches!(part.kind(), "string_content" | "escape_sequence" | "nowdoc_string"));
        if interpolated {
            return ConstExpr::Unsupported;
        }
        ConstExpr::Str(self.text(body).trim_matches(['\r', '\n']).to_string())
    }
}
