//! Turns a resolved class handle into the records the index persists.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::symbol::{method_key, ClassRecord, MethodRecord};

use super::capability::{MethodFilter, MethodInfo, TypeHandle};

lazy_static! {
    /// One `@tag value` per doc comment line. Also matches single-line
    /// `/** @tag value */` comments.
    static ref DOC_TAG: Regex =
        Regex::new(r"(?m)^[ \t]*(?:/\*\*)?[ \t]*\*?[ \t]*@([A-Za-z][A-Za-z0-9_-]*)(?:[ \t]+(.*?))?[ \t]*(?:\*/)?[ \t]*$")
            .unwrap();
    static ref USE_STATEMENT: Regex =
        Regex::new(r"(?im)^\s*use\s+\\?([a-z_0-9\\]+)\s*;").unwrap();
}

/// A doc comment tag and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTag {
    /// Lowercased tag name without the `@`.
    pub name: String,
    pub value: String,
}

/// Extract every `@tag` from a doc comment, in order.
///
/// Values are trimmed and lose one pair of surrounding quotes.
pub fn doc_tags(doc: &str) -> Vec<DocTag> {
    DOC_TAG
        .captures_iter(doc)
        .map(|caps| {
            let value = caps.get(2).map_or("", |m| m.as_str().trim());
            DocTag {
                name: caps[1].to_ascii_lowercase(),
                value: unquote(value).to_string(),
            }
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// The last non-empty value of `tag`.
fn last_tag<'a>(tags: &'a [DocTag], tag: &str) -> Option<&'a str> {
    tags.iter()
        .rev()
        .find(|t| t.name == tag && !t.value.is_empty())
        .map(|t| t.value.as_str())
}

/// Plain `use Vendor\Class;` imports of a file, keyed by their last segment.
///
/// Grouped, aliased and function/const imports are not recorded.
pub fn file_imports(source: &str) -> IndexMap<String, String> {
    let mut imports = IndexMap::new();
    for caps in USE_STATEMENT.captures_iter(source) {
        let name = &caps[1];
        let alias = name.rsplit('\\').next().unwrap_or(name);
        imports.insert(alias.to_string(), name.to_string());
    }
    imports
}

/// Everything discovery learns about one exposable class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflection {
    pub class_name: String,
    pub record: ClassRecord,
    pub purposes: Vec<String>,
    /// Method records keyed by `Class::method`.
    pub methods: Vec<(String, MethodRecord)>,
    /// `(purpose, Class::method)` pairs.
    pub method_purposes: Vec<(String, String)>,
}

/// Reflect a class.
///
/// Returns `Ok(None)` when the class does not opt into exposure. `module`
/// overrides any `@module` doc tag. `source` is the text of the declaring
/// file, used for its imports.
pub fn reflect(handle: &dyn TypeHandle, source: &str, module: Option<&str>) -> Result<Option<Reflection>> {
    let Some(exposable) = handle.exposable() else {
        return Ok(None);
    };
    let class_name = handle.qualified_name().to_string();

    let mut inheritance = Vec::new();
    let mut ancestor = handle.parent();
    while let Some(parent) = ancestor {
        inheritance.push(parent.qualified_name().to_string());
        ancestor = parent.parent();
    }
    inheritance.reverse();

    let class_tags = handle.doc_comment().map(doc_tags).unwrap_or_default();
    let mut record = ClassRecord {
        inheritance_chain: inheritance,
        is_abstract: !handle.is_instantiable(),
        display_name: last_tag(&class_tags, "display").map(str::to_string),
        module_name: module
            .map(str::to_string)
            .or_else(|| last_tag(&class_tags, "module").map(str::to_string)),
        import_aliases: file_imports(source),
        method_names: Vec::new(),
    };

    let purposes = exposable.purposes()?;

    let mut methods = Vec::new();
    let mut method_purposes = Vec::new();
    if let Some(exposes_methods) = handle.method_exposable() {
        let filter = exposes_methods.method_filter_options()?;
        for method in handle.methods() {
            if !filter.admits(method) {
                continue;
            }
            let tags = method.doc.as_deref().map(doc_tags).unwrap_or_default();
            let tagged: Vec<&str> = tags
                .iter()
                .filter(|t| t.name == "purpose" && !t.value.is_empty())
                .map(|t| t.value.as_str())
                .collect();
            if filter.contains(MethodFilter::PURPOSED_ONLY) && tagged.is_empty() {
                continue;
            }

            let key = method_key(&class_name, &method.name);
            for purpose in tagged {
                method_purposes.push((purpose.to_string(), key.clone()));
            }
            record.method_names.push(method.name.clone());
            methods.push((key, method_record(method, &tags)));
        }
    }

    tracing::debug!(
        class = %class_name,
        purposes = purposes.len(),
        methods = methods.len(),
        "reflected"
    );

    Ok(Some(Reflection {
        class_name,
        record,
        purposes,
        methods,
        method_purposes,
    }))
}

/// Methods come from scanned user code, so none is internal to the runtime.
/// Deprecation follows the `#[\Deprecated]` attribute, not the doc tag.
fn method_record(method: &MethodInfo, tags: &[DocTag]) -> MethodRecord {
    MethodRecord {
        is_public: method.is_public(),
        is_protected: method.is_protected(),
        is_private: method.is_private(),
        is_static: method.is_static,
        is_abstract: method.is_abstract,
        is_final: method.is_final,
        is_internal: false,
        is_constructor: method.is_constructor(),
        is_destructor: method.is_destructor(),
        is_deprecated: method.is_deprecated,
        display_name: last_tag(tags, "display").map(str::to_string),
        return_type_name: method.return_type.clone(),
    }
}
