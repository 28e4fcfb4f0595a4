//! Raw records as they are persisted in the exposed symbols artifact.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Structural facts about one exposed class.
///
/// The qualified name is the key of the `classes` map, so it is not repeated
/// inside the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Ancestor class names, root first.
    #[serde(
        rename = "inheritance",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub inheritance_chain: Vec<String>,
    #[serde(rename = "isAbstract", default, skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(rename = "display", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "module", default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    /// `use` statements of the declaring file, keyed by their last segment.
    #[serde(rename = "imports", default, skip_serializing_if = "IndexMap::is_empty")]
    pub import_aliases: IndexMap<String, String>,
    #[serde(rename = "methodNames", default, skip_serializing_if = "Vec::is_empty")]
    pub method_names: Vec<String>,
}

/// Modifier flags and annotations of one exposed method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRecord {
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_protected: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_private: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_internal: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_constructor: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_destructor: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deprecated: bool,
    #[serde(rename = "display", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    pub return_type_name: Option<String>,
}

/// Join a class name and a method name into a method's qualified name.
pub fn method_key(class_name: &str, method_name: &str) -> String {
    format!("{}::{}", class_name, method_name)
}

/// Split `Class::method` into its class and method parts.
pub fn split_method_key(qualified: &str) -> Option<(&str, &str)> {
    qualified.split_once("::")
}
