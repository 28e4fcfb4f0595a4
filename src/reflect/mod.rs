//! Static reflection of PHP classes.
//!
//! Source files are scanned for declarations, linked into class handles by
//! the [`TypeRegistry`] and turned into index records by [`reflect`].

mod capability;
mod locator;
mod reflector;
mod registry;
mod source;

pub use capability::{
    builtin_filter_constant, ExposeClass, ExposeClassMethods, MethodFilter, MethodInfo, TypeHandle,
};
pub use locator::{ClassLocator, PrefixLocator, StemLocator};
pub use reflector::{doc_tags, file_imports, reflect, DocTag, Reflection};
pub use registry::{Capabilities, ExposedClass, ExposedMethods, LoadedClass, TypeRegistry};
pub use source::{parse_source, resolve_name, ClassDecl, ClassKind, ConstExpr, MethodDecl, SourceUnit, Visibility};
