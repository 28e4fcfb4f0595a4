//! expose-symbols - build-time index of exposed PHP classes.
//!
//! Scans a PHP source tree for classes that opt into exposure by
//! implementing the expose capability interfaces, records their structure,
//! purposes and selected methods, and persists the result as a JSON
//! artifact. At run time the artifact answers purpose queries and hands out
//! lazily hydrated symbols.
//!
//! # Architecture
//!
//! - `reflect`: PHP declaration scanner, type registry and reflector
//! - `discover`: file enumeration and the discovery driver
//! - `purpose`: purpose tree and its pattern search
//! - `symbol`: persisted records and hydrated symbols
//! - `index`: the artifact model and its JSON form
//! - `manager`: query access with a hydration cache
//! - `config`: YAML build configuration
//! - `report`: output formatting (text, JSON)

pub mod cli;
pub mod config;
pub mod discover;
pub mod error;
pub mod index;
pub mod manager;
pub mod purpose;
pub mod reflect;
pub mod report;
pub mod symbol;

pub use config::Config;
pub use discover::{compile, discover, BuildSession, Discovery, DiscoveryReport};
pub use error::{ExposeError, Result};
pub use index::{ExposedSymbolsIndex, IndexSource, PurposeKind};
pub use manager::SymbolManager;
pub use purpose::{PurposeMatch, PurposeTree};
pub use reflect::{ExposeClass, ExposeClassMethods, MethodFilter, TypeHandle, TypeRegistry};
pub use symbol::{ClassSymbol, MethodSymbol, Symbol};
