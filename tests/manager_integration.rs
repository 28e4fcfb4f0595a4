//! Integration tests for the symbol manager over a compiled artifact.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use expose_symbols::report;
use expose_symbols::{compile, Config, ExposeError, ExposedSymbolsIndex, Symbol, SymbolManager};
use tempfile::TempDir;

fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join("php")
}

/// Compile the fixture project into a fresh directory and open the artifact.
fn open_compiled() -> (TempDir, SymbolManager) {
    let out = tempfile::tempdir().expect("should create tempdir");
    let config = Config::parse_file(fixture_root().join("expose.yaml")).expect("should parse fixture config");
    let compilation = compile(&config, &fixture_root(), Some(out.path())).expect("compile should succeed");
    let manager = SymbolManager::open(compilation.artifact.as_path()).expect("artifact should open");
    (out, manager)
}

#[test]
fn test_yield_classes_from_artifact() {
    let (_out, manager) = open_compiled();
    let found: Vec<&str> = manager.yield_classes("ACTIONCONTROLLER", false).map(|m| m.name).collect();
    assert_eq!(
        found,
        vec![
            "Application\\Controller\\ContactActionController",
            "Application\\Controller\\IndexController",
        ]
    );
}

#[test]
fn test_hydrated_class() {
    let (_out, manager) = open_compiled();
    let class = manager
        .exposed_class("Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService")
        .expect("class should hydrate");

    assert_eq!(class.symbol_name(), "LogErrorHandlerService");
    assert_eq!(class.namespace(), Some("Skyline\\Kernel\\Service\\Error"));
    assert!(class.is_instantiable());
    assert!(class.inherits("Skyline\\Kernel\\Service\\Error\\AbstractErrorHandlerService"));

    let methods: Vec<&str> = class.exposed_methods().iter().map(|m| m.method_name()).collect();
    assert_eq!(methods, vec!["write", "handleError", "flushLog"]);
}

#[test]
fn test_hydrated_method_points_back_to_cached_class() {
    let (_out, manager) = open_compiled();
    let method = manager
        .exposed_method("Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService::write")
        .expect("method should hydrate");

    assert_eq!(method.display_name(), Some("Write Log"));
    assert_eq!(method.symbol_name(), "Write Log");
    assert_eq!(method.return_type(), Some("bool"));

    let parent = method.parent_class().expect("parent should be alive");
    let class = manager
        .exposed_class("Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService")
        .expect("class should hydrate");
    assert!(Arc::ptr_eq(&parent, &class));

    // The class lists the very same method instance.
    let listed = class
        .exposed_methods()
        .iter()
        .find(|m| m.method_name() == "write")
        .expect("write should be listed");
    assert!(Arc::ptr_eq(listed, &method));
}

#[test]
fn test_repeated_lookups_share_instances() {
    let (_out, manager) = open_compiled();
    let name = "Application\\Controller\\ContactActionController";

    let first = manager.exposed_class(name).expect("class should hydrate");
    let second = manager.exposed_class(name).expect("class should hydrate");
    assert!(Arc::ptr_eq(&first, &second));

    assert!(manager.exposed_class("Application\\Model\\User").is_none());
    assert!(manager.exposed_class("Application\\Model\\User").is_none());
    assert!(manager.exposed_method("Application\\Model\\User::getName").is_none());
}

#[test]
fn test_display_names_without_hydration() {
    let (_out, manager) = open_compiled();
    assert_eq!(
        manager.display_name_of_class("Application\\Controller\\ContactActionController"),
        Some("Contact")
    );
    assert_eq!(
        manager.display_name_of_method("Application\\Controller\\ContactActionController::contactAction"),
        Some("Contact Form")
    );
    assert_eq!(manager.display_name_of_class("Application\\Controller\\IndexController"), None);
    assert_eq!(manager.display_name_of_method("Nope::nothing"), None);
}

#[test]
fn test_concurrent_lookups_agree() {
    let (_out, manager) = open_compiled();
    let manager = Arc::new(manager);
    let name = "Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService";

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || {
                let class = manager.exposed_class(name).expect("class should hydrate");
                (class.exposed_methods().len(), class)
            })
        })
        .collect();
    let symbols: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread should not panic"))
        .collect();

    // Every caller sees the class with its full method list.
    let expected = manager.index().classes[name].method_names.len();
    assert_eq!(expected, 3);
    for (count, symbol) in &symbols {
        assert_eq!(*count, expected);
        assert!(Arc::ptr_eq(&symbols[0].1, symbol));
    }
    assert_eq!(symbols[0].1.symbol_name(), "LogErrorHandlerService");
}

#[test]
fn test_open_in_memory_index() {
    let (out, _) = open_compiled();
    let text = fs::read_to_string(out.path().join("exposed.classes.json")).expect("should read artifact");
    let index = ExposedSymbolsIndex::from_json(&text).expect("artifact should parse");

    let manager = SymbolManager::open(index).expect("in-memory index should open");
    assert_eq!(manager.exposed_class_names().count(), 6);
    assert!(manager
        .exposed_method_names()
        .any(|name| name == "Application\\Controller\\IndexController::indexAction"));
}

#[test]
fn test_open_missing_artifact() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let missing = dir.path().join("exposed.classes.json");
    match SymbolManager::open(missing.as_path()) {
        Err(ExposeError::ArtifactNotFound(path)) => assert_eq!(path, missing),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("missing artifact should not open"),
    }
}

#[test]
fn test_open_malformed_artifact() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = dir.path().join("exposed.classes.json");
    fs::write(&path, "{ \"purposes\": [").expect("should write artifact");

    assert!(matches!(
        SymbolManager::open(path.as_path()),
        Err(ExposeError::MalformedArtifact { .. })
    ));
}

#[test]
fn test_query_report_carries_display_names() {
    let (_out, manager) = open_compiled();
    let query = report::build_query_report("ACTION.", manager.yield_methods("ACTION.", false), &manager, true);

    assert_eq!(query.pattern, "ACTION.");
    assert_eq!(query.matches.len(), 3);
    assert_eq!(query.matches[0].purpose, "ACTION.CONTACT");
    assert_eq!(query.matches[0].display.as_deref(), Some("Contact Form"));
    assert_eq!(query.matches[1].purpose, "ACTION.CONTACT.SEND");
    assert_eq!(query.matches[1].display, None);
}

#[test]
fn test_class_report() {
    let (_out, manager) = open_compiled();
    let class = manager
        .exposed_class("Application\\Controller\\ContactActionController")
        .expect("class should hydrate");
    let json = report::build_class(&class);

    assert_eq!(json.symbol_name, "Contact");
    assert_eq!(json.module.as_deref(), Some("Application"));
    assert_eq!(
        json.inheritance,
        vec!["Application\\Controller\\Support\\AbstractActionController".to_string()]
    );
    assert_eq!(json.methods.len(), 2);
    assert_eq!(json.methods[0].modifiers, vec!["public".to_string()]);
    assert_eq!(json.methods[1].return_type.as_deref(), Some("Application\\Model\\User"));
}
