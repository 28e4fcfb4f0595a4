//! Integration tests for the full discovery pipeline.
//!
//! These tests run discovery over the PHP fixture project under
//! `testdata/php` and check the resulting index, artifact and build session.

use std::fs;
use std::path::{Path, PathBuf};

use expose_symbols::reflect::MethodFilter;
use expose_symbols::{compile, discover, BuildSession, Config, ExposeError, ExposedSymbolsIndex};

fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join("php")
}

fn fixture_config() -> Config {
    Config::parse_file(fixture_root().join("expose.yaml")).expect("should parse fixture config")
}

fn run_discovery() -> expose_symbols::Discovery {
    discover(&fixture_config(), &fixture_root()).expect("discovery should run")
}

fn names<'a>(matches: impl Iterator<Item = expose_symbols::PurposeMatch<'a>>) -> Vec<&'a str> {
    matches.map(|m| m.name).collect()
}

#[test]
fn test_discovery_reports_no_failures() {
    let discovery = run_discovery();
    let report = &discovery.report;

    for failure in &report.failures {
        eprintln!("{}: {}", failure.file.display(), failure.error);
    }
    assert!(!report.has_failures(), "fixture project should discover cleanly");

    // helpers.php is scanned but declares no class; bootstrap.inc.php does
    // not match the class file pattern; Tests/ is excluded.
    assert_eq!(report.scanned, 9);
    assert_eq!(report.indexed, 6);
}

#[test]
fn test_classes_registered_in_discovery_order() {
    let discovery = run_discovery();
    let found = names(discovery.index.class_purposes.search("ACTIONCONTROLLER", false));
    assert_eq!(
        found,
        vec![
            "Application\\Controller\\ContactActionController",
            "Application\\Controller\\IndexController",
        ]
    );
}

#[test]
fn test_inheritance_chain_of_concrete_service() {
    let discovery = run_discovery();
    let record = &discovery.index.classes["Skyline\\Kernel\\Service\\Error\\LinearChainErrorHandlerService"];

    assert_eq!(
        record.inheritance_chain,
        vec!["Skyline\\Kernel\\Service\\Error\\AbstractErrorHandlerService".to_string()]
    );
    assert!(!record.is_abstract);
    assert_eq!(record.display_name.as_deref(), Some("Linear Chain"));
    // The vendor tree is not part of any module.
    assert_eq!(record.module_name, None);
}

#[test]
fn test_abstract_classes_are_indexed_as_abstract() {
    let discovery = run_discovery();
    let base = &discovery.index.classes["Skyline\\Kernel\\Service\\Error\\AbstractErrorHandlerService"];
    assert!(base.is_abstract);
    assert!(base.inheritance_chain.is_empty());

    let controller_base = &discovery.index.classes["Application\\Controller\\Support\\AbstractActionController"];
    assert!(controller_base.is_abstract);
    // Nothing in it carries a purpose.
    assert!(controller_base.method_names.is_empty());
}

#[test]
fn test_purpose_constant_from_interface() {
    let discovery = run_discovery();
    let found = names(discovery.index.class_purposes.search("ERRORHANDLER", false));
    assert_eq!(
        found,
        vec![
            "Skyline\\Kernel\\Service\\Error\\AbstractErrorHandlerService",
            "Skyline\\Kernel\\Service\\Error\\LinearChainErrorHandlerService",
            "Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService",
        ]
    );
}

#[test]
fn test_method_purpose_and_display_name() {
    let discovery = run_discovery();
    let key = "Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService::write";

    let record = &discovery.index.methods[key];
    assert_eq!(record.display_name.as_deref(), Some("Write Log"));
    assert!(record.is_public);
    assert!(!record.is_static);
    assert_eq!(record.return_type_name.as_deref(), Some("bool"));

    let found = names(discovery.index.method_purposes.search("LOG.WRITE", false));
    assert_eq!(found, vec![key]);
}

#[test]
fn test_method_filter_options_are_honored() {
    let discovery = run_discovery();

    // Public, non-static, no magic; inherited and own methods alike.
    let log = &discovery.index.classes["Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService"];
    assert_eq!(log.method_names, vec!["write", "handleError", "flushLog"]);

    let flush = &discovery.index.methods["Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService::flushLog"];
    assert!(!flush.is_internal);
    assert!(flush.is_deprecated);
    assert_eq!(flush.return_type_name.as_deref(), Some("void"));

    // Purposed methods only.
    let contact = &discovery.index.classes["Application\\Controller\\ContactActionController"];
    assert_eq!(contact.method_names, vec!["contactAction", "sendAction"]);

    let send = &discovery.index.methods["Application\\Controller\\ContactActionController::sendAction"];
    assert_eq!(send.return_type_name.as_deref(), Some("Application\\Model\\User"));
}

#[test]
fn test_recursive_and_glob_method_search() {
    let discovery = run_discovery();
    let tree = &discovery.index.method_purposes;

    assert_eq!(
        names(tree.search("ACTION.", false)),
        vec![
            "Application\\Controller\\ContactActionController::contactAction",
            "Application\\Controller\\ContactActionController::sendAction",
            "Application\\Controller\\IndexController::indexAction",
        ]
    );
    assert_eq!(
        names(tree.search("ACTION.*", false)),
        vec![
            "Application\\Controller\\ContactActionController::contactAction",
            "Application\\Controller\\IndexController::indexAction",
        ]
    );
    assert_eq!(
        names(tree.search("ACTION.CONTACT.SEND", true)),
        vec![
            "Application\\Controller\\ContactActionController::contactAction",
            "Application\\Controller\\ContactActionController::sendAction",
        ]
    );
}

#[test]
fn test_modules_and_imports() {
    let discovery = run_discovery();
    let contact = &discovery.index.classes["Application\\Controller\\ContactActionController"];

    assert_eq!(contact.module_name.as_deref(), Some("Application"));
    assert_eq!(contact.display_name.as_deref(), Some("Contact"));
    assert_eq!(
        contact.import_aliases["AbstractActionController"],
        "Application\\Controller\\Support\\AbstractActionController"
    );
    assert_eq!(contact.import_aliases["User"], "Application\\Model\\User");
}

#[test]
fn test_non_exposable_classes_are_resolved_but_not_indexed() {
    let discovery = run_discovery();
    assert!(discovery.handles.contains_key("Application\\Model\\User"));
    assert!(!discovery.index.classes.contains_key("Application\\Model\\User"));
}

#[test]
fn test_compile_writes_loadable_artifact() {
    let out = tempfile::tempdir().expect("should create tempdir");
    let compilation = compile(&fixture_config(), &fixture_root(), Some(out.path())).expect("compile should succeed");

    assert_eq!(compilation.artifact, out.path().join("exposed.classes.json"));
    let loaded = ExposedSymbolsIndex::load(compilation.artifact.as_path()).expect("artifact should load");
    assert_eq!(loaded, compilation.discovery.index);

    let text = fs::read_to_string(&compilation.artifact).expect("should read artifact");
    let json: serde_json::Value = serde_json::from_str(&text).expect("artifact should be JSON");
    assert!(json.get("purposes").is_some());
    assert!(json.get("method_purposes").is_some());
    assert!(json["classes"].is_object());
    assert!(json["methods"].is_object());
}

#[test]
fn test_compile_is_deterministic() {
    let first = tempfile::tempdir().expect("should create tempdir");
    let second = tempfile::tempdir().expect("should create tempdir");
    let config = fixture_config();

    let a = compile(&config, &fixture_root(), Some(first.path())).expect("first compile");
    let b = compile(&config, &fixture_root(), Some(second.path())).expect("second compile");

    let a = fs::read(&a.artifact).expect("should read first artifact");
    let b = fs::read(&b.artifact).expect("should read second artifact");
    assert_eq!(a, b, "two runs over the same tree should write identical artifacts");
}

#[test]
fn test_session_queries() {
    let session = BuildSession::from(run_discovery());

    assert_eq!(
        session.yield_classes("ACTIONCONTROLLER", false).count(),
        2
    );
    assert!(session
        .exposed_methods()
        .contains(&"Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService::write"));
    assert!(session
        .registered_class_names()
        .any(|name| name == "Application\\Model\\User"));
    assert_eq!(
        session.declared_module("Application\\Controller\\IndexController"),
        Some("Application")
    );
    assert_eq!(session.declared_module("Application\\Model\\User"), None);
}

#[test]
fn test_session_find_class_methods() {
    let session = BuildSession::from(run_discovery());
    let class = "Skyline\\Kernel\\Service\\Error\\LogErrorHandlerService";

    let public = session
        .find_class_methods(class, MethodFilter::PUBLIC)
        .expect("class should be known");
    let listed: Vec<&str> = public.keys().copied().collect();
    // Declared methods only; magic ones dropped by default.
    assert_eq!(listed, vec!["getMethodFilterOptions", "write", "handleError", "flushLog"]);

    let with_magic = BuildSession::from(run_discovery()).exclude_magic(false);
    let methods = with_magic
        .find_class_methods(class, MethodFilter::PUBLIC)
        .expect("class should be known");
    assert!(methods.contains_key("__construct"));

    assert!(session.find_class_methods("Missing\\Class", MethodFilter::PUBLIC).is_none());
}

#[test]
fn test_session_qualify_symbol() {
    let session = BuildSession::from(run_discovery());
    let contact = "Application\\Controller\\ContactActionController";

    assert_eq!(
        session.qualify_symbol("User", contact).as_deref(),
        Some("Application\\Model\\User")
    );
    assert_eq!(session.qualify_symbol("Unknown", contact).as_deref(), Some("Unknown"));
    // No imports in the file.
    assert_eq!(
        session.qualify_symbol("User", "Skyline\\Kernel\\Service\\Error\\LinearChainErrorHandlerService"),
        None
    );
    assert_eq!(session.qualify_symbol("User", "Not\\Indexed"), None);
}

// =============================================================================
// Failure isolation
// =============================================================================

fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("fixture path has a parent")).expect("should create dirs");
    fs::write(path, content).expect("should write fixture");
}

#[test]
fn test_broken_class_does_not_abort_discovery() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    write_file(
        dir.path(),
        "src/App/Broken.php",
        "<?php\nnamespace App;\nuse Skyline\\Kernel\\ExposeClassInterface;\n\
         class Broken extends MissingBase implements ExposeClassInterface\n{\n}\n",
    );
    write_file(
        dir.path(),
        "src/App/Working.php",
        "<?php\nnamespace App;\nuse Skyline\\Kernel\\ExposeClassInterface;\n\
         class Working implements ExposeClassInterface\n{\n\
         public static function getPurposes(): array { return ['WORK']; }\n}\n",
    );
    // Mentions the class only in a comment.
    write_file(
        dir.path(),
        "src/App/Ghost.php",
        "<?php\nnamespace App;\n// class Ghost used to live here\nfunction ghost() {}\n",
    );

    let discovery = discover(&Config::default(), dir.path()).expect("discovery should run");
    let report = &discovery.report;

    assert_eq!(report.indexed, 1);
    assert_eq!(report.failures.len(), 2);

    let broken = report
        .failures
        .iter()
        .find(|f| f.class.as_deref() == Some("App\\Broken"))
        .expect("broken class should fail");
    assert!(matches!(broken.error, ExposeError::UnresolvableType(ref name) if name.contains("MissingBase")));

    let ghost = report
        .failures
        .iter()
        .find(|f| f.class.as_deref() == Some("App\\Ghost"))
        .expect("ghost class should fail");
    assert!(matches!(ghost.error, ExposeError::UnresolvableType(_)));

    assert_eq!(names(discovery.index.class_purposes.search("WORK", false)), vec!["App\\Working"]);
}

#[test]
fn test_unevaluable_purposes_are_reported() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    write_file(
        dir.path(),
        "src/Dynamic.php",
        "<?php\nuse Skyline\\Kernel\\ExposeClassInterface;\n\
         class Dynamic implements ExposeClassInterface\n{\n\
         public static function getPurposes(): array { return self::compute(); }\n}\n",
    );

    let discovery = discover(&Config::default(), dir.path()).expect("discovery should run");
    assert_eq!(discovery.report.indexed, 0);
    assert_eq!(discovery.report.failures.len(), 1);
    assert!(discovery.index.is_empty());
}

#[test]
fn test_missing_search_path_yields_empty_index() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let discovery = discover(&Config::default(), dir.path()).expect("discovery should run");
    assert_eq!(discovery.report.scanned, 0);
    assert!(discovery.index.is_empty());
}
