//! Output formatting for expose-symbols.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::discover::DiscoveryReport;
use crate::manager::SymbolManager;
use crate::purpose::PurposeMatch;
use crate::symbol::{ClassSymbol, MethodSymbol, Symbol};

// =============================================================================
// JSON Format
// =============================================================================

/// Summary of a compile run.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonCompileReport {
    pub version: String,
    pub artifact: String,
    pub files_scanned: usize,
    pub classes_indexed: usize,
    pub methods_indexed: usize,
    pub failures: Vec<JsonFailure>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonFailure {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub error: String,
}

/// One purpose query hit.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonMatch {
    pub purpose: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonQueryReport {
    pub pattern: String,
    pub matches: Vec<JsonMatch>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonClass {
    pub name: String,
    pub symbol_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub instantiable: bool,
    pub inheritance: Vec<String>,
    pub methods: Vec<JsonMethod>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonMethod {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub modifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

pub fn build_compile_report(artifact: &Path, report: &DiscoveryReport, methods_indexed: usize) -> JsonCompileReport {
    JsonCompileReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        artifact: artifact.display().to_string(),
        files_scanned: report.scanned,
        classes_indexed: report.indexed,
        methods_indexed,
        failures: report
            .failures
            .iter()
            .map(|f| JsonFailure {
                file: f.file.display().to_string(),
                class: f.class.clone(),
                error: f.error.to_string(),
            })
            .collect(),
    }
}

pub fn build_query_report<'a, I>(pattern: &str, matches: I, manager: &SymbolManager, methods: bool) -> JsonQueryReport
where
    I: IntoIterator<Item = PurposeMatch<'a>>,
{
    let matches = matches
        .into_iter()
        .map(|m| {
            let display = if methods {
                manager.display_name_of_method(m.name)
            } else {
                manager.display_name_of_class(m.name)
            };
            JsonMatch {
                purpose: m.path,
                name: m.name.to_string(),
                display: display.map(str::to_string),
            }
        })
        .collect();
    JsonQueryReport {
        pattern: pattern.to_string(),
        matches,
    }
}

fn method_modifiers(method: &MethodSymbol) -> Vec<String> {
    let flags = [
        (method.is_public(), "public"),
        (method.is_protected(), "protected"),
        (method.is_private(), "private"),
        (method.is_static(), "static"),
        (method.is_abstract(), "abstract"),
        (method.is_final(), "final"),
        (method.is_internal(), "internal"),
        (method.is_deprecated(), "deprecated"),
        (method.is_constructor(), "constructor"),
        (method.is_destructor(), "destructor"),
    ];
    flags
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| name.to_string())
        .collect()
}

pub fn build_method(method: &MethodSymbol) -> JsonMethod {
    JsonMethod {
        name: method.qualified_name().to_string(),
        display: method.display_name().map(str::to_string),
        modifiers: method_modifiers(method),
        return_type: method.return_type().map(str::to_string),
    }
}

pub fn build_class(class: &ClassSymbol) -> JsonClass {
    JsonClass {
        name: class.qualified_name().to_string(),
        symbol_name: class.symbol_name().to_string(),
        namespace: class.namespace().map(str::to_string),
        display: class.display_name().map(str::to_string),
        module: class.module_name().map(str::to_string),
        instantiable: class.is_instantiable(),
        inheritance: class.inheritance().to_vec(),
        methods: class.exposed_methods().iter().map(|m| build_method(m)).collect(),
    }
}

/// Print any serializable report as pretty JSON.
pub fn write_json<T: Serialize>(report: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

fn write_header() {
    println!();
    print!("  ");
    print!("{}", "expose-symbols".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

/// Print a compile summary.
pub fn write_compile_pretty(root: &str, report: &JsonCompileReport) {
    write_header();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", root);
    print!("  {}", "Artifact: ".dimmed());
    println!("{}", report.artifact);
    println!();

    if report.failures.is_empty() {
        print!("  {}", "✓ OK".green());
    } else {
        print!("  {}", "✗ FAILED".red());
    }
    println!(
        "  {} files scanned, {} classes and {} methods indexed",
        report.files_scanned, report.classes_indexed, report.methods_indexed
    );
    println!();

    if !report.failures.is_empty() {
        println!("  {} ({}):", "Failures".bold(), report.failures.len());
        println!();
        for failure in &report.failures {
            print!("    {} ", "ERROR".red());
            print!("{}", failure.file.blue());
            if let Some(class) = &failure.class {
                print!("  {}", class.dimmed());
            }
            println!();
            println!("            {}", failure.error);
            println!();
        }
    }
}

/// Print the hits of a purpose query.
pub fn write_query_pretty(report: &JsonQueryReport) {
    println!();
    print!("  {}", "Pattern: ".dimmed());
    println!("{}", report.pattern.bold());
    println!();

    if report.matches.is_empty() {
        println!("  {}", "no matches".dimmed());
        println!();
        return;
    }

    for m in &report.matches {
        print!("    {:<30} ", m.purpose.yellow());
        print!("{}", m.name);
        if let Some(display) = &m.display {
            print!("  {}", format!("({})", display).dimmed());
        }
        println!();
    }
    println!();
    println!("  {} match(es)", report.matches.len());
    println!();
}

/// Print a hydrated class with its exposed methods.
pub fn write_class_pretty(class: &JsonClass) {
    println!();
    print!("  {}", class.name.cyan().bold());
    if let Some(display) = &class.display {
        print!("  {}", format!("\"{}\"", display).dimmed());
    }
    println!();

    if let Some(module) = &class.module {
        println!("    {:<14}{}", "module:".dimmed(), module);
    }
    if !class.inheritance.is_empty() {
        println!("    {:<14}{}", "extends:".dimmed(), class.inheritance.join(" > "));
    }
    let kind = if class.instantiable { "instantiable".green() } else { "abstract".yellow() };
    println!("    {:<14}{}", "kind:".dimmed(), kind);

    if !class.methods.is_empty() {
        println!();
        println!("    {} ({}):", "Methods".bold(), class.methods.len());
        for method in &class.methods {
            write_method_line(method);
        }
    }
    println!();
}

/// Print a single hydrated method.
pub fn write_method_pretty(method: &JsonMethod) {
    println!();
    write_method_line(method);
    println!();
}

fn write_method_line(method: &JsonMethod) {
    print!("      {}", method.name.blue());
    if let Some(return_type) = &method.return_type {
        print!(": {}", return_type);
    }
    if !method.modifiers.is_empty() {
        print!("  {}", format!("[{}]", method.modifiers.join(", ")).dimmed());
    }
    if let Some(display) = &method.display {
        print!("  {}", format!("\"{}\"", display).dimmed());
    }
    println!();
}
