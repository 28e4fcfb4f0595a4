//! Discovery of exposed classes in a source tree.

mod driver;
mod session;
mod source_files;

pub use driver::{
    declares_class, expected_class_name, Discovery, DiscoveryDriver, DiscoveryFailure, DiscoveryReport,
};
pub use session::BuildSession;
pub use source_files::{SourceEnumerator, WalkSourceEnumerator};

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::reflect::{Capabilities, PrefixLocator, TypeRegistry};

/// Result of [`compile`].
pub struct Compilation {
    pub discovery: Discovery,
    pub artifact: PathBuf,
}

/// Run discovery for `config` over the tree at `base`.
pub fn discover(config: &Config, base: &Path) -> anyhow::Result<Discovery> {
    let enumerator = WalkSourceEnumerator::new(base, config.search_paths.clone())
        .with_modules(config.modules.clone())
        .with_excluded(config.excluded_set());

    let mut registry = TypeRegistry::new(Capabilities::from(&config.capabilities));
    if !config.autoload.is_empty() {
        let mappings = config.autoload.iter().map(|(prefix, dirs)| {
            (prefix.clone(), dirs.iter().map(|dir| base.join(dir)).collect())
        });
        registry.add_locator(Box::new(PrefixLocator::new(mappings, &config.file_extension)));
    }

    let driver = DiscoveryDriver::new(&enumerator, registry, config.roots.clone(), config.file_pattern()?);
    Ok(driver.run())
}

/// Run discovery and write the artifact.
///
/// `output_dir` overrides the configured output directory.
pub fn compile(config: &Config, base: &Path, output_dir: Option<&Path>) -> anyhow::Result<Compilation> {
    let discovery = discover(config, base)?;
    let artifact = match output_dir {
        Some(dir) => dir.join(&config.artifact_name),
        None => config.artifact_path(base),
    };
    discovery.index.write_artifact(&artifact)?;
    Ok(Compilation {
        discovery,
        artifact,
    })
}
