//! Importer plugin registry: plugin name -> factory.
//!
//! The registry is built once and then only read; hand it around as
//! `Arc<PluginRegistry>` instead of keeping a process-wide manager.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::importer::Importer;
use crate::raster::RasterImporter;

type Factory = Box<dyn Fn() -> Result<Box<dyn Importer>, String> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadState {
    NotFound,
    Loaded,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("PluginManager::Manager::load(): plugin {0} was not found")]
    NotFound(String),
    #[error("PluginManager::Manager::instantiate(): plugin {name} failed to instantiate: {reason}")]
    InstantiationFailed { name: String, reason: String },
}

#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, Factory>,
    aliases: BTreeMap<String, String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `image`-backed importers.
    pub fn with_builtin_importers() -> Self {
        let mut registry = Self::new();
        for &(name, format) in RasterImporter::SUPPORTED {
            registry.register(name, move || Box::new(RasterImporter::new(name, format)));
        }
        registry
    }

    /// Register (or replace) a plugin.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Importer> + Send + Sync + 'static,
    {
        self.register_fallible(name, move || Ok(factory()));
    }

    /// Register a plugin whose construction can fail; the error text ends up
    /// in [`LoadError::InstantiationFailed`].
    pub fn register_fallible<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Box<dyn Importer>, String> + Send + Sync + 'static,
    {
        let name = name.into();
        log::debug!("Registering importer plugin {name}");
        self.aliases.remove(&name);
        self.factories.insert(name, Box::new(factory));
    }

    /// Make `alias` resolve to the plugin `provider`.
    /// A real plugin of the same name takes precedence over the alias.
    pub fn alias(&mut self, alias: impl Into<String>, provider: impl Into<String>) {
        self.aliases.insert(alias.into(), provider.into());
    }

    fn resolve<'a>(&'a self, name: &'a str) -> Option<(&'a str, &'a Factory)> {
        if let Some(factory) = self.factories.get(name) {
            return Some((name, factory));
        }
        let provider = self.aliases.get(name)?;
        self.factories
            .get(provider)
            .map(|factory| (provider.as_str(), factory))
    }

    pub fn load_state(&self, name: &str) -> LoadState {
        match self.resolve(name) {
            Some(_) => LoadState::Loaded,
            None => LoadState::NotFound,
        }
    }

    /// Create a fresh importer instance. Every call returns a new instance.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Importer>, LoadError> {
        let (resolved, factory) = self
            .resolve(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        if resolved != name {
            log::debug!("Plugin {name} provided by {resolved}");
        }
        factory().map_err(|reason| LoadError::InstantiationFailed {
            name: resolved.to_string(),
            reason,
        })
    }

    /// Names of registered plugins followed by aliases, sorted.
    pub fn plugin_list(&self) -> Vec<String> {
        self.factories
            .keys()
            .chain(self.aliases.keys().filter(|a| !self.factories.contains_key(*a)))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.factories.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .finish()
    }
}
