//! Plugin-based component registry
//!
//! Providers and sources are registered dynamically at startup, avoiding
//! hardcoded if-else chains: a static mapping from a configuration type
//! name to a factory. Provider crates expose a `register()` function that
//! installs their factories here.
//!
//! ```rust,ignore
//! use zonesync_core::plugins::PluginRegistry;
//!
//! let registry = PluginRegistry::new();
//! zonesync_provider_cloudflare::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! ```

use crate::config::{ProviderConfig, SourceConfig};
use crate::error::{Error, Result};
use crate::traits::{Provider, ProviderFactory, Source, SourceFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry of provider and source factories, keyed by configuration type
/// name.
///
/// ## Thread Safety
///
/// Interior mutability with RwLock allows concurrent reads and exclusive
/// writes; registration happens once at startup, creation on demand.
#[derive(Default)]
pub struct PluginRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn ProviderFactory>>>,

    /// Registered source factories
    sources: RwLock<HashMap<String, Box<dyn SourceFactory>>>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under a type name
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn ProviderFactory>) {
        let name = name.into();
        let mut providers = self.providers.write().unwrap();
        providers.insert(name, factory);
    }

    /// Register a source factory under a type name
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn SourceFactory>) {
        let name = name.into();
        let mut sources = self.sources.write().unwrap();
        sources.insert(name, factory);
    }

    /// Create a DNS provider from configuration
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap();

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a source from configuration
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn Source>> {
        let source_type = config.type_name();
        let sources = self.sources.read().unwrap();

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("unknown source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap();
        providers.keys().cloned().collect()
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap();
        sources.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap();
        providers.contains_key(name)
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap();
        sources.contains_key(name)
    }
}

/// Factory for the built-in static source.
pub struct StaticSourceFactory;

impl SourceFactory for StaticSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn Source>> {
        match config {
            SourceConfig::Static { endpoints } => {
                let endpoints = endpoints
                    .iter()
                    .map(|ep| ep.to_endpoint())
                    .collect::<Result<Vec<_>>>()?;
                Ok(Box::new(crate::source::StaticSource::new(endpoints)?))
            }
            other => Err(Error::config(format!(
                "static source factory cannot build source type '{}'",
                other.type_name()
            ))),
        }
    }
}
