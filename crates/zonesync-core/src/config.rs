//! Configuration types for the zonesync system
//!
//! This module defines all configuration structures used throughout the
//! crate. Everything is serde-friendly; the daemon deserializes a single
//! JSON document into [`ZonesyncConfig`] and validates it before any
//! component is constructed.

use crate::endpoint::{Endpoint, RecordType, Ttl};
use crate::plan::{CreateOnlyPolicy, Policy, SyncPolicy, UpsertOnlyPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesyncConfig {
    /// Desired-state sources, aggregated and deduplicated in order
    pub sources: Vec<SourceConfig>,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Ownership registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Reconcile loop settings
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl ZonesyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.sources.is_empty() {
            return Err(crate::Error::config("no sources configured"));
        }
        for source in &self.sources {
            source.validate()?;
        }
        self.provider.validate()?;
        self.registry.validate()?;
        self.controller.validate()?;
        Ok(())
    }
}

/// Desired-state source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Fixed list of endpoints, maintained by hand
    Static {
        endpoints: Vec<EndpointConfig>,
    },

    /// Custom source registered through the plugin registry
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Static { endpoints } => {
                for ep in endpoints {
                    ep.to_endpoint()?;
                }
                Ok(())
            }
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("custom source config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Static { .. } => "static",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// An endpoint as written in configuration, with raw values validated at
/// the source boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub dns_name: String,
    pub targets: Vec<String>,
    #[serde(default)]
    pub record_type: Option<RecordType>,
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub provider_specific: BTreeMap<String, String>,
}

impl EndpointConfig {
    /// Convert to an [`Endpoint`], rejecting out-of-range TTLs.
    pub fn to_endpoint(&self) -> Result<Endpoint, crate::Error> {
        let ttl = match self.ttl {
            Some(raw) => Ttl::try_from_raw(raw)?,
            None => Ttl::default(),
        };
        let mut ep = Endpoint::with_ttl(
            self.dns_name.clone(),
            self.targets.clone(),
            self.record_type,
            ttl,
        );
        ep.labels = self.labels.clone();
        ep.provider_specific = self.provider_specific.clone();
        Ok(ep)
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Domain suffixes to restrict zone discovery to
        #[serde(default)]
        domain_filter: Vec<String>,
        /// Zone IDs to restrict zone discovery to
        #[serde(default)]
        zone_id_filter: Vec<String>,
        /// If true, log intended writes instead of performing them
        #[serde(default)]
        dry_run: bool,
    },

    /// In-memory provider, for local runs and testing
    Inmemory {
        /// Domain suffixes considered in scope
        #[serde(default)]
        domain_filter: Vec<String>,
    },

    /// Custom provider registered through the plugin registry
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Inmemory { .. } => Ok(()),
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config("custom provider config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Inmemory { .. } => "inmemory",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Ownership registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// TXT-record-based ownership
    Txt {
        /// Identifier of this controller instance
        owner_id: String,
        /// Name prefix for companion TXT records (default `"txt."`)
        #[serde(default)]
        txt_prefix: Option<String>,
        /// Name suffix, as an alternative to the prefix scheme
        #[serde(default)]
        txt_suffix: Option<String>,
    },

    /// No ownership tracking (exclusive use of the zone)
    #[default]
    Noop,
}

impl RegistryConfig {
    /// Validate the registry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RegistryConfig::Txt {
                owner_id,
                txt_prefix,
                txt_suffix,
            } => {
                if owner_id.is_empty() {
                    return Err(crate::Error::config("TXT registry requires an owner_id"));
                }
                if txt_prefix.is_some() && txt_suffix.is_some() {
                    return Err(crate::Error::config(
                        "txt_prefix and txt_suffix are mutually exclusive",
                    ));
                }
                Ok(())
            }
            RegistryConfig::Noop => Ok(()),
        }
    }
}

/// Change policy selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyConfig {
    /// Full synchronization including deletions
    #[default]
    Sync,
    /// Never delete records
    UpsertOnly,
    /// Only ever create records
    CreateOnly,
}

impl PolicyConfig {
    /// Instantiate the configured policy
    pub fn to_policy(self) -> Box<dyn Policy> {
        match self {
            PolicyConfig::Sync => Box::new(SyncPolicy),
            PolicyConfig::UpsertOnly => Box::new(UpsertOnlyPolicy),
            PolicyConfig::CreateOnly => Box::new(CreateOnlyPolicy),
        }
    }
}

/// Reconcile loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Interval between reconcile ticks, in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Minimum interval between submitting identical plans, in seconds.
    /// Zero disables the suppression.
    #[serde(default)]
    pub min_change_interval_secs: u64,

    /// Change policy applied to every plan
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Run a single reconcile and exit
    #[serde(default)]
    pub once: bool,

    /// Capacity of the controller event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ControllerConfig {
    /// Validate the controller configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("controller interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            min_change_interval_secs: 0,
            policy: PolicyConfig::default(),
            once: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}
