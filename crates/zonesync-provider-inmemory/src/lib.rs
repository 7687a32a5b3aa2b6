// # In-Memory DNS Provider
//
// A reference `Provider` implementation backed by a record map instead of
// a DNS API. It exists for two reasons:
//
// - Local runs: point the daemon at it to watch a reconcile loop work
//   without touching a real zone.
// - Testing: integration tests of anything above the provider contract.
//
// It implements the full contract, including per-change failure semantics:
// each change is applied independently, a create of an existing key or an
// update/delete of a missing key fails that change only, and all failures
// are aggregated into a single error.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;
use zonesync_core::config::ProviderConfig;
use zonesync_core::endpoint::{Endpoint, EndpointKey};
use zonesync_core::plan::Changes;
use zonesync_core::traits::{Provider, ProviderFactory};
use zonesync_core::{DomainFilter, Error, PluginRegistry, Result};

/// DNS provider backed by an in-memory record map.
pub struct InMemoryProvider {
    records: Mutex<BTreeMap<EndpointKey, Endpoint>>,
    domain_filter: DomainFilter,
}

impl InMemoryProvider {
    pub fn new(domain_filter: DomainFilter) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            domain_filter,
        }
    }

    /// Seed the provider with existing records, as if they had been
    /// created by an earlier run or another actor.
    pub fn with_records(self, records: Vec<Endpoint>) -> Self {
        {
            let mut map = self.records.lock().unwrap();
            for ep in records {
                map.insert(ep.key(), ep);
            }
        }
        self
    }
}

#[async_trait]
impl Provider for InMemoryProvider {
    async fn records(&self) -> Result<Vec<Endpoint>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .values()
            .filter(|ep| self.domain_filter.matches(&ep.dns_name))
            .cloned()
            .collect())
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let mut failures = Vec::new();
        let total = changes.len();

        for ep in &changes.create {
            let key = ep.key();
            if !self.domain_filter.matches(&ep.dns_name) {
                failures.push(format!("create {}: out of scope", key));
                continue;
            }
            if records.contains_key(&key) {
                failures.push(format!("create {}: already exists", key));
                continue;
            }
            debug!(%key, "creating record");
            records.insert(key, ep.clone());
        }

        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            let key = old.key();
            if records.remove(&key).is_none() {
                failures.push(format!("update {}: not found", key));
                continue;
            }
            debug!(%key, "updating record");
            records.insert(new.key(), new.clone());
        }

        for ep in &changes.delete {
            let key = ep.key();
            if records.remove(&key).is_none() {
                failures.push(format!("delete {}: not found", key));
            } else {
                debug!(%key, "deleting record");
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::partial_apply(failures, total))
        }
    }

    fn provider_name(&self) -> &'static str {
        "inmemory"
    }
}

/// Factory for creating in-memory providers
pub struct InMemoryFactory;

impl ProviderFactory for InMemoryFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
        match config {
            ProviderConfig::Inmemory { domain_filter } => Ok(Box::new(InMemoryProvider::new(
                DomainFilter::new(domain_filter.clone()),
            ))),
            _ => Err(Error::config("invalid config for in-memory provider")),
        }
    }
}

/// Register the in-memory provider with a plugin registry.
pub fn register(registry: &PluginRegistry) {
    registry.register_provider("inmemory", Box::new(InMemoryFactory));
}
