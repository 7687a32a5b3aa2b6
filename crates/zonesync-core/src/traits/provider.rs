//! Provider trait
//!
//! Defines the contract DNS providers implement: read every in-scope
//! record, and apply a batch of changes. Providers own their zone and
//! domain scoping (see [`crate::filter`]); the core hands them changes and
//! expects each change to be attempted independently.

use crate::endpoint::Endpoint;
use crate::plan::Changes;
use async_trait::async_trait;

/// Trait for DNS provider implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// Providers are the only component that talks to a DNS API. They must not
/// retry, back off, cache state between calls, or decide whether a change
/// is needed; all of that is owned by the controller and the plan. A
/// provider call either succeeds, or surfaces an error for the controller
/// to log and retry next tick.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Return all records the provider considers in scope, after the
    /// provider's own domain and zone filtering.
    async fn records(&self) -> Result<Vec<Endpoint>, crate::Error>;

    /// Apply the four change sequences.
    ///
    /// Each change is applied independently; there is no transactional
    /// guarantee across the batch. Failures of individual changes are
    /// aggregated into a single [`crate::Error::PartialApply`]. The next
    /// reconcile converges whatever was left behind.
    async fn apply_changes(&self, changes: &Changes) -> Result<(), crate::Error>;

    /// Semantic equality hook for `provider_specific` values.
    ///
    /// Providers that normalize property values on write (so a read-back
    /// differs textually but not semantically) override this to avoid
    /// perpetual updates. Defaults to string equality.
    fn property_values_equal(&self, _name: &str, previous: &str, current: &str) -> bool {
        previous == current
    }

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing providers from configuration
pub trait ProviderFactory: Send + Sync {
    /// Create a Provider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn Provider>, crate::Error>;
}
