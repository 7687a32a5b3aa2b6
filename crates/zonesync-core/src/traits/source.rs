//! Source trait
//!
//! A source produces the desired DNS state: a complete snapshot of the
//! endpoints that should exist, derived from whatever the source watches
//! (cluster objects, a static list, a file). Sources are read-only
//! observers; all decisions about what to change belong to the plan.
//!
//! Combinators over sources (multi-source aggregation, deduplication) live
//! in [`crate::source`].

use crate::endpoint::Endpoint;
use async_trait::async_trait;

/// Trait for desired-state sources
///
/// Implementations must be thread-safe and usable across async tasks.
/// `endpoints` is the only entry point and may block on I/O; it returns a
/// complete snapshot of the desired state every time it is called.
///
/// # Failure
///
/// A source failure is transient: it aborts the current reconcile tick and
/// the controller retries from scratch on the next one. Sources must not
/// retry internally.
#[async_trait]
pub trait Source: Send + Sync {
    /// Return a complete snapshot of the desired endpoints.
    ///
    /// Endpoints may be duplicated across sources; deduplication is the
    /// job of [`crate::source::DedupSource`], not of implementations.
    async fn endpoints(&self) -> Result<Vec<Endpoint>, crate::Error>;
}

/// Helper trait for constructing sources from configuration
pub trait SourceFactory: Send + Sync {
    /// Create a Source instance from configuration
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn Source>, crate::Error>;
}
