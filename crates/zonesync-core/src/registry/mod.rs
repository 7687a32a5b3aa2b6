//! Ownership registries
//!
//! A registry sits between the controller and the provider and implements
//! the ownership concept: the controller must only mutate records it
//! created itself, so that several actors (other controller instances,
//! humans, other tooling) can safely share a zone.
//!
//! - [`TxtRegistry`]: tracks ownership through companion TXT records
//!   stored next to the data records in the zone itself.
//! - [`NoopRegistry`]: no ownership at all, for zones this controller has
//!   exclusive use of.
//!
//! All durable state lives in the DNS zone; registries keep nothing in
//! memory between calls.

pub mod noop;
pub mod txt;

pub use noop::NoopRegistry;
pub use txt::TxtRegistry;

use crate::endpoint::Endpoint;
use crate::plan::Changes;
use async_trait::async_trait;

/// The registry contract: read annotated records, apply ownership-filtered
/// changes.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Return all data records from the provider, annotated with owner
    /// labels where ownership is known. Unowned records are returned too;
    /// the plan needs to see them to avoid fighting over their names.
    async fn records(&self) -> Result<Vec<Endpoint>, crate::Error>;

    /// Apply changes to the provider, restricted to records this registry
    /// instance owns and augmented with whatever ownership bookkeeping the
    /// registry requires.
    async fn apply_changes(&self, changes: &Changes) -> Result<(), crate::Error>;

    /// Forwarded semantic-equality hook of the underlying provider.
    fn property_values_equal(&self, _name: &str, previous: &str, current: &str) -> bool {
        previous == current
    }
}

/// Keep only the endpoints carrying the given owner label.
pub(crate) fn filter_owned_records(owner_id: &str, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    endpoints
        .into_iter()
        .filter(|ep| ep.is_owned_by(owner_id))
        .collect()
}

/// Log every operation in a change set at info level before submission.
pub(crate) fn log_changes(changes: &Changes) {
    use tracing::info;

    for ep in &changes.create {
        info!("creating {}", ep);
    }
    for ep in &changes.update_new {
        info!("updating {}", ep);
    }
    for ep in &changes.delete {
        info!("deleting {}", ep);
    }
}
