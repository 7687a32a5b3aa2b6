//! Change policies
//!
//! A policy is a post-filter over computed [`Changes`] enforcing an
//! operational constraint. Policies run in the order they are configured;
//! each receives the output of the previous one. Dropping a change is not
//! an error, it is the policy doing its job.

use super::Changes;

/// A filter over proposed changes.
pub trait Policy: Send + Sync {
    /// Apply the policy, returning the (possibly reduced) changes.
    fn apply(&self, changes: Changes) -> Changes;

    /// Policy name for logging and configuration.
    fn name(&self) -> &'static str;
}

/// Allows everything: full synchronization including deletions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncPolicy;

impl Policy for SyncPolicy {
    fn apply(&self, changes: Changes) -> Changes {
        changes
    }

    fn name(&self) -> &'static str {
        "sync"
    }
}

/// Allows creates and updates but never deletes records.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertOnlyPolicy;

impl Policy for UpsertOnlyPolicy {
    fn apply(&self, changes: Changes) -> Changes {
        Changes {
            delete: Vec::new(),
            ..changes
        }
    }

    fn name(&self) -> &'static str {
        "upsert-only"
    }
}

/// Allows only record creation; existing records are never touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOnlyPolicy;

impl Policy for CreateOnlyPolicy {
    fn apply(&self, changes: Changes) -> Changes {
        Changes {
            create: changes.create,
            ..Changes::default()
        }
    }

    fn name(&self) -> &'static str {
        "create-only"
    }
}
