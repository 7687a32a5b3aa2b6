//! Plan calculation
//!
//! The plan calculator diffs desired state against current state and
//! produces the minimal set of create/update/delete operations to move the
//! zone from one to the other. It is a pure function over its inputs: it
//! performs no I/O, never fails, and tolerates malformed entries by
//! dropping them.
//!
//! ## Keying
//!
//! Both lists are keyed by `(dns_name, record_type)`, case-insensitively on
//! the name. A desired endpoint without a record type inherits the type of
//! the current endpoint with the same name when one exists, and otherwise
//! gets A if any target is an IP literal and CNAME if not.
//!
//! ## Update rules
//!
//! An endpoint present on both sides is updated when its target set
//! differs, when a configured desired TTL differs from the current one, or
//! when its provider-specific properties differ. A desired TTL of zero is
//! "not configured" and never triggers an update by itself.

pub mod policy;

pub use policy::{CreateOnlyPolicy, Policy, SyncPolicy, UpsertOnlyPolicy};

use crate::endpoint::{suitable_record_type, Endpoint, EndpointKey, RecordType};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Signature of the provider's semantic-equality hook for
/// `provider_specific` values: `(property name, previous, current)`.
pub type PropertyComparator<'a> = dyn Fn(&str, &str, &str) -> bool + Send + Sync + 'a;

/// The four disjoint change sequences produced by a plan.
///
/// For every update, position `i` of `update_old` and `update_new` refer to
/// the same `(dns_name, record_type)` key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub create: Vec<Endpoint>,
    pub update_old: Vec<Endpoint>,
    pub update_new: Vec<Endpoint>,
    pub delete: Vec<Endpoint>,
}

impl Changes {
    /// Whether the plan contains no operations at all.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }

    /// Total number of operations (updates count once).
    pub fn len(&self) -> usize {
        self.create.len() + self.update_new.len() + self.delete.len()
    }
}

/// A plan over current and desired state.
///
/// `policies` are applied in order to the computed changes; each may drop
/// or rewrite entries. `property_comparator` is the provider's optional
/// semantic-equality hook for provider-specific properties and defaults to
/// string equality.
pub struct Plan<'a> {
    pub current: &'a [Endpoint],
    pub desired: &'a [Endpoint],
    pub policies: &'a [Box<dyn Policy>],
    pub property_comparator: Option<&'a PropertyComparator<'a>>,
}

impl Plan<'_> {
    /// Compute the changes that move `current` to `desired`.
    pub fn calculate(&self) -> Changes {
        let current = index_endpoints(self.current, "current");

        // Record types of current entries by bare name, for inheritance.
        let mut current_types: BTreeMap<String, RecordType> = BTreeMap::new();
        for key in current.keys() {
            current_types
                .entry(key.dns_name.clone())
                .or_insert(key.record_type);
        }

        let desired = self.index_desired(&current_types);

        let mut changes = Changes::default();
        let mut keys: Vec<&EndpointKey> = current.keys().chain(desired.keys()).collect();
        keys.sort();
        keys.dedup();

        for key in keys {
            match (current.get(key), desired.get(key)) {
                (None, Some(d)) => changes.create.push(d.clone()),
                (Some(c), None) => changes.delete.push(c.clone()),
                (Some(c), Some(d)) => {
                    if self.needs_update(key, c, d) {
                        changes.update_old.push(c.clone());
                        changes.update_new.push(merge_for_update(c, d));
                    }
                }
                (None, None) => continue,
            }
        }

        for policy in self.policies {
            changes = policy.apply(changes);
        }

        changes
    }

    /// Key the desired list, resolving unset record types and dropping
    /// malformed entries.
    fn index_desired(
        &self,
        current_types: &BTreeMap<String, RecordType>,
    ) -> BTreeMap<EndpointKey, Endpoint> {
        let mut indexed = BTreeMap::new();

        for ep in self.desired {
            // An empty target set is a request for absence, not a record.
            if ep.targets.is_empty() {
                debug!(dns_name = %ep.dns_name, "dropping desired endpoint without targets");
                continue;
            }

            let name = ep.normalized_name();
            let record_type = ep
                .record_type
                .or_else(|| current_types.get(&name).copied())
                .unwrap_or_else(|| suitable_record_type(&ep.targets));

            if record_type == RecordType::Cname && ep.targets.len() != 1 {
                warn!(dns_name = %ep.dns_name, targets = ep.targets.len(),
                    "dropping malformed CNAME endpoint, expected exactly one target");
                continue;
            }

            let key = EndpointKey {
                dns_name: name,
                record_type,
            };

            if indexed.contains_key(&key) {
                warn!(%key, "duplicate desired endpoint, keeping first occurrence");
                continue;
            }

            let mut resolved = ep.clone();
            resolved.record_type = Some(record_type);
            indexed.insert(key, resolved);
        }

        indexed
    }

    /// Whether the desired endpoint differs from the current one in a way
    /// that requires a provider write.
    fn needs_update(&self, key: &EndpointKey, current: &Endpoint, desired: &Endpoint) -> bool {
        if !current.same_targets(desired) {
            return true;
        }
        if desired.ttl.is_configured() && desired.ttl != current.ttl {
            return true;
        }
        !self.provider_specific_equal(&key.dns_name, current, desired)
    }

    fn provider_specific_equal(&self, name: &str, current: &Endpoint, desired: &Endpoint) -> bool {
        if current.provider_specific.len() != desired.provider_specific.len() {
            return false;
        }
        for (prop, previous) in &current.provider_specific {
            let Some(value) = desired.provider_specific.get(prop) else {
                return false;
            };
            let equal = match self.property_comparator {
                Some(cmp) => cmp(name, previous, value),
                None => previous == value,
            };
            if !equal {
                return false;
            }
        }
        true
    }
}

/// Key a list of endpoints, keeping the first occurrence of each key and
/// logging the rest away.
fn index_endpoints(endpoints: &[Endpoint], side: &str) -> BTreeMap<EndpointKey, Endpoint> {
    let mut indexed = BTreeMap::new();
    for ep in endpoints {
        let key = ep.key();
        if indexed.contains_key(&key) {
            warn!(%key, side, "duplicate endpoint, keeping first occurrence");
            continue;
        }
        indexed.insert(key, ep.clone());
    }
    indexed
}

/// Build the `update_new` entry for an update: the desired endpoint with
/// labels, TTL and record type inherited from the current one where the
/// desired side left them unset.
fn merge_for_update(current: &Endpoint, desired: &Endpoint) -> Endpoint {
    let mut merged = desired.clone();

    let mut labels = current.labels.clone();
    labels.extend(desired.labels.clone());
    merged.labels = labels;

    if !desired.ttl.is_configured() {
        merged.ttl = current.ttl;
    }
    if merged.record_type.is_none() {
        merged.record_type = current.record_type;
    }

    merged
}
