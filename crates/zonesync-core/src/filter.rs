//! Domain and zone filters
//!
//! Providers use these to restrict which zones and names they consider in
//! scope. The core never applies them itself; they are constructed from
//! configuration and handed to the provider.

use serde::{Deserialize, Serialize};

/// Filters DNS names by domain suffix. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainFilter {
    filters: Vec<String>,
}

impl DomainFilter {
    /// Create a filter from a list of domain suffixes. Leading dots and
    /// casing are normalized away.
    pub fn new(filters: Vec<String>) -> Self {
        let filters = filters
            .into_iter()
            .map(|f| f.trim().trim_start_matches('.').to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        Self { filters }
    }

    /// Whether the given DNS name is in scope.
    pub fn matches(&self, name: &str) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        let name = name.trim_end_matches('.').to_lowercase();
        self.filters
            .iter()
            .any(|f| name == *f || name.ends_with(&format!(".{}", f)))
    }

    /// Whether any suffixes are configured.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Filters zones by provider-assigned zone ID. An empty filter matches
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneIdFilter {
    zone_ids: Vec<String>,
}

impl ZoneIdFilter {
    pub fn new(zone_ids: Vec<String>) -> Self {
        let zone_ids = zone_ids
            .into_iter()
            .map(|z| z.trim().to_string())
            .filter(|z| !z.is_empty())
            .collect();
        Self { zone_ids }
    }

    /// Whether the given zone ID is in scope.
    pub fn matches(&self, zone_id: &str) -> bool {
        self.zone_ids.is_empty() || self.zone_ids.iter().any(|z| z == zone_id)
    }
}
