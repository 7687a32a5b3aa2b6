//! Noop registry
//!
//! Disables the ownership concept entirely: reads and writes pass straight
//! through to the provider. The correct choice when this controller has
//! exclusive use of its zones.

use super::Registry;
use crate::endpoint::Endpoint;
use crate::plan::Changes;
use crate::traits::Provider;
use async_trait::async_trait;

/// Registry without ownership tracking.
pub struct NoopRegistry {
    provider: Box<dyn Provider>,
}

impl NoopRegistry {
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Registry for NoopRegistry {
    async fn records(&self) -> Result<Vec<Endpoint>, crate::Error> {
        self.provider.records().await
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<(), crate::Error> {
        super::log_changes(changes);
        self.provider.apply_changes(changes).await
    }

    fn property_values_equal(&self, name: &str, previous: &str, current: &str) -> bool {
        self.provider.property_values_equal(name, previous, current)
    }
}
