//! Source implementations and combinators
//!
//! The controller consumes exactly one [`Source`]; aggregation over many
//! of them is done by wrapping: several sources combine into a
//! [`MultiSource`], which in turn is wrapped in a [`DedupSource`] so the
//! plan never sees the same endpoint twice.

use crate::endpoint::{Endpoint, Ttl};
use crate::traits::Source;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

/// Aggregates the endpoints of several sources, in source order.
///
/// A failure of any wrapped source fails the whole snapshot: desired state
/// must be complete or the plan would delete records whose source merely
/// hiccuped.
pub struct MultiSource {
    sources: Vec<Box<dyn Source>>,
}

impl MultiSource {
    pub fn new(sources: Vec<Box<dyn Source>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Source for MultiSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>, crate::Error> {
        let mut result = Vec::new();
        for source in &self.sources {
            result.extend(source.endpoints().await?);
        }
        Ok(result)
    }
}

/// Removes duplicate endpoints from its wrapped source.
///
/// Two endpoints are duplicates when they agree on DNS name, record type
/// and target set; the first occurrence wins. Sources producing the same
/// name with different targets are left alone here and resolved by the
/// plan's duplicate-key rule.
pub struct DedupSource {
    source: Box<dyn Source>,
}

impl DedupSource {
    pub fn new(source: Box<dyn Source>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Source for DedupSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>, crate::Error> {
        let mut result = Vec::new();
        let mut collected = HashSet::new();

        for ep in self.source.endpoints().await? {
            let mut targets: Vec<&str> = ep.targets.iter().map(String::as_str).collect();
            targets.sort_unstable();
            let identifier = format!("{} / {}", ep.key(), targets.join(";"));

            if collected.contains(&identifier) {
                debug!(%identifier, "removing duplicate endpoint");
                continue;
            }
            collected.insert(identifier);
            result.push(ep);
        }

        Ok(result)
    }
}

/// A source yielding a fixed endpoint list, validated once at
/// construction. Used for hand-maintained record sets and in tests.
pub struct StaticSource {
    endpoints: Vec<Endpoint>,
}

impl StaticSource {
    /// Create a static source. Enforces the source-boundary invariants:
    /// TTLs in range and CNAMEs with exactly one target.
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, crate::Error> {
        for ep in &endpoints {
            Ttl::try_from_raw(i64::from(ep.ttl.0))?;
            if ep.record_type == Some(crate::endpoint::RecordType::Cname) && ep.targets.len() != 1 {
                return Err(crate::Error::invalid_input(format!(
                    "CNAME endpoint {} must have exactly one target",
                    ep.dns_name
                )));
            }
        }
        Ok(Self { endpoints })
    }
}

#[async_trait]
impl Source for StaticSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>, crate::Error> {
        Ok(self.endpoints.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::RecordType;

    struct FixedSource(Vec<Endpoint>);

    #[async_trait]
    impl Source for FixedSource {
        async fn endpoints(&self) -> Result<Vec<Endpoint>, crate::Error> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl Source for FailingSource {
        async fn endpoints(&self) -> Result<Vec<Endpoint>, crate::Error> {
            Err(crate::Error::source("api unavailable"))
        }
    }

    fn ep(name: &str, target: &str) -> Endpoint {
        Endpoint::new(name, vec![target.to_string()], Some(RecordType::A))
    }

    #[tokio::test]
    async fn multi_source_concatenates_in_order() {
        let multi = MultiSource::new(vec![
            Box::new(FixedSource(vec![ep("a", "1.1.1.1")])),
            Box::new(FixedSource(vec![ep("b", "2.2.2.2")])),
        ]);
        let endpoints = multi.endpoints().await.unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].dns_name, "a");
        assert_eq!(endpoints[1].dns_name, "b");
    }

    #[tokio::test]
    async fn multi_source_fails_when_any_source_fails() {
        let multi = MultiSource::new(vec![
            Box::new(FixedSource(vec![ep("a", "1.1.1.1")])),
            Box::new(FailingSource),
        ]);
        assert!(multi.endpoints().await.is_err());
    }

    #[tokio::test]
    async fn dedup_source_removes_exact_duplicates() {
        let dedup = DedupSource::new(Box::new(FixedSource(vec![
            ep("a", "1.1.1.1"),
            ep("a", "1.1.1.1"),
            ep("b", "2.2.2.2"),
        ])));
        let endpoints = dedup.endpoints().await.unwrap();
        assert_eq!(endpoints.len(), 2);
    }

    #[tokio::test]
    async fn dedup_source_ignores_target_order() {
        let multi_target = |targets: &[&str]| {
            Endpoint::new(
                "a",
                targets.iter().map(|t| t.to_string()).collect(),
                Some(RecordType::A),
            )
        };
        let dedup = DedupSource::new(Box::new(FixedSource(vec![
            multi_target(&["1.1.1.1", "2.2.2.2"]),
            multi_target(&["2.2.2.2", "1.1.1.1"]),
        ])));
        assert_eq!(dedup.endpoints().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dedup_source_keeps_same_key_with_different_targets() {
        let dedup = DedupSource::new(Box::new(FixedSource(vec![
            ep("a", "1.1.1.1"),
            ep("a", "9.9.9.9"),
        ])));
        // Not a duplicate by the dedup rule; the plan picks the winner.
        assert_eq!(dedup.endpoints().await.unwrap().len(), 2);
    }

    #[test]
    fn static_source_rejects_multi_target_cnames() {
        let bad = Endpoint::new(
            "alias",
            vec!["a.example.org".to_string(), "b.example.org".to_string()],
            Some(RecordType::Cname),
        );
        assert!(StaticSource::new(vec![bad]).is_err());
    }

    #[tokio::test]
    async fn static_source_returns_configured_endpoints() {
        let source = StaticSource::new(vec![ep("a", "1.1.1.1")]).unwrap();
        assert_eq!(source.endpoints().await.unwrap().len(), 1);
    }
}
