//! Test doubles and common utilities for architecture contract tests
//!
//! The doubles here are deliberately small: a source returning a fixed
//! snapshot, and a provider backed by a shared in-memory record store that
//! records every change batch submitted to it.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zonesync_core::endpoint::{Endpoint, RecordType, Ttl};
use zonesync_core::plan::Changes;
use zonesync_core::traits::{Provider, Source};
use zonesync_core::ControllerConfig;

/// A source returning a fixed snapshot, with a call counter.
pub struct MockSource {
    endpoints: Arc<Mutex<Vec<Endpoint>>>,
    call_count: Arc<AtomicUsize>,
    fail: bool,
}

impl MockSource {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: Arc::new(Mutex::new(endpoints)),
            call_count: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    /// A source whose snapshot always fails.
    pub fn failing() -> Self {
        let mut source = Self::new(Vec::new());
        source.fail = true;
        source
    }

    /// Create a new MockSource that shares state with an existing one.
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            endpoints: Arc::clone(&other.endpoints),
            call_count: Arc::clone(&other.call_count),
            fail: other.fail,
        }
    }

    /// Replace the snapshot the source returns.
    pub fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        *self.endpoints.lock().unwrap() = endpoints;
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>, zonesync_core::Error> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(zonesync_core::Error::source("snapshot unavailable"));
        }
        Ok(self.endpoints.lock().unwrap().clone())
    }
}

/// A provider backed by a shared in-memory record store.
///
/// Every submitted batch is captured. When `converge` is set, batches are
/// folded into the store so later ticks observe the applied state; when it
/// is not, the store stays frozen and the same plan recomputes every tick.
pub struct RecordingProvider {
    store: Arc<Mutex<Vec<Endpoint>>>,
    applied: Arc<Mutex<Vec<Changes>>>,
    records_call_count: Arc<AtomicUsize>,
    apply_call_count: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    fail_applies: Arc<AtomicUsize>,
    fail_records: bool,
    converge: bool,
    apply_delay: Option<std::time::Duration>,
}

impl RecordingProvider {
    pub fn new(records: Vec<Endpoint>) -> Self {
        Self {
            store: Arc::new(Mutex::new(records)),
            applied: Arc::new(Mutex::new(Vec::new())),
            records_call_count: Arc::new(AtomicUsize::new(0)),
            apply_call_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            fail_applies: Arc::new(AtomicUsize::new(0)),
            fail_records: false,
            converge: false,
            apply_delay: None,
        }
    }

    /// Fold applied batches into the store so the provider converges.
    pub fn converging(mut self) -> Self {
        self.converge = true;
        self
    }

    /// Fail the next `n` apply calls.
    pub fn fail_next_applies(self, n: usize) -> Self {
        self.fail_applies.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every records() call.
    pub fn failing_records(mut self) -> Self {
        self.fail_records = true;
        self
    }

    /// Sleep inside every apply, for overlap detection.
    pub fn with_apply_delay(mut self, delay: std::time::Duration) -> Self {
        self.apply_delay = Some(delay);
        self
    }

    /// Create a new RecordingProvider that shares state with an existing one.
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            store: Arc::clone(&other.store),
            applied: Arc::clone(&other.applied),
            records_call_count: Arc::clone(&other.records_call_count),
            apply_call_count: Arc::clone(&other.apply_call_count),
            in_flight: Arc::clone(&other.in_flight),
            max_in_flight: Arc::clone(&other.max_in_flight),
            fail_applies: Arc::clone(&other.fail_applies),
            fail_records: other.fail_records,
            converge: other.converge,
            apply_delay: other.apply_delay,
        }
    }

    pub fn records_call_count(&self) -> usize {
        self.records_call_count.load(Ordering::SeqCst)
    }

    pub fn apply_call_count(&self) -> usize {
        self.apply_call_count.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently running apply calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// All change batches submitted so far.
    pub fn applied(&self) -> Vec<Changes> {
        self.applied.lock().unwrap().clone()
    }

    /// Current store contents, sorted by name and type for assertions.
    pub fn store(&self) -> Vec<Endpoint> {
        let mut records = self.store.lock().unwrap().clone();
        records.sort_by_key(|ep| ep.key());
        records
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    async fn records(&self) -> Result<Vec<Endpoint>, zonesync_core::Error> {
        self.records_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_records {
            return Err(zonesync_core::Error::provider("recording", "records unavailable"));
        }
        Ok(self.store.lock().unwrap().clone())
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<(), zonesync_core::Error> {
        self.apply_call_count.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let remaining = self.fail_applies.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_applies.store(remaining - 1, Ordering::SeqCst);
            return Err(zonesync_core::Error::provider("recording", "apply rejected"));
        }

        self.applied.lock().unwrap().push(changes.clone());

        if self.converge {
            let mut store = self.store.lock().unwrap();
            for ep in &changes.delete {
                store.retain(|existing| existing.key() != ep.key());
            }
            for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
                store.retain(|existing| existing.key() != old.key());
                store.push(new.clone());
            }
            for ep in &changes.create {
                store.push(ep.clone());
            }
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Shorthand endpoint constructor for tests.
pub fn ep(name: &str, targets: &[&str], record_type: RecordType) -> Endpoint {
    Endpoint::new(
        name,
        targets.iter().map(|t| t.to_string()).collect(),
        Some(record_type),
    )
}

/// Endpoint with a TTL.
pub fn ep_ttl(name: &str, targets: &[&str], record_type: RecordType, ttl: u32) -> Endpoint {
    Endpoint::with_ttl(
        name,
        targets.iter().map(|t| t.to_string()).collect(),
        Some(record_type),
        Ttl(ttl),
    )
}

/// An ownership TXT record as the TXT registry writes it.
pub fn ownership_txt(name: &str, owner: &str) -> Endpoint {
    Endpoint::new(
        format!("txt.{}", name),
        vec![format!("heritage=external-dns,external-dns/owner={}", owner)],
        Some(RecordType::Txt),
    )
}

/// Controller configuration for tests: short interval, suppression off.
pub fn controller_config(interval_secs: u64) -> ControllerConfig {
    ControllerConfig {
        interval_secs,
        ..ControllerConfig::default()
    }
}
