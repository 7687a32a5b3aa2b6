// # zonesync-core
//
// Core library for the zonesync DNS reconciliation loop.
//
// ## Architecture Overview
//
// zonesync keeps the records in one or more authoritative DNS zones in
// sync with desired state derived from somewhere else. Per tick:
//
// ```text
// ┌──────────┐   desired    ┌────────────┐
// │  Source  │─────────────▶│            │
// └──────────┘              │ Controller │
// ┌──────────┐   current    │            │
// │ Registry │◀────────────▶│  (Plan)    │
// └────┬─────┘   changes    └────────────┘
//      │
//      ▼
// ┌──────────┐
// │ Provider │
// └──────────┘
// ```
//
// - **Source**: produces the desired endpoints (trait; aggregation and
//   deduplication via `source::MultiSource` / `source::DedupSource`)
// - **Plan**: pure diff of desired vs current into create/update/delete
// - **Registry**: ownership layer; refuses to touch records created by
//   other actors, tracked through companion TXT records in the zone
// - **Provider**: DNS API client (trait; implementations live in their
//   own crates and register through `plugins::PluginRegistry`)
// - **Controller**: the loop driving one reconcile tick at a time
//
// ## Design Principles
//
// 1. **One-way wiring**: Source → Controller → Registry → Provider,
//    no back-references
// 2. **Stateless ticks**: everything is re-read every tick; durable state
//    lives in the DNS zone itself as ownership TXT records
// 3. **Plugin-based**: providers and sources are registered dynamically,
//    no hard-coded if-else
// 4. **Library-first**: the daemon is a thin shell over this crate

pub mod config;
pub mod controller;
pub mod endpoint;
pub mod error;
pub mod filter;
pub mod plan;
pub mod plugins;
pub mod registry;
pub mod source;
pub mod traits;

// Re-export core types for convenience
pub use config::{ControllerConfig, ProviderConfig, RegistryConfig, SourceConfig, ZonesyncConfig};
pub use controller::{Controller, ControllerEvent};
pub use endpoint::{Endpoint, EndpointKey, RecordType, Ttl};
pub use error::{Error, Result};
pub use filter::{DomainFilter, ZoneIdFilter};
pub use plan::{Changes, Plan, Policy};
pub use plugins::PluginRegistry;
pub use registry::{NoopRegistry, Registry, TxtRegistry};
pub use traits::{Provider, ProviderFactory, Source, SourceFactory};
