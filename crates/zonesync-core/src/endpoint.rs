//! Endpoint model
//!
//! An [`Endpoint`] is the atomic unit of desired or observed DNS state:
//! a DNS name, a set of targets, a record type, an optional TTL and a
//! free-form label map. Endpoints are constructed fresh on every reconcile
//! tick from sources and providers; nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Label key carrying the identifier of the controller instance that
/// manages a record.
pub const OWNER_LABEL_KEY: &str = "owner";

/// Label key carrying the identifier of the cluster object a record was
/// derived from. Opaque to the core.
pub const RESOURCE_LABEL_KEY: &str = "resource";

/// Maximum TTL value accepted from sources.
pub const MAX_TTL: i64 = i32::MAX as i64;

/// DNS record types the core reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Cname,
    Txt,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
        }
    }

    /// Parse a record type string as reported by providers. Unknown types
    /// are out of scope for the core and map to `None`.
    pub fn parse(s: &str) -> Option<RecordType> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Some(RecordType::A),
            "CNAME" => Some(RecordType::Cname),
            "TXT" => Some(RecordType::Txt),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-to-live of a record in seconds. Zero means "not configured": the
/// provider default applies and the value never participates in update
/// decisions on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ttl(pub u32);

impl Ttl {
    /// Whether a TTL was explicitly configured.
    pub fn is_configured(&self) -> bool {
        self.0 != 0
    }

    /// Validate a raw TTL value coming in over a source boundary.
    /// Accepts [0, 2^31 - 1].
    pub fn try_from_raw(raw: i64) -> Result<Ttl, crate::Error> {
        if !(0..=MAX_TTL).contains(&raw) {
            return Err(crate::Error::invalid_input(format!(
                "TTL {} out of range [0, {}]",
                raw, MAX_TTL
            )));
        }
        Ok(Ttl(raw as u32))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an endpoint within a zone.
///
/// At most one endpoint per key may exist in current or desired state at a
/// time; the Plan keys both lists by this value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    /// Lowercased DNS name, trailing dot stripped.
    pub dns_name: String,
    pub record_type: RecordType,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dns_name, self.record_type)
    }
}

/// A desired or observed DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// The hostname of the DNS record. Matching is case-insensitive; the
    /// original casing is preserved for output.
    pub dns_name: String,

    /// The targets the record points to. Order is not significant.
    pub targets: Vec<String>,

    /// The record type. Sources may leave this unset, in which case the
    /// Plan inherits it from current state or derives it from the targets.
    #[serde(default)]
    pub record_type: Option<RecordType>,

    /// Record TTL; `Ttl(0)` means unset.
    #[serde(default)]
    pub ttl: Ttl,

    /// Record metadata. Reserved keys: [`OWNER_LABEL_KEY`],
    /// [`RESOURCE_LABEL_KEY`].
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Opaque provider-specific properties, passed through to the provider
    /// and compared (via the provider's equality hook) when diffing.
    #[serde(default)]
    pub provider_specific: BTreeMap<String, String>,
}

impl Endpoint {
    /// Create a new endpoint. The DNS name keeps its casing but loses a
    /// trailing dot.
    pub fn new(
        dns_name: impl Into<String>,
        targets: Vec<String>,
        record_type: Option<RecordType>,
    ) -> Self {
        let dns_name = dns_name.into();
        let dns_name = dns_name.strip_suffix('.').unwrap_or(&dns_name).to_string();
        Self {
            dns_name,
            targets,
            record_type,
            ttl: Ttl::default(),
            labels: BTreeMap::new(),
            provider_specific: BTreeMap::new(),
        }
    }

    /// Create a new endpoint with an explicit TTL.
    pub fn with_ttl(
        dns_name: impl Into<String>,
        targets: Vec<String>,
        record_type: Option<RecordType>,
        ttl: Ttl,
    ) -> Self {
        let mut ep = Self::new(dns_name, targets, record_type);
        ep.ttl = ttl;
        ep
    }

    /// The lowercased, dot-stripped DNS name used for matching.
    pub fn normalized_name(&self) -> String {
        self.dns_name
            .strip_suffix('.')
            .unwrap_or(&self.dns_name)
            .to_lowercase()
    }

    /// The `(dns_name, record_type)` key of this endpoint, with an
    /// unset record type resolved from the targets.
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            dns_name: self.normalized_name(),
            record_type: self
                .record_type
                .unwrap_or_else(|| suitable_record_type(&self.targets)),
        }
    }

    /// Set-equality over targets: order-insensitive, duplicate-insensitive.
    pub fn same_targets(&self, other: &Endpoint) -> bool {
        same_targets(&self.targets, &other.targets)
    }

    /// The owner label, if any.
    pub fn owner(&self) -> Option<&str> {
        self.labels.get(OWNER_LABEL_KEY).map(String::as_str)
    }

    /// The resource label, if any.
    pub fn resource(&self) -> Option<&str> {
        self.labels.get(RESOURCE_LABEL_KEY).map(String::as_str)
    }

    /// Whether this endpoint carries the given owner label.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner() == Some(owner_id)
    }

    /// Builder-style label assignment, used by tests and sources.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.dns_name,
            self.ttl,
            self.record_type.map(|t| t.as_str()).unwrap_or(""),
            self.targets.join(";")
        )
    }
}

/// The record type suitable for a target list when the source did not set
/// one: A for IP literals, CNAME for everything else.
pub fn suitable_record_type(targets: &[String]) -> RecordType {
    if targets.iter().any(|t| t.parse::<IpAddr>().is_ok()) {
        RecordType::A
    } else {
        RecordType::Cname
    }
}

/// Order-insensitive equality of two target lists.
pub fn same_targets(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<&str> = a.iter().map(String::as_str).collect();
    let mut b: Vec<&str> = b.iter().map(String::as_str).collect();
    a.sort_unstable();
    a.dedup();
    b.sort_unstable();
    b.dedup();
    a == b
}
