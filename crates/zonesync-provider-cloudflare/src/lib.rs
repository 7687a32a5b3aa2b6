// # Cloudflare DNS Provider
//
// `Provider` implementation over the Cloudflare v4 API.
//
// - One record per (name, type, content): endpoints with several targets
//   map to several API records, grouped back together on read
// - TTL 1 is Cloudflare's "automatic" sentinel and maps to the unset TTL
//   on our side; an unset TTL is written back as 1
// - Zone discovery by listing `/zones`, restricted by the configured
//   domain and zone-id filters
// - Each change is applied independently; failures are aggregated and the
//   next reconcile converges what was left behind
// - NO retry or backoff logic (owned by the controller)
// - NO caching of provider state between calls (ticks re-read everything)
//
// ## Dry-Run Mode
//
// When `dry_run` is set the provider performs all GET requests but logs
// the intended mutations instead of sending them.
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones`
// - List DNS Records: GET `/zones/:zone_id/dns_records`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use zonesync_core::config::ProviderConfig;
use zonesync_core::endpoint::{Endpoint, RecordType, Ttl};
use zonesync_core::plan::Changes;
use zonesync_core::traits::{Provider, ProviderFactory};
use zonesync_core::{DomainFilter, Error, PluginRegistry, Result, ZoneIdFilter};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records fetched per page
const PAGE_SIZE: u32 = 100;

/// Cloudflare's sentinel for "automatic" TTL
const AUTOMATIC_TTL: u32 = 1;

/// Cloudflare DNS provider
pub struct CloudflareProvider {
    /// Cloudflare API token, never logged
    api_token: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Domain suffixes in scope
    domain_filter: DomainFilter,

    /// Zone IDs in scope
    zone_id_filter: ZoneIdFilter,

    /// If true, perform GET requests but log instead of mutating
    dry_run: bool,
}

// The Debug implementation intentionally does not expose the API token.
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("domain_filter", &self.domain_filter)
            .field("zone_id_filter", &self.zone_id_filter)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    page: u32,
    total_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: u32,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider.
    ///
    /// The API token needs Zone:Read and DNS:Edit permissions on the zones
    /// in scope.
    pub fn new(
        api_token: impl Into<String>,
        domain_filter: DomainFilter,
        zone_id_filter: ZoneIdFilter,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            client,
            domain_filter,
            zone_id_filter,
            dry_run,
        })
    }

    /// Perform a GET request and decode the enveloped response.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<ApiResponse<T>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("request failed: {}", e)))?;

        Self::check_status(response.status())?;

        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("invalid response body: {}", e)))
    }

    /// Map HTTP status codes to errors with actionable messages.
    fn check_status(status: reqwest::StatusCode) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        let message = match status.as_u16() {
            401 | 403 => format!(
                "authentication failed, check API token permissions (status {})",
                status
            ),
            429 => format!("rate limited (status {})", status),
            500..=599 => format!("Cloudflare server error (status {})", status),
            _ => format!("unexpected status {}", status),
        };
        Err(Error::provider("cloudflare", message))
    }

    /// Unwrap an enveloped response, surfacing Cloudflare's error list.
    fn unwrap_result<T>(response: ApiResponse<T>) -> Result<T> {
        if !response.success {
            let details: Vec<String> = response
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect();
            return Err(Error::provider("cloudflare", details.join("; ")));
        }
        response
            .result
            .ok_or_else(|| Error::provider("cloudflare", "response carried no result"))
    }

    /// List all zones in scope.
    async fn zones(&self) -> Result<Vec<Zone>> {
        let mut zones = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/zones?page={}&per_page={}",
                CLOUDFLARE_API_BASE, page, PAGE_SIZE
            );
            let response = self.get_json::<Vec<Zone>>(&url).await?;
            let info = response.result_info.as_ref().map(|i| (i.page, i.total_pages));
            let batch = Self::unwrap_result(response)?;

            zones.extend(batch.into_iter().filter(|zone| {
                self.zone_id_filter.matches(&zone.id) && self.domain_filter.matches(&zone.name)
            }));

            match info {
                Some((current, total)) if current < total => page = current + 1,
                _ => break,
            }
        }

        debug!(zones = zones.len(), "discovered zones in scope");
        Ok(zones)
    }

    /// List all DNS records of a zone.
    async fn zone_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/zones/{}/dns_records?page={}&per_page={}",
                CLOUDFLARE_API_BASE, zone_id, page, PAGE_SIZE
            );
            let response = self.get_json::<Vec<DnsRecord>>(&url).await?;
            let info = response.result_info.as_ref().map(|i| (i.page, i.total_pages));
            records.extend(Self::unwrap_result(response)?);

            match info {
                Some((current, total)) if current < total => page = current + 1,
                _ => break,
            }
        }

        Ok(records)
    }

    /// Create one API record for one target of an endpoint.
    async fn create_record(&self, zone: &Zone, ep: &Endpoint, target: &str) -> Result<()> {
        if self.dry_run {
            info!("dry-run: would create {} {} -> {}", record_type_str(ep), ep.dns_name, target);
            return Ok(());
        }

        let payload = serde_json::json!({
            "name": ep.dns_name,
            "type": record_type_str(ep),
            "content": target,
            "ttl": write_ttl(ep.ttl),
        });

        let url = format!("{}/zones/{}/dns_records", CLOUDFLARE_API_BASE, zone.id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("request failed: {}", e)))?;

        Self::check_status(response.status())?;
        let body = response
            .json::<ApiResponse<DnsRecord>>()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("invalid response body: {}", e)))?;
        Self::unwrap_result(body).map(|_| ())
    }

    /// Delete one API record by id.
    async fn delete_record(&self, zone: &Zone, record: &DnsRecord) -> Result<()> {
        if self.dry_run {
            info!(
                "dry-run: would delete {} {} -> {}",
                record.record_type, record.name, record.content
            );
            return Ok(());
        }

        let url = format!(
            "{}/zones/{}/dns_records/{}",
            CLOUDFLARE_API_BASE, zone.id, record.id
        );
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("request failed: {}", e)))?;

        Self::check_status(response.status())
    }

    /// All existing API records for an endpoint's name and type.
    fn existing_records<'a>(
        index: &'a BTreeMap<(String, String), Vec<DnsRecord>>,
        ep: &Endpoint,
    ) -> &'a [DnsRecord] {
        index
            .get(&(ep.normalized_name(), record_type_str(ep).to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// The API record type string of an endpoint whose type has been resolved
/// by the plan.
fn record_type_str(ep: &Endpoint) -> &'static str {
    ep.record_type.map(|t| t.as_str()).unwrap_or("A")
}

/// The TTL value written to the API: unset maps to Cloudflare's
/// "automatic".
fn write_ttl(ttl: Ttl) -> u32 {
    if ttl.is_configured() {
        ttl.0
    } else {
        AUTOMATIC_TTL
    }
}

/// The TTL value read from the API: "automatic" maps to unset.
fn read_ttl(ttl: u32) -> Ttl {
    if ttl == AUTOMATIC_TTL {
        Ttl(0)
    } else {
        Ttl(ttl)
    }
}

/// Group per-target API records into endpoints by (name, type). Record
/// types the core does not reason about are skipped.
fn group_records(records: Vec<DnsRecord>) -> Vec<Endpoint> {
    let mut grouped: BTreeMap<(String, RecordType), Endpoint> = BTreeMap::new();

    for record in records {
        let Some(record_type) = RecordType::parse(&record.record_type) else {
            debug!(name = %record.name, record_type = %record.record_type,
                "skipping record of unhandled type");
            continue;
        };

        grouped
            .entry((record.name.to_lowercase(), record_type))
            .and_modify(|ep| ep.targets.push(record.content.clone()))
            .or_insert_with(|| {
                Endpoint::with_ttl(
                    record.name.clone(),
                    vec![record.content.clone()],
                    Some(record_type),
                    read_ttl(record.ttl),
                )
            });
    }

    grouped.into_values().collect()
}

/// The zone an endpoint belongs to: the zone whose name is the longest
/// suffix of the endpoint name.
fn find_zone<'a>(zones: &'a [Zone], dns_name: &str) -> Option<&'a Zone> {
    let name = dns_name.trim_end_matches('.').to_lowercase();
    zones
        .iter()
        .filter(|zone| name == zone.name || name.ends_with(&format!(".{}", zone.name)))
        .max_by_key(|zone| zone.name.len())
}

#[async_trait]
impl Provider for CloudflareProvider {
    async fn records(&self) -> Result<Vec<Endpoint>> {
        let zones = self.zones().await?;
        let mut endpoints = Vec::new();

        for zone in &zones {
            let records = self.zone_records(&zone.id).await?;
            endpoints.extend(
                group_records(records)
                    .into_iter()
                    .filter(|ep| self.domain_filter.matches(&ep.dns_name)),
            );
        }

        Ok(endpoints)
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<()> {
        let zones = self.zones().await?;
        let total = changes.len();
        let mut failures = Vec::new();

        // Index the existing per-target records of every zone in scope so
        // updates and deletes can resolve record ids.
        let mut index: BTreeMap<(String, String), Vec<DnsRecord>> = BTreeMap::new();
        for zone in &zones {
            for record in self.zone_records(&zone.id).await? {
                index
                    .entry((
                        record.name.trim_end_matches('.').to_lowercase(),
                        record.record_type.clone(),
                    ))
                    .or_default()
                    .push(record);
            }
        }

        for ep in &changes.create {
            let Some(zone) = find_zone(&zones, &ep.dns_name) else {
                failures.push(format!("create {}: no matching zone", ep.dns_name));
                continue;
            };
            for target in &ep.targets {
                if let Err(e) = self.create_record(zone, ep, target).await {
                    failures.push(format!("create {} -> {}: {}", ep.dns_name, target, e));
                }
            }
        }

        // An update replaces the record set at the key: delete what the
        // zone holds, then create the desired targets.
        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            let Some(zone) = find_zone(&zones, &new.dns_name) else {
                failures.push(format!("update {}: no matching zone", new.dns_name));
                continue;
            };
            for record in Self::existing_records(&index, old) {
                if let Err(e) = self.delete_record(zone, record).await {
                    failures.push(format!("update {}: {}", old.dns_name, e));
                }
            }
            for target in &new.targets {
                if let Err(e) = self.create_record(zone, new, target).await {
                    failures.push(format!("update {} -> {}: {}", new.dns_name, target, e));
                }
            }
        }

        for ep in &changes.delete {
            let Some(zone) = find_zone(&zones, &ep.dns_name) else {
                failures.push(format!("delete {}: no matching zone", ep.dns_name));
                continue;
            };
            for record in Self::existing_records(&index, ep) {
                if let Err(e) = self.delete_record(zone, record).await {
                    failures.push(format!("delete {}: {}", ep.dns_name, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::partial_apply(failures, total))
        }
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl ProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                domain_filter,
                zone_id_filter,
                dry_run,
            } => Ok(Box::new(CloudflareProvider::new(
                api_token.clone(),
                DomainFilter::new(domain_filter.clone()),
                ZoneIdFilter::new(zone_id_filter.clone()),
                *dry_run,
            )?)),
            _ => Err(Error::config("invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a plugin registry.
pub fn register(registry: &PluginRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
