//! TXT ownership registry
//!
//! For every managed non-TXT record a companion TXT record is written at a
//! derived name, carrying the owner identifier in a fixed key-value
//! payload. On read, the companion records are folded back into owner
//! labels on the data records; on write, changes to records owned by
//! someone else are discarded and companion records are created and
//! deleted alongside their data records.
//!
//! The payload format is shared with other implementations of the same
//! scheme and must not change:
//!
//! ```text
//! "heritage=external-dns,external-dns/owner=<ownerID>[,external-dns/resource=<resource>]"
//! ```

use super::{filter_owned_records, log_changes, Registry};
use crate::endpoint::{Endpoint, RecordType, OWNER_LABEL_KEY, RESOURCE_LABEL_KEY};
use crate::plan::Changes;
use crate::traits::Provider;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Marker identifying an ownership TXT payload.
const HERITAGE: &str = "external-dns";
const HERITAGE_KEY: &str = "heritage";
const OWNER_KEY: &str = "external-dns/owner";
const RESOURCE_KEY: &str = "external-dns/resource";

/// Default name prefix for companion TXT records.
pub const DEFAULT_TXT_PREFIX: &str = "txt.";

/// Derives the companion TXT name from a data record name and back.
///
/// The prefix scheme is the default: it keeps the TXT record at a name of
/// its own, which sidesteps providers that refuse a TXT record next to a
/// CNAME.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffixNameMapper {
    Prefix(String),
    Suffix(String),
}

impl AffixNameMapper {
    /// The TXT name for a data record name.
    pub fn to_txt_name(&self, name: &str) -> String {
        match self {
            AffixNameMapper::Prefix(p) => format!("{}{}", p, name),
            AffixNameMapper::Suffix(s) => format!("{}{}", name, s),
        }
    }

    /// Recover the data record name from a TXT name, if it carries the
    /// affix. Matching is case-insensitive.
    pub fn from_txt_name(&self, txt_name: &str) -> Option<String> {
        let lower = txt_name.to_lowercase();
        match self {
            AffixNameMapper::Prefix(p) => lower
                .strip_prefix(&p.to_lowercase())
                .map(|rest| rest.to_string()),
            AffixNameMapper::Suffix(s) => lower
                .strip_suffix(&s.to_lowercase())
                .map(|rest| rest.to_string()),
        }
    }
}

impl Default for AffixNameMapper {
    fn default() -> Self {
        AffixNameMapper::Prefix(DEFAULT_TXT_PREFIX.to_string())
    }
}

/// Owner metadata decoded from an ownership TXT payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeritageLabels {
    pub owner: String,
    pub resource: Option<String>,
}

impl HeritageLabels {
    /// Serialize to the wire payload. Bit-exact for interoperability.
    pub fn serialize(&self) -> String {
        match &self.resource {
            Some(resource) => format!(
                "{}={},{}={},{}={}",
                HERITAGE_KEY, HERITAGE, OWNER_KEY, self.owner, RESOURCE_KEY, resource
            ),
            None => format!("{}={},{}={}", HERITAGE_KEY, HERITAGE, OWNER_KEY, self.owner),
        }
    }

    /// Parse a TXT payload. Returns `None` for anything that is not a
    /// well-formed ownership payload; the caller treats the associated
    /// record as unowned.
    pub fn parse(payload: &str) -> Option<HeritageLabels> {
        // Providers commonly return TXT values wrapped in double quotes.
        let payload = payload.trim().trim_matches('"');

        let mut heritage = false;
        let mut owner = None;
        let mut resource = None;

        for pair in payload.split(',') {
            let (key, value) = pair.split_once('=')?;
            if value.contains('=') {
                return None;
            }
            match key {
                HERITAGE_KEY => {
                    if value != HERITAGE {
                        return None;
                    }
                    heritage = true;
                }
                OWNER_KEY => owner = Some(value.to_string()),
                RESOURCE_KEY => resource = Some(value.to_string()),
                _ => return None,
            }
        }

        if !heritage {
            return None;
        }
        owner.map(|owner| HeritageLabels { owner, resource })
    }
}

/// Registry tracking ownership through companion TXT records in the zone.
pub struct TxtRegistry {
    provider: Box<dyn Provider>,
    owner_id: String,
    mapper: AffixNameMapper,
}

impl TxtRegistry {
    /// Create a TXT registry with the default `"txt."` prefix scheme.
    pub fn new(provider: Box<dyn Provider>, owner_id: impl Into<String>) -> Result<Self, crate::Error> {
        Self::with_mapper(provider, owner_id, AffixNameMapper::default())
    }

    /// Create a TXT registry with an explicit name mapping scheme.
    pub fn with_mapper(
        provider: Box<dyn Provider>,
        owner_id: impl Into<String>,
        mapper: AffixNameMapper,
    ) -> Result<Self, crate::Error> {
        let owner_id = owner_id.into();
        if owner_id.is_empty() {
            return Err(crate::Error::config("TXT registry requires an owner id"));
        }
        if owner_id.contains(',') || owner_id.contains('=') {
            return Err(crate::Error::config(
                "TXT registry owner id must not contain ',' or '='",
            ));
        }
        let affix = match &mapper {
            AffixNameMapper::Prefix(a) | AffixNameMapper::Suffix(a) => a,
        };
        if affix.is_empty() {
            return Err(crate::Error::config(
                "TXT registry name affix must not be empty",
            ));
        }
        Ok(Self {
            provider,
            owner_id,
            mapper,
        })
    }

    /// The owner identifier of this controller instance.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Build the companion TXT endpoint for a data endpoint, using this
    /// registry's owner id and the data endpoint's resource label.
    fn companion_txt(&self, ep: &Endpoint) -> Endpoint {
        let labels = HeritageLabels {
            owner: self.owner_id.clone(),
            resource: ep.resource().map(str::to_string),
        };
        Endpoint::new(
            self.mapper.to_txt_name(&ep.normalized_name()),
            vec![labels.serialize()],
            Some(RecordType::Txt),
        )
    }

    /// Whether a record takes a companion TXT at all. TXT data records do
    /// not: their companion would collide with other ownership records.
    fn takes_companion(ep: &Endpoint) -> bool {
        ep.key().record_type != RecordType::Txt
    }
}

#[async_trait]
impl Registry for TxtRegistry {
    async fn records(&self) -> Result<Vec<Endpoint>, crate::Error> {
        let all = self.provider.records().await?;

        // Partition off the ownership TXT records: TXT, name carries the
        // affix, payload parses as a heritage payload. Everything else is
        // data, including foreign TXT records.
        let mut ownership: HashMap<String, HeritageLabels> = HashMap::new();
        let mut data = Vec::new();

        for ep in all {
            if ep.key().record_type == RecordType::Txt {
                if let Some(data_name) = self.mapper.from_txt_name(&ep.normalized_name()) {
                    match ep.targets.first().and_then(|t| HeritageLabels::parse(t)) {
                        Some(labels) => {
                            ownership.insert(data_name, labels);
                            continue;
                        }
                        None => {
                            warn!(dns_name = %ep.dns_name,
                                "TXT record at an ownership name has no valid heritage payload, treating as data");
                        }
                    }
                }
            }
            data.push(ep);
        }

        for ep in &mut data {
            if let Some(labels) = ownership.get(&ep.normalized_name()) {
                ep.labels
                    .insert(OWNER_LABEL_KEY.to_string(), labels.owner.clone());
                if let Some(resource) = &labels.resource {
                    ep.labels
                        .insert(RESOURCE_LABEL_KEY.to_string(), resource.clone());
                }
            }
        }

        Ok(data)
    }

    async fn apply_changes(&self, changes: &Changes) -> Result<(), crate::Error> {
        // Only records we own are candidates for update or delete. The
        // update sequences are filtered pairwise on the owner of the
        // current (old) side.
        let mut update_old = Vec::new();
        let mut update_new = Vec::new();
        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            if old.is_owned_by(&self.owner_id) {
                update_old.push(old.clone());
                update_new.push(new.clone());
            } else {
                debug!(dns_name = %old.dns_name, owner = ?old.owner(),
                    "skipping update of record not owned by this instance");
            }
        }

        let delete = filter_owned_records(&self.owner_id, changes.delete.clone());
        for skipped in changes
            .delete
            .iter()
            .filter(|ep| !ep.is_owned_by(&self.owner_id))
        {
            debug!(dns_name = %skipped.dns_name, owner = ?skipped.owner(),
                "skipping delete of record not owned by this instance");
        }

        let mut filtered = Changes {
            create: changes.create.clone(),
            update_old,
            update_new,
            delete,
        };

        // Companion TXT records follow their data records.
        let mut txt_creates = Vec::new();
        for ep in filtered.create.iter().filter(|ep| Self::takes_companion(ep)) {
            txt_creates.push(self.companion_txt(ep));
        }

        let mut txt_deletes = Vec::new();
        for ep in filtered.delete.iter().filter(|ep| Self::takes_companion(ep)) {
            txt_deletes.push(self.companion_txt(ep));
        }

        // Updates leave the companion alone unless the resource label
        // moved, in which case the payload has to be rewritten.
        let mut txt_update_old = Vec::new();
        let mut txt_update_new = Vec::new();
        for (old, new) in filtered.update_old.iter().zip(&filtered.update_new) {
            if !Self::takes_companion(old) {
                continue;
            }
            if old.resource() != new.resource() {
                txt_update_old.push(self.companion_txt(old));
                txt_update_new.push(self.companion_txt(new));
            }
        }

        filtered.create.extend(txt_creates);
        filtered.delete.extend(txt_deletes);
        filtered.update_old.extend(txt_update_old);
        filtered.update_new.extend(txt_update_new);

        if filtered.is_empty() {
            debug!("all changes belong to other owners, nothing to submit");
            return Ok(());
        }

        log_changes(&filtered);
        self.provider.apply_changes(&filtered).await
    }

    fn property_values_equal(&self, name: &str, previous: &str, current: &str) -> bool {
        self.provider.property_values_equal(name, previous, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Provider double exposing a fixed record set and capturing the
    /// change batches submitted to it.
    struct StoreProvider {
        records: Vec<Endpoint>,
        applied: Arc<Mutex<Vec<Changes>>>,
    }

    impl StoreProvider {
        fn new(records: Vec<Endpoint>) -> (Self, Arc<Mutex<Vec<Changes>>>) {
            let applied = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    records,
                    applied: Arc::clone(&applied),
                },
                applied,
            )
        }
    }

    #[async_trait]
    impl Provider for StoreProvider {
        async fn records(&self) -> Result<Vec<Endpoint>, crate::Error> {
            Ok(self.records.clone())
        }

        async fn apply_changes(&self, changes: &Changes) -> Result<(), crate::Error> {
            self.applied.lock().unwrap().push(changes.clone());
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "store"
        }
    }

    fn a_record(name: &str, target: &str) -> Endpoint {
        Endpoint::new(name, vec![target.to_string()], Some(RecordType::A))
    }

    fn ownership_txt(name: &str, owner: &str) -> Endpoint {
        Endpoint::new(
            format!("txt.{}", name),
            vec![HeritageLabels {
                owner: owner.to_string(),
                resource: None,
            }
            .serialize()],
            Some(RecordType::Txt),
        )
    }

    fn registry(records: Vec<Endpoint>) -> (TxtRegistry, Arc<Mutex<Vec<Changes>>>) {
        let (provider, applied) = StoreProvider::new(records);
        let registry = TxtRegistry::new(Box::new(provider), "us").unwrap();
        (registry, applied)
    }

    #[test]
    fn heritage_payload_round_trips() {
        let with_resource = HeritageLabels {
            owner: "us".to_string(),
            resource: Some("ingress/default/web".to_string()),
        };
        assert_eq!(
            with_resource.serialize(),
            "heritage=external-dns,external-dns/owner=us,external-dns/resource=ingress/default/web"
        );
        assert_eq!(
            HeritageLabels::parse(&with_resource.serialize()),
            Some(with_resource)
        );

        let bare = HeritageLabels {
            owner: "us".to_string(),
            resource: None,
        };
        assert_eq!(
            bare.serialize(),
            "heritage=external-dns,external-dns/owner=us"
        );
        assert_eq!(HeritageLabels::parse(&bare.serialize()), Some(bare));
    }

    #[test]
    fn heritage_parse_tolerates_surrounding_quotes() {
        let parsed =
            HeritageLabels::parse("\"heritage=external-dns,external-dns/owner=us\"").unwrap();
        assert_eq!(parsed.owner, "us");
    }

    #[test]
    fn heritage_parse_rejects_malformed_payloads() {
        assert_eq!(HeritageLabels::parse("just some text"), None);
        assert_eq!(HeritageLabels::parse("heritage=someone-else"), None);
        assert_eq!(HeritageLabels::parse("external-dns/owner=us"), None);
        assert_eq!(
            HeritageLabels::parse("heritage=external-dns,unknown=value"),
            None
        );
        // A value containing '=' cannot be represented in the format.
        assert_eq!(
            HeritageLabels::parse("heritage=external-dns,external-dns/owner=a=b"),
            None
        );
    }

    #[test]
    fn prefix_mapper_encodes_and_decodes() {
        let mapper = AffixNameMapper::default();
        assert_eq!(mapper.to_txt_name("foo.example.org"), "txt.foo.example.org");
        assert_eq!(
            mapper.from_txt_name("txt.foo.example.org"),
            Some("foo.example.org".to_string())
        );
        assert_eq!(
            mapper.from_txt_name("TXT.Foo.Example.Org"),
            Some("foo.example.org".to_string())
        );
        assert_eq!(mapper.from_txt_name("foo.example.org"), None);
    }

    #[test]
    fn suffix_mapper_encodes_and_decodes() {
        let mapper = AffixNameMapper::Suffix("-owned".to_string());
        assert_eq!(mapper.to_txt_name("foo"), "foo-owned");
        assert_eq!(mapper.from_txt_name("foo-owned"), Some("foo".to_string()));
        assert_eq!(mapper.from_txt_name("foo"), None);
    }

    #[test]
    fn owner_id_is_validated() {
        let (provider, _) = StoreProvider::new(Vec::new());
        assert!(TxtRegistry::new(Box::new(provider), "").is_err());
        let (provider, _) = StoreProvider::new(Vec::new());
        assert!(TxtRegistry::new(Box::new(provider), "a,b").is_err());
        let (provider, _) = StoreProvider::new(Vec::new());
        assert!(TxtRegistry::new(Box::new(provider), "a=b").is_err());
    }

    #[tokio::test]
    async fn records_attaches_owner_labels_and_hides_ownership_txts() {
        let (registry, _) = registry(vec![
            a_record("foo.example.org", "1.1.1.1"),
            ownership_txt("foo.example.org", "us"),
            a_record("bar.example.org", "2.2.2.2"),
            ownership_txt("bar.example.org", "them"),
            a_record("free.example.org", "3.3.3.3"),
            // A TXT record of someone else's, not an ownership record.
            Endpoint::new(
                "note.example.org",
                vec!["v=spf1 -all".to_string()],
                Some(RecordType::Txt),
            ),
        ]);

        let mut records = registry.records().await.unwrap();
        records.sort_by(|a, b| a.dns_name.cmp(&b.dns_name));

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].dns_name, "bar.example.org");
        assert_eq!(records[0].owner(), Some("them"));
        assert_eq!(records[1].dns_name, "foo.example.org");
        assert_eq!(records[1].owner(), Some("us"));
        assert_eq!(records[2].dns_name, "free.example.org");
        assert_eq!(records[2].owner(), None);
        assert_eq!(records[3].dns_name, "note.example.org");
        assert_eq!(records[3].owner(), None);
    }

    #[tokio::test]
    async fn records_surfaces_resource_labels() {
        let (registry, _) = registry(vec![
            a_record("foo.example.org", "1.1.1.1"),
            Endpoint::new(
                "txt.foo.example.org",
                vec![HeritageLabels {
                    owner: "us".to_string(),
                    resource: Some("service/default/web".to_string()),
                }
                .serialize()],
                Some(RecordType::Txt),
            ),
        ]);

        let records = registry.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].resource(), Some("service/default/web"));
    }

    #[tokio::test]
    async fn create_emits_companion_txt() {
        let (registry, applied) = registry(Vec::new());

        let changes = Changes {
            create: vec![a_record("new.example.org", "1.2.3.4")],
            ..Changes::default()
        };
        registry.apply_changes(&changes).await.unwrap();

        let submitted = applied.lock().unwrap();
        let batch = &submitted[0];
        assert_eq!(batch.create.len(), 2);
        assert_eq!(batch.create[0].dns_name, "new.example.org");
        assert_eq!(batch.create[1].dns_name, "txt.new.example.org");
        assert_eq!(batch.create[1].record_type, Some(RecordType::Txt));
        assert_eq!(
            batch.create[1].targets,
            vec!["heritage=external-dns,external-dns/owner=us".to_string()]
        );
    }

    #[tokio::test]
    async fn txt_data_records_get_no_companion() {
        let (registry, applied) = registry(Vec::new());

        let changes = Changes {
            create: vec![Endpoint::new(
                "note.example.org",
                vec!["some text".to_string()],
                Some(RecordType::Txt),
            )],
            ..Changes::default()
        };
        registry.apply_changes(&changes).await.unwrap();

        let submitted = applied.lock().unwrap();
        assert_eq!(submitted[0].create.len(), 1);
    }

    #[tokio::test]
    async fn owned_delete_emits_companion_delete() {
        let (registry, applied) = registry(Vec::new());

        let changes = Changes {
            delete: vec![
                a_record("gone.example.org", "1.2.3.4").with_label(OWNER_LABEL_KEY, "us")
            ],
            ..Changes::default()
        };
        registry.apply_changes(&changes).await.unwrap();

        let submitted = applied.lock().unwrap();
        let batch = &submitted[0];
        assert_eq!(batch.delete.len(), 2);
        assert_eq!(batch.delete[1].dns_name, "txt.gone.example.org");
    }

    #[tokio::test]
    async fn unowned_deletes_and_updates_are_dropped() {
        let (registry, applied) = registry(Vec::new());

        let changes = Changes {
            update_old: vec![a_record("foo.example.org", "1.1.1.1")],
            update_new: vec![a_record("foo.example.org", "9.9.9.9")],
            delete: vec![a_record("bar.example.org", "2.2.2.2")
                .with_label(OWNER_LABEL_KEY, "someone-else")],
            ..Changes::default()
        };
        registry.apply_changes(&changes).await.unwrap();

        // Nothing survives the owner filter, so the provider is not called.
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resource_change_rewrites_companion_txt() {
        let (registry, applied) = registry(Vec::new());

        let old = a_record("foo.example.org", "1.1.1.1")
            .with_label(OWNER_LABEL_KEY, "us")
            .with_label(RESOURCE_LABEL_KEY, "service/default/old");
        let new = a_record("foo.example.org", "1.1.1.1")
            .with_label(OWNER_LABEL_KEY, "us")
            .with_label(RESOURCE_LABEL_KEY, "service/default/new");

        let changes = Changes {
            update_old: vec![old],
            update_new: vec![new],
            ..Changes::default()
        };
        registry.apply_changes(&changes).await.unwrap();

        let submitted = applied.lock().unwrap();
        let batch = &submitted[0];
        assert_eq!(batch.update_old.len(), 2);
        assert_eq!(batch.update_new.len(), 2);
        assert!(batch.update_old[1].targets[0].contains("service/default/old"));
        assert!(batch.update_new[1].targets[0].contains("service/default/new"));
    }

    #[tokio::test]
    async fn owned_update_without_resource_change_keeps_txt_quiet() {
        let (registry, applied) = registry(Vec::new());

        let old = a_record("foo.example.org", "1.1.1.1").with_label(OWNER_LABEL_KEY, "us");
        let new = a_record("foo.example.org", "9.9.9.9").with_label(OWNER_LABEL_KEY, "us");

        let changes = Changes {
            update_old: vec![old.clone()],
            update_new: vec![new.clone()],
            ..Changes::default()
        };
        registry.apply_changes(&changes).await.unwrap();

        let submitted = applied.lock().unwrap();
        let batch = &submitted[0];
        assert_eq!(batch.update_old, vec![old]);
        assert_eq!(batch.update_new, vec![new]);
    }
}
