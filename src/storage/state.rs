//! Persisted store layout and legacy upgrade.
//!
//! The durable entry is one JSON document: the nested ad map plus the id
//! generator ceiling. Older producers persisted the bare map, or the
//! page→array legacy layout; both are accepted on load and upgraded in
//! place.

use log::info;
use serde::{Deserialize, Serialize};

use crate::error_handling::StorageError;
use crate::fingerprint::{content_fingerprint, page_fingerprint};
use crate::interchange::{parse_payload, ImportPayload};
use crate::store::{AdMap, AdStore};

/// The durable entry: ad map plus generator ceiling.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// page fingerprint → content fingerprint → record
    pub admap: AdMap,
    /// Highest id assigned when the snapshot was taken
    #[serde(default)]
    pub id_ceiling: u64,
}

impl PersistedState {
    /// Snapshot of a live store for persistence.
    pub fn snapshot(store: &AdStore) -> Self {
        Self {
            admap: store.admap().clone(),
            id_ceiling: store.id_ceiling(),
        }
    }

    /// Serializes for the durable store.
    pub fn to_payload(&self) -> Result<String, StorageError> {
        serde_json::to_string(self)
            .map_err(|e| StorageError::CorruptPayload(format!("serialize: {e}")))
    }

    /// Parses a persisted payload, accepting the current document, a bare
    /// map, or the legacy page→array layout.
    ///
    /// The returned state still needs [`AdStore::validate_and_repair`];
    /// in particular the ceiling is recomputed there.
    pub fn from_payload(payload: &str) -> Result<Self, StorageError> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| StorageError::CorruptPayload(e.to_string()))?;

        if let Ok(state) = serde_json::from_value::<PersistedState>(value.clone()) {
            return Ok(state);
        }

        // bare or legacy layouts; records keep their ids, validate_and_repair
        // recomputes the ceiling
        match parse_payload(&value) {
            ImportPayload::Current(admap) => Ok(Self { admap, id_ceiling: 0 }),
            ImportPayload::Legacy(records) => {
                info!("[INIT] Upgrading legacy store layout ({} ads)", records.len());
                let mut admap = AdMap::new();
                for record in records {
                    let page_key = page_fingerprint(&record.page_url);
                    let content_key = content_fingerprint(&record, false);
                    admap.entry(page_key).or_default().insert(content_key, record);
                }
                Ok(Self { admap, id_ceiling: 0 })
            }
            ImportPayload::Single(record) => {
                let mut admap = AdMap::new();
                let page_key = page_fingerprint(&record.page_url);
                let content_key = content_fingerprint(&record, false);
                admap.entry(page_key).or_default().insert(content_key, *record);
                Ok(Self { admap, id_ceiling: 0 })
            }
            ImportPayload::Unrecognized => Err(StorageError::CorruptPayload(
                "payload matches no known store layout".to_string(),
            )),
        }
    }

    /// Builds the live store from this state.
    pub fn into_store(self) -> AdStore {
        AdStore::from_parts(self.admap, self.id_ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{build_record, internal_link_allowlist, AdCandidate, ContentType};
    use serde_json::json;

    fn populated_store() -> AdStore {
        let candidate = AdCandidate {
            target_url: "https://shop.example/deal".to_string(),
            content_type: ContentType::Text,
            content_data: [("title".to_string(), json!("T"))].into_iter().collect(),
            page_url: "https://news.example/story".to_string(),
            page_title: None,
            private: false,
        };
        let mut store = AdStore::new();
        store.insert(build_record(candidate, &internal_link_allowlist(&[]), 1000, "0.1.0").unwrap());
        store
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = populated_store();
        let payload = PersistedState::snapshot(&store).to_payload().unwrap();

        let mut restored = PersistedState::from_payload(&payload).unwrap().into_store();
        restored.validate_and_repair();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.id_ceiling(), store.id_ceiling());
        assert_eq!(
            restored.count(Some("https://news.example/story")),
            store.count(Some("https://news.example/story"))
        );
    }

    #[test]
    fn test_bare_map_payload_accepted() {
        let store = populated_store();
        // older producers persisted the admap directly, no wrapper
        let bare = serde_json::to_string(store.admap()).unwrap();

        let mut restored = PersistedState::from_payload(&bare).unwrap().into_store();
        restored.validate_and_repair();
        assert_eq!(restored.len(), 1);
        // ceiling recomputed from record ids
        assert_eq!(restored.id_ceiling(), 1);
    }

    #[test]
    fn test_legacy_page_array_payload_upgraded() {
        let legacy = json!({
            "https://news.example/story": [{
                "id": 5,
                "pageUrl": "https://news.example/story",
                "contentType": "text",
                "contentData": {"title": "T"},
                "targetUrl": "https://shop.example/deal"
            }]
        })
        .to_string();

        let mut restored = PersistedState::from_payload(&legacy).unwrap().into_store();
        restored.validate_and_repair();
        assert_eq!(restored.len(), 1);
        // record id survives the upgrade; ceiling follows it
        assert_eq!(restored.id_ceiling(), 5);
        assert_eq!(restored.count(Some("https://news.example/story")), 1);
    }

    #[test]
    fn test_unparseable_payload_is_an_error() {
        assert!(PersistedState::from_payload("not json").is_err());
        assert!(PersistedState::from_payload("\"a string\"").is_err());
    }
}
