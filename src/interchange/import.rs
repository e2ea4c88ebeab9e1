//! Bulk import of ad records.
//!
//! Payloads arrive in one of three shapes: the current nested map
//! (page fingerprint → content fingerprint → record), the legacy layout
//! (page → array of records, or a bare array), or a single record object.
//! Parsing yields a tagged [`ImportPayload`]; the first variant that
//! produces at least one valid record wins. An unrecognized payload leaves
//! the store untouched and reports a zero count.

use log::{info, warn};
use serde_json::Value;

use crate::fingerprint::is_valid_fingerprint;
use crate::store::{validate_fields, AdMap, AdRecord, AdStore};

/// Result of an import operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Number of records merged into the store
    pub count: usize,
}

/// A parsed import payload.
#[derive(Debug)]
pub enum ImportPayload {
    /// Current nested-map format, keys preserved where well-formed
    Current(AdMap),
    /// Legacy page→array (or bare array) format, flattened
    Legacy(Vec<AdRecord>),
    /// A single record object
    Single(Box<AdRecord>),
    /// No known format matched
    Unrecognized,
}

/// Classifies a payload, trying the current format, then legacy, then
/// single-record.
pub fn parse_payload(value: &Value) -> ImportPayload {
    // exports may wrap the map in a document
    let value = value.get("admap").unwrap_or(value);

    if let Some(map) = parse_current(value) {
        return ImportPayload::Current(map);
    }
    if let Some(records) = parse_legacy(value) {
        return ImportPayload::Legacy(records);
    }
    if let Some(record) = parse_single(value) {
        return ImportPayload::Single(record);
    }
    ImportPayload::Unrecognized
}

fn parse_current(value: &Value) -> Option<AdMap> {
    let pages = value.as_object()?;
    if pages.is_empty() {
        return None;
    }

    let mut map = AdMap::new();
    let mut pass = 0usize;
    for (page_key, bucket_value) in pages {
        let bucket = bucket_value.as_object()?;
        let mut out_bucket = std::collections::HashMap::new();
        for (content_key, record_value) in bucket {
            // legacy composite keys ("domain::field::...") are tolerated;
            // anything else malformed means this is not the current format
            if !is_valid_fingerprint(content_key) && !content_key.contains("::") {
                return None;
            }
            let Ok(mut record) = serde_json::from_value::<AdRecord>(record_value.clone()) else {
                warn!("Invalid ad in import under {page_key}, skipping");
                continue;
            };
            if !validate_fields(&mut record) {
                warn!("Unvalidatable ad in import under {page_key}, skipping");
                continue;
            }
            out_bucket.insert(content_key.clone(), record);
            pass += 1;
        }
        if !out_bucket.is_empty() {
            map.insert(page_key.clone(), out_bucket);
        }
    }

    (pass > 0).then_some(map)
}

fn parse_legacy(value: &Value) -> Option<Vec<AdRecord>> {
    let mut records = Vec::new();

    let collect = |records: &mut Vec<AdRecord>, entries: &[Value]| {
        for entry in entries {
            match serde_json::from_value::<AdRecord>(entry.clone()) {
                Ok(mut record) => {
                    if validate_fields(&mut record) {
                        records.push(record);
                    } else {
                        warn!("Unable to validate legacy ad, skipping");
                    }
                }
                Err(_) => warn!("Malformed legacy ad entry, skipping"),
            }
        }
    };

    if let Some(entries) = value.as_array() {
        collect(&mut records, entries);
    } else {
        let pages = value.as_object()?;
        if pages.is_empty() {
            return None;
        }
        for bucket in pages.values() {
            // every page must map to an array in the legacy layout
            collect(&mut records, bucket.as_array()?);
        }
    }

    (!records.is_empty()).then_some(records)
}

fn parse_single(value: &Value) -> Option<Box<AdRecord>> {
    let obj = value.as_object()?;
    if !obj.get("contentData").map(Value::is_object).unwrap_or(false) {
        return None;
    }
    let mut record = serde_json::from_value::<AdRecord>(value.clone()).ok()?;
    validate_fields(&mut record).then(|| Box::new(record))
}

/// Merges a payload into the store.
///
/// Ids are always reassigned from the live generator so they stay strictly
/// increasing; legacy records additionally get their in-flight state reset
/// and the current producer version stamped. With `replace`, the incoming
/// map replaces the store's contents instead of merging. A parse failure
/// reports `count: 0` and leaves the store untouched.
pub fn apply_import(
    store: &mut AdStore,
    payload: &Value,
    replace: bool,
    version: &str,
) -> ImportReport {
    let parsed = parse_payload(payload);

    if matches!(parsed, ImportPayload::Unrecognized) {
        warn!("[IMPORT] Unable to parse import format");
        return ImportReport { count: 0 };
    }
    if replace {
        store.admap_mut().clear();
        store.recompute_id_ceiling();
    }

    let mut count = 0usize;
    match parsed {
        ImportPayload::Current(map) => {
            for (page_key, bucket) in map {
                for (content_key, mut record) in bucket {
                    record.id = store.next_id();
                    if is_valid_fingerprint(&page_key) && is_valid_fingerprint(&content_key) {
                        store.insert_keyed(page_key.clone(), content_key, record);
                    } else {
                        // malformed keys are rebuilt from the record itself
                        store.rekey_insert(record);
                    }
                    count += 1;
                }
            }
        }
        ImportPayload::Legacy(records) => {
            info!("[IMPORT] Updating legacy ads");
            for record in records {
                let upgraded = upgrade_legacy(record, store.next_id(), version);
                store.rekey_insert(upgraded);
                count += 1;
            }
        }
        ImportPayload::Single(record) => {
            let upgraded = upgrade_legacy(*record, store.next_id(), version);
            store.rekey_insert(upgraded);
            count = 1;
        }
        ImportPayload::Unrecognized => unreachable!("handled above"),
    }

    info!("[IMPORT] {count} ads imported");
    ImportReport { count }
}

/// Normalizes a record from an older producer: fresh id, no in-flight
/// attempt, current version stamp.
fn upgrade_legacy(mut record: AdRecord, id: u64, version: &str) -> AdRecord {
    record.id = id;
    record.attempted_ts = 0;
    record.version = version.to_string();
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{content_fingerprint, page_fingerprint};
    use crate::store::{build_record, internal_link_allowlist, AdCandidate, ContentType};
    use serde_json::json;

    fn sample_record_value() -> Value {
        json!({
            "pageUrl": "https://news.example/story",
            "contentType": "text",
            "contentData": {"title": "T", "text": "hi"},
            "targetUrl": "https://shop.example/deal",
            "foundTs": 1000
        })
    }

    fn current_format_payload() -> Value {
        let record: AdRecord = serde_json::from_value(sample_record_value()).unwrap();
        let page_key = page_fingerprint(&record.page_url);
        let content_key = content_fingerprint(&record, false);
        json!({ page_key: { content_key: sample_record_value() } })
    }

    #[test]
    fn test_unrecognized_payload_reports_zero() {
        let mut store = AdStore::new();
        let report = apply_import(&mut store, &json!("not an object or array"), false, "0.1.0");
        assert_eq!(report.count, 0);
        assert!(store.is_empty());

        let report = apply_import(&mut store, &json!(42), false, "0.1.0");
        assert_eq!(report.count, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_current_format_import() {
        let mut store = AdStore::new();
        let report = apply_import(&mut store, &current_format_payload(), false, "0.1.0");
        assert_eq!(report.count, 1);
        assert_eq!(store.len(), 1);
        // reachable by its page URL
        assert_eq!(store.count(Some("https://news.example/story")), 1);
    }

    #[test]
    fn test_wrapped_admap_document_import() {
        let mut store = AdStore::new();
        let wrapped = json!({ "admap": current_format_payload(), "idCeiling": 9 });
        let report = apply_import(&mut store, &wrapped, false, "0.1.0");
        assert_eq!(report.count, 1);
    }

    #[test]
    fn test_legacy_page_array_import() {
        let mut store = AdStore::new();
        let payload = json!({
            "https://news.example/story": [sample_record_value()]
        });
        let report = apply_import(&mut store, &payload, false, "0.1.0");
        assert_eq!(report.count, 1);

        // legacy records are re-keyed under proper fingerprints
        let ad = store.list(Some("https://news.example/story"), false).next();
        assert!(ad.is_some());
        assert_eq!(ad.unwrap().version, "0.1.0");
    }

    #[test]
    fn test_bare_array_import() {
        let mut store = AdStore::new();
        let payload = json!([sample_record_value(), sample_record_value()]);
        let report = apply_import(&mut store, &payload, false, "0.1.0");
        // identical records collapse onto one fingerprint pair
        assert_eq!(report.count, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_single_record_import() {
        let mut store = AdStore::new();
        let report = apply_import(&mut store, &sample_record_value(), false, "0.1.0");
        assert_eq!(report.count, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_import_reassigns_ids_above_live_generator() {
        let mut store = AdStore::new();
        let candidate = AdCandidate {
            target_url: "https://other.example/x".to_string(),
            content_type: ContentType::Text,
            content_data: [("title".to_string(), json!("A"))].into_iter().collect(),
            page_url: "https://a.example/p".to_string(),
            page_title: None,
            private: false,
        };
        let live_id = store
            .insert(build_record(candidate, &internal_link_allowlist(&[]), 0, "0.1.0").unwrap())
            .id;

        apply_import(&mut store, &sample_record_value(), false, "0.1.0");
        let imported_id = store
            .list(Some("https://news.example/story"), false)
            .next()
            .unwrap()
            .id;
        assert!(imported_id > live_id);
    }

    #[test]
    fn test_replace_empties_store_first() {
        let mut store = AdStore::new();
        apply_import(&mut store, &sample_record_value(), false, "0.1.0");
        assert_eq!(store.len(), 1);

        let other = json!({
            "pageUrl": "https://blog.example/post",
            "contentType": "text",
            "contentData": {"title": "B"},
            "targetUrl": "https://shop2.example/x"
        });
        let report = apply_import(&mut store, &other, true, "0.1.0");
        assert_eq!(report.count, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count(Some("https://blog.example/post")), 1);
        assert_eq!(store.count(Some("https://news.example/story")), 0);
    }

    #[test]
    fn test_parse_failure_leaves_existing_store_untouched() {
        let mut store = AdStore::new();
        apply_import(&mut store, &sample_record_value(), false, "0.1.0");
        let before = store.len();

        let report = apply_import(&mut store, &json!([1, 2, 3]), true, "0.1.0");
        assert_eq!(report.count, 0);
        assert_eq!(store.len(), before);
    }
}
