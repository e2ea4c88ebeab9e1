//! Store snapshot export.

use log::info;

use crate::config::REDACT_MARKER;
use crate::store::{AdMap, AdStore};

/// Serializes a deep copy of the store as pretty-printed JSON.
///
/// Derived fields (`pageDomain`, `targetDomain`, `targetHostname`) are
/// stripped and rebuilt on import; `resolvedTargetUrl` is dropped when it
/// adds nothing over `targetUrl`; the transient `current` flag never
/// leaves the process. With `sanitize`, page URL and title are replaced by
/// the redaction marker for privacy.
pub fn export_snapshot(store: &AdStore, sanitize: bool) -> String {
    let mut map: AdMap = store.admap().clone();
    for bucket in map.values_mut() {
        for ad in bucket.values_mut() {
            ad.page_domain = None;
            ad.target_domain = None;
            ad.target_hostname = None;
            if ad.resolved_target_url.as_deref() == Some(ad.target_url.as_str()) {
                ad.resolved_target_url = None;
            }
            ad.current = false;
            if sanitize {
                ad.page_url = REDACT_MARKER.to_string();
                ad.page_title = Some(REDACT_MARKER.to_string());
            }
        }
    }

    info!("[EXPORT] {} ads", store.len());
    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
}
