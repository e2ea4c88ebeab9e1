//! Visit-lifecycle mutations on stored records.
//!
//! The scheduler drives these: an attempt is stamped before the fetch goes
//! out, and exactly one of the finish methods runs when the outcome comes
//! back. Both finish paths clear `attempted_ts` so the record becomes
//! selectable again on the next tick if it is still pending.

use log::{info, warn};

use crate::store::{AdRecord, AdStore};
use crate::utils::{decode_entities, domain_of, hostname_of, truncate_error_message};

impl AdStore {
    /// Stamps the start of a visit attempt: increments `attempts` and sets
    /// `attempted_ts`. Returns a snapshot of the updated record.
    pub fn begin_attempt(&mut self, id: u64, now_ms: i64) -> Option<AdRecord> {
        let ad = self.ad_by_id_mut(id)?;
        ad.attempts += 1;
        ad.attempted_ts = now_ms;
        Some(ad.clone())
    }

    /// Applies a successful visit outcome.
    ///
    /// Sets the title (falling back to the target's domain while the record
    /// still says "Pending"), records the post-redirect URL, stamps
    /// `visited_ts` positive, and clears the in-flight marker.
    pub fn finish_visit_success(
        &mut self,
        id: u64,
        title: Option<String>,
        resolved_url: String,
        parsed_target_url: Option<String>,
        now_ms: i64,
    ) -> Option<AdRecord> {
        let ad = self.ad_by_id_mut(id)?;
        ad.attempted_ts = 0;

        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            ad.title = decode_entities(title.trim());
        }
        if ad.title == "Pending" {
            if let Some(domain) = domain_of(&resolved_url)
                .or_else(|| hostname_of(&resolved_url))
                .or_else(|| domain_of(&ad.target_url))
            {
                ad.title = domain;
            }
        }

        if let Some(parsed) = parsed_target_url {
            ad.parsed_target_url = Some(parsed);
        }
        ad.resolved_target_url = Some(resolved_url);
        ad.visited_ts = now_ms;

        info!("[VISIT] {} {}", ad.info(), ad.title);
        Some(ad.clone())
    }

    /// Applies a failed visit outcome.
    ///
    /// Stamps `visited_ts` negative (unless an earlier attempt already
    /// succeeded), appends the error description, and freezes the title to
    /// "Failed" once the attempt budget is exhausted.
    pub fn finish_visit_failure(
        &mut self,
        id: u64,
        error: &str,
        max_attempts: u32,
        now_ms: i64,
    ) -> Option<AdRecord> {
        let ad = self.ad_by_id_mut(id)?;
        ad.attempted_ts = 0;

        if ad.visited_ts > 0 {
            warn!("Failure outcome for already-visited {}", ad.info());
            return Some(ad.clone());
        }

        ad.visited_ts = -now_ms;
        ad.errors.push(truncate_error_message(error));

        if ad.attempts >= max_attempts {
            info!("[FAILED] {}", ad.info());
            if ad.title == "Pending" {
                ad.title = "Failed".to_string();
            }
        }
        Some(ad.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_ATTEMPTS_PER_AD;
    use crate::store::{build_record, internal_link_allowlist, AdCandidate, ContentType};
    use serde_json::json;

    fn store_with_ad() -> (AdStore, u64) {
        let candidate = AdCandidate {
            target_url: "https://shop.example/deal".to_string(),
            content_type: ContentType::Text,
            content_data: [
                ("title".to_string(), json!("T")),
                ("text".to_string(), json!("hi")),
            ]
            .into_iter()
            .collect(),
            page_url: "http://x.com".to_string(),
            page_title: None,
            private: false,
        };
        let record =
            build_record(candidate, &internal_link_allowlist(&[]), 1000, "0.1.0").unwrap();
        let mut store = AdStore::new();
        let id = store.insert(record).id;
        (store, id)
    }

    #[test]
    fn test_begin_attempt_stamps_record() {
        let (mut store, id) = store_with_ad();
        let snapshot = store.begin_attempt(id, 5000).unwrap();
        assert_eq!(snapshot.attempts, 1);
        assert_eq!(snapshot.attempted_ts, 5000);
    }

    #[test]
    fn test_success_sets_title_and_timestamps() {
        let (mut store, id) = store_with_ad();
        store.begin_attempt(id, 5000);
        let ad = store
            .finish_visit_success(
                id,
                Some("Landing Page".to_string()),
                "https://shop.example/landing".to_string(),
                None,
                6000,
            )
            .unwrap();
        assert_eq!(ad.title, "Landing Page");
        assert_eq!(ad.visited_ts, 6000);
        assert_eq!(ad.attempted_ts, 0);
        assert_eq!(
            ad.resolved_target_url.as_deref(),
            Some("https://shop.example/landing")
        );
    }

    #[test]
    fn test_success_without_title_falls_back_to_domain() {
        let (mut store, id) = store_with_ad();
        store.begin_attempt(id, 5000);
        let ad = store
            .finish_visit_success(id, None, "https://shop.example/landing".to_string(), None, 6000)
            .unwrap();
        assert_eq!(ad.title, "shop.example");
    }

    #[test]
    fn test_retry_cycle_to_terminal_failure() {
        // three consecutive simulated timeouts exhaust the attempt budget
        let (mut store, id) = store_with_ad();
        for attempt in 1..=MAX_ATTEMPTS_PER_AD {
            assert!(store.is_pending(id, MAX_ATTEMPTS_PER_AD));
            let snapshot = store.begin_attempt(id, 1000 * i64::from(attempt)).unwrap();
            assert_eq!(snapshot.attempts, attempt);
            store.finish_visit_failure(id, "timeout", MAX_ATTEMPTS_PER_AD, 1000 * i64::from(attempt) + 1);
        }

        let ad = store.ad_by_id(id).unwrap();
        assert_eq!(ad.attempts, MAX_ATTEMPTS_PER_AD);
        assert!(ad.visited_ts < 0);
        assert_eq!(ad.title, "Failed");
        assert_eq!(ad.errors.len(), MAX_ATTEMPTS_PER_AD as usize);

        // the pending predicate now evaluates false
        assert!(!store.is_pending(id, MAX_ATTEMPTS_PER_AD));
        assert_eq!(store.next_pending(MAX_ATTEMPTS_PER_AD), None);
    }

    #[test]
    fn test_failure_after_success_does_not_downgrade() {
        let (mut store, id) = store_with_ad();
        store.begin_attempt(id, 5000);
        store.finish_visit_success(id, Some("OK".into()), "https://shop.example/".into(), None, 6000);

        store.finish_visit_failure(id, "late error", MAX_ATTEMPTS_PER_AD, 7000);
        let ad = store.ad_by_id(id).unwrap();
        assert_eq!(ad.visited_ts, 6000);
        assert!(ad.errors.is_empty());
    }

    #[test]
    fn test_failure_before_cap_stays_retryable() {
        let (mut store, id) = store_with_ad();
        store.begin_attempt(id, 5000);
        store.finish_visit_failure(id, "503 (Service Unavailable)", MAX_ATTEMPTS_PER_AD, 6000);

        let ad = store.ad_by_id(id).unwrap();
        assert_eq!(ad.title, "Pending");
        assert!(ad.visited_ts < 0);
        // still pending: attempts below cap and visitedTs <= 0
        assert!(store.is_pending(id, MAX_ATTEMPTS_PER_AD));
    }
}
