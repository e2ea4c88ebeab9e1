//! Load-time integrity validation and private-record redaction.
//!
//! Fingerprint-key corruption is self-healed here, never surfaced to the
//! caller: records under malformed keys are orphaned and re-inserted under
//! the keys derived from their own fields.

use log::{info, warn};

use crate::fingerprint::{content_fingerprint, is_valid_fingerprint, private_bucket_key};
use crate::store::{validate_fields, AdStore};
use crate::utils::hostname_of;

/// What a [`AdStore::validate_and_repair`] pass found and fixed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    /// Records dropped because they failed structural validation
    pub dropped: usize,
    /// Records moved out from under a malformed bucket or content key
    pub rekeyed: usize,
}

impl AdStore {
    /// Validates the whole store after a load and repairs what it can.
    ///
    /// Drops structurally invalid records, re-keys records stored under
    /// keys that are not well-formed fingerprints, and recomputes the id
    /// generator ceiling from the surviving records.
    pub fn validate_and_repair(&mut self) -> RepairReport {
        let mut report = RepairReport::default();

        // structural validation, with in-place self-healing
        for bucket in self.admap_mut().values_mut() {
            bucket.retain(|_, ad| {
                if validate_fields(ad) {
                    true
                } else {
                    warn!("Invalid ad in storage, dropping {}", ad.info());
                    report.dropped += 1;
                    false
                }
            });
        }

        // orphan every record living under a malformed key
        let mut orphans = Vec::new();
        let bad_pages: Vec<String> = self
            .admap()
            .keys()
            .filter(|key| !is_valid_fingerprint(key))
            .cloned()
            .collect();
        for page_key in bad_pages {
            if let Some(bucket) = self.admap_mut().remove(&page_key) {
                orphans.extend(bucket.into_values());
            }
        }
        for bucket in self.admap_mut().values_mut() {
            let bad_keys: Vec<String> = bucket
                .keys()
                .filter(|key| !is_valid_fingerprint(key))
                .cloned()
                .collect();
            for key in bad_keys {
                if let Some(ad) = bucket.remove(&key) {
                    orphans.push(ad);
                }
            }
        }

        report.rekeyed = orphans.len();
        for ad in orphans {
            self.rekey_insert(ad);
        }
        self.admap_mut().retain(|_, bucket| !bucket.is_empty());

        self.recompute_id_ceiling();
        info!(
            "[INIT] Store validated: {} ads, {} dropped, {} re-keyed",
            self.len(),
            report.dropped,
            report.rekeyed
        );
        report
    }

    /// Recomputes the id generator ceiling as the highest live id.
    pub(crate) fn recompute_id_ceiling(&mut self) {
        let ceiling = self.iter().map(|ad| ad.id).max().unwrap_or(0);
        self.set_id_ceiling(ceiling);
    }

    /// Scrubs every private-context record of identifying content and
    /// relocates it into the reserved private bucket. Returns how many
    /// records were redacted.
    ///
    /// The replacement key is derived from the record's content *before*
    /// scrubbing, salted with the private marker, so distinct ads stay
    /// distinct inside the consolidated bucket.
    pub fn redact_private(&mut self) -> usize {
        let private_key = private_bucket_key();

        let mut targets = Vec::new();
        for (page_key, bucket) in self.admap() {
            if *page_key == private_key {
                continue;
            }
            for (content_key, ad) in bucket {
                if ad.private {
                    targets.push((page_key.clone(), content_key.clone()));
                }
            }
        }

        let mut redacted = 0;
        for (page_key, content_key) in targets {
            let Some(mut ad) = self
                .admap_mut()
                .get_mut(&page_key)
                .and_then(|bucket| bucket.remove(&content_key))
            else {
                continue;
            };

            let new_key = content_fingerprint(&ad, true);
            ad.ad_network = hostname_of(&ad.target_url);
            ad.content_data.clear();
            ad.title = String::new();
            ad.page_title = None;
            ad.page_url = String::new();
            ad.page_domain = None;
            ad.resolved_target_url = None;
            ad.target_url = String::new();

            self.insert_keyed(private_key.clone(), new_key, ad);
            redacted += 1;
        }

        self.admap_mut().retain(|_, bucket| !bucket.is_empty());
        if redacted > 0 {
            info!("[PRIVATE] Redacted {redacted} private ads");
        }
        redacted
    }
}
