//! The ad store: a two-level keyed container of discovered ads.
//!
//! Layout: page fingerprint → content fingerprint → [`AdRecord`]. A
//! reserved bucket (the fingerprint of the empty string) holds anonymized
//! private-context records. The store owns the id generator and the set of
//! URLs the user has navigated to directly.
//!
//! The store is plain data with synchronous operations; the scheduler task
//! owns it exclusively, so no locking happens here.

mod record;
mod repair;
mod validate;
mod visits;

use std::collections::{HashMap, HashSet};

use log::info;

pub use record::{AdCandidate, AdRecord, ContentType};
pub use repair::RepairReport;
pub(crate) use validate::validate_fields;
pub use validate::{build_record, internal_link_allowlist};

use crate::fingerprint::{content_fingerprint, page_fingerprint, private_bucket_key};
use crate::utils::normalize_visited_url;

/// All records for one page fingerprint, keyed by content fingerprint.
pub type PageBucket = HashMap<String, AdRecord>;

/// The full page-fingerprint → bucket map.
pub type AdMap = HashMap<String, PageBucket>;

/// Content-addressed, deduplicated container of [`AdRecord`]s.
#[derive(Debug, Default)]
pub struct AdStore {
    admap: AdMap,
    /// Highest id ever assigned; the next record gets `id_ceiling + 1`.
    id_ceiling: u64,
    /// URLs the user navigated to directly. Ads targeting these are never
    /// visited synthetically.
    visited_urls: HashSet<String>,
}

impl AdStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a persisted map and id ceiling.
    ///
    /// Callers should run [`AdStore::validate_and_repair`] afterwards; the
    /// ceiling is recomputed there from the live records.
    pub fn from_parts(admap: AdMap, id_ceiling: u64) -> Self {
        Self {
            admap,
            id_ceiling,
            visited_urls: HashSet::new(),
        }
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.admap.values().map(PageBucket::len).sum()
    }

    /// True when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.admap.values().all(PageBucket::is_empty)
    }

    /// Iterates every stored record.
    pub fn iter(&self) -> impl Iterator<Item = &AdRecord> {
        self.admap.values().flat_map(PageBucket::values)
    }

    /// Lazily iterates records, optionally restricted to one page and to
    /// records from that page's most recent load.
    pub fn list<'a>(
        &'a self,
        page_url: Option<&str>,
        current_only: bool,
    ) -> impl Iterator<Item = &'a AdRecord> + 'a {
        let buckets: Box<dyn Iterator<Item = &'a PageBucket> + 'a> = match page_url {
            Some(url) => Box::new(self.admap.get(&page_fingerprint(url)).into_iter()),
            None => Box::new(self.admap.values()),
        };
        buckets
            .flat_map(PageBucket::values)
            .filter(move |ad| !current_only || ad.current)
    }

    /// Number of records, optionally restricted to one page.
    pub fn count(&self, page_url: Option<&str>) -> usize {
        self.list(page_url, false).count()
    }

    /// Looks up a record by id.
    pub fn ad_by_id(&self, id: u64) -> Option<&AdRecord> {
        self.iter().find(|ad| ad.id == id)
    }

    pub(crate) fn ad_by_id_mut(&mut self, id: u64) -> Option<&mut AdRecord> {
        self.admap
            .values_mut()
            .flat_map(PageBucket::values_mut)
            .find(|ad| ad.id == id)
    }

    /// Highest id assigned so far.
    pub fn id_ceiling(&self) -> u64 {
        self.id_ceiling
    }

    /// Reserves and returns the next record id.
    pub(crate) fn next_id(&mut self) -> u64 {
        self.id_ceiling += 1;
        self.id_ceiling
    }

    /// Returns the existing record for this candidate's fingerprint pair if
    /// it was registered within the reuse window.
    pub fn find_existing(&self, record: &AdRecord, reuse_window_ms: i64, now_ms: i64) -> Option<&AdRecord> {
        let page_key = page_fingerprint(&record.page_url);
        let content_key = content_fingerprint(record, false);
        let existing = self.admap.get(&page_key)?.get(&content_key)?;
        if now_ms.saturating_sub(existing.found_ts) < reuse_window_ms {
            Some(existing)
        } else {
            None
        }
    }

    /// Inserts a validated record, assigning it the next id. The record is
    /// keyed by its page and content fingerprints; an expired duplicate
    /// under the same key pair is overwritten.
    pub fn insert(&mut self, mut record: AdRecord) -> &AdRecord {
        record.id = self.next_id();
        let page_key = page_fingerprint(&record.page_url);
        let content_key = content_fingerprint(&record, false);
        let bucket = self.admap.entry(page_key).or_default();
        bucket.insert(content_key.clone(), record);
        &bucket[&content_key]
    }

    /// Re-inserts a record under the keys derived from its own fields,
    /// keeping its id. Used by repair and import re-keying.
    pub(crate) fn rekey_insert(&mut self, record: AdRecord) {
        let page_key = page_fingerprint(&record.page_url);
        let content_key = content_fingerprint(&record, false);
        self.admap
            .entry(page_key)
            .or_default()
            .insert(content_key, record);
    }

    /// Inserts a record under explicit keys, keeping its id. Used by the
    /// import path for already-fingerprinted maps.
    pub(crate) fn insert_keyed(&mut self, page_key: String, content_key: String, record: AdRecord) {
        self.admap
            .entry(page_key)
            .or_default()
            .insert(content_key, record);
    }

    /// Removes exactly one record by id.
    ///
    /// Deleting any record under the reserved private bucket removes the
    /// whole bucket: redacted records carry no distinguishing fields, so
    /// they cannot be individually targeted.
    pub fn delete_by_id(&mut self, id: u64) -> Option<AdRecord> {
        let (page_url, content_key) = {
            let ad = self.ad_by_id(id)?;
            (ad.page_url.clone(), content_fingerprint(ad, false))
        };
        let page_key = page_fingerprint(&page_url);
        let private_key = private_bucket_key();

        let removed = if page_key == private_key {
            // drop the entire private bucket, returning the requested record
            let bucket = self.admap.remove(&private_key)?;
            bucket.into_values().find(|ad| ad.id == id)
        } else {
            let bucket = self.admap.get_mut(&page_key)?;
            let removed = bucket.remove(&content_key);
            if bucket.is_empty() {
                self.admap.remove(&page_key);
            }
            removed
        };

        if let Some(ad) = &removed {
            info!("[DELETE] {}", ad.info());
        }
        removed
    }

    /// Removes a set of records by id, returning how many were deleted.
    pub fn delete_set(&mut self, ids: &[u64]) -> usize {
        ids.iter()
            .filter(|id| self.delete_by_id(**id).is_some())
            .count()
    }

    /// Empties the store: all records, the user-visited set, and the id
    /// generator. The next inserted record gets id 1.
    pub fn clear(&mut self) -> usize {
        let previous = self.len();
        self.admap.clear();
        self.visited_urls.clear();
        self.id_ceiling = 0;
        info!("[CLEAR] {previous} ads cleared");
        previous
    }

    /// Records a top-level page load: the URL joins the user-visited set
    /// and the page's existing ads stop being "current".
    pub fn mark_page_loaded(&mut self, url: &str) {
        self.visited_urls.insert(normalize_visited_url(url));
        if let Some(bucket) = self.admap.get_mut(&page_fingerprint(url)) {
            for ad in bucket.values_mut() {
                ad.current = false;
            }
        }
    }

    /// True if the user has navigated to this URL directly.
    pub fn user_visited(&self, url: &str) -> bool {
        self.visited_urls.contains(&normalize_visited_url(url))
    }

    fn pending_basic(ad: &AdRecord, max_attempts: u32) -> bool {
        ad.attempts < max_attempts && ad.visited_ts <= 0 && !ad.dnt_allowed && !ad.no_visit
    }

    /// Picks the next record eligible for a visit, in store iteration
    /// order. Records whose target the user already clicked are flagged
    /// `no_visit`/`clicked_by_user` on the way and skipped permanently.
    pub fn next_pending(&mut self, max_attempts: u32) -> Option<u64> {
        loop {
            let candidate = self
                .iter()
                .find(|ad| Self::pending_basic(ad, max_attempts))
                .map(|ad| (ad.id, ad.target_url.clone()));
            let (id, target) = candidate?;
            if self.user_visited(&target) {
                if let Some(ad) = self.ad_by_id_mut(id) {
                    info!("[NOVISIT] User has already clicked the ad {}", ad.target_url);
                    ad.no_visit = true;
                    ad.clicked_by_user = true;
                }
                // the flagged record no longer matches; rescan
                continue;
            }
            return Some(id);
        }
    }

    /// True if this specific record is still pending, applying the same
    /// user-clicked flagging as [`AdStore::next_pending`].
    pub fn is_pending(&mut self, id: u64, max_attempts: u32) -> bool {
        let Some(ad) = self.ad_by_id(id) else {
            return false;
        };
        if !Self::pending_basic(ad, max_attempts) {
            return false;
        }
        let target = ad.target_url.clone();
        if self.user_visited(&target) {
            if let Some(ad) = self.ad_by_id_mut(id) {
                info!("[NOVISIT] User has already clicked the ad {}", ad.target_url);
                ad.no_visit = true;
                ad.clicked_by_user = true;
            }
            return false;
        }
        true
    }

    /// Number of records still eligible for a visit. Does not mutate
    /// user-clicked flags.
    pub fn pending_count(&self, max_attempts: u32) -> usize {
        self.iter()
            .filter(|ad| Self::pending_basic(ad, max_attempts) && !self.user_visited(&ad.target_url))
            .count()
    }

    pub(crate) fn admap(&self) -> &AdMap {
        &self.admap
    }

    pub(crate) fn admap_mut(&mut self) -> &mut AdMap {
        &mut self.admap
    }

    pub(crate) fn set_id_ceiling(&mut self, ceiling: u64) {
        self.id_ceiling = ceiling;
    }
}
