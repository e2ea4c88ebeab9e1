//! Configuration constants.
//!
//! Fixed operational parameters for the ad store, visit scheduler, and
//! persistence throttle. CLI-tunable values live in [`crate::config::Config`];
//! everything here is a hard default.

use std::time::Duration;

/// Maximum visit attempts per ad before the record is frozen in a terminal
/// failed state.
pub const MAX_ATTEMPTS_PER_AD: u32 = 3;

/// Timeout for a single background visit.
///
/// A visit that has not completed within this window is treated as a failed
/// attempt. The scheduler also uses it to force-fail a stuck in-flight visit.
pub const VISIT_TIMEOUT: Duration = Duration::from_secs(20);

/// Base period of the visit scheduler's polling loop.
pub const POLL_QUEUE_INTERVAL: Duration = Duration::from_secs(5);

/// Marker substituted for page-identifying fields in sanitized exports.
pub const REDACT_MARKER: &str = "********";

/// Duplicate-suppression window in milliseconds.
///
/// Re-registering an identical `(page, content)` fingerprint pair within
/// this window is a no-op. The default keeps suppression permanent for the
/// process lifetime; `--repeat-visit-after-ms` overrides it.
pub const DEFAULT_REPEAT_VISIT_INTERVAL_MS: i64 = i64::MAX;

/// Minimum interval between non-forced durable-storage flushes once the
/// store has grown past [`IMMEDIATE_FLUSH_BELOW`] records.
pub const UPDATE_STORAGE_INTERVAL: Duration = Duration::from_secs(60 * 30);

/// Store sizes below this always flush immediately. While the store is
/// small, losing a write hurts more than the extra I/O costs.
pub const IMMEDIATE_FLUSH_BELOW: usize = 1000;

/// Title substrings that mark a 2xx response as an error page.
///
/// Servers routinely return 200 for soft-404 pages; a visit whose landing
/// page title matches one of these is recorded as a failure.
pub const ERROR_TITLE_STRINGS: &[&str] = &[
    "file not found",
    "website is currently unavailable",
    "not found on this server",
];

/// Exact length of a fingerprint key (hex-encoded SHA-256 digest).
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Maximum URL length accepted for pages and targets.
/// Matches common browser and server limits.
pub const MAX_URL_LENGTH: usize = 2048;

/// Maximum error message length stored on a record.
/// Prevents storage bloat from unbounded error messages.
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 2000;

/// Default User-Agent string for visit requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default SQLite database path for the durable store.
pub const DB_PATH: &str = "./ad_visitor.db";

/// Key under which the serialized store is persisted in the durable map.
pub const STORE_KEY: &str = "ad_store";

/// Domains on which an image ad whose target matches the page domain is
/// still treated as external advertising rather than site navigation.
/// Large portals serve their own ad inventory from the same registrable
/// domain as their content.
pub const INTERNAL_LINK_DOMAINS: &[&str] = &[
    "google.com",
    "yahoo.com",
    "facebook.com",
    "youtube.com",
    "amazon.com",
    "nytimes.com",
    "baidu.com",
    "sohu.com",
    "163.com",
];
