//! Ad record and candidate types.
//!
//! Records serialize with camelCase field names; this is both the persisted
//! layout and the import/export interchange format, so older exported files
//! keep loading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::is_false;

/// Kind of content a discovered ad carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    /// Image ad (content data: src, width, height, ...)
    #[serde(rename = "img", alias = "image")]
    Image,
    /// Text ad (content data: title, text, site, ...)
    #[serde(rename = "text")]
    Text,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Image => f.write_str("img"),
            ContentType::Text => f.write_str("text"),
        }
    }
}

/// A raw ad candidate as emitted by an external ad detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCandidate {
    /// Link the ad points at
    pub target_url: String,
    /// Content kind
    pub content_type: ContentType,
    /// Type-specific content fields
    #[serde(default)]
    pub content_data: BTreeMap<String, Value>,
    /// URL of the page the ad was found on
    pub page_url: String,
    /// Title of the page the ad was found on
    #[serde(default)]
    pub page_title: Option<String>,
    /// Candidate was discovered in a private/incognito context
    #[serde(default)]
    pub private: bool,
}

fn default_title() -> String {
    "Pending".to_string()
}

/// One discovered ad and its visit state.
///
/// `visited_ts` uses a sign convention: `0` never visited, positive is the
/// successful-visit timestamp, negative is the failure timestamp (magnitude
/// = failure time). `attempted_ts` is non-zero only while a visit is in
/// flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdRecord {
    /// Monotonically increasing id, unique for the store's lifetime
    #[serde(default)]
    pub id: u64,
    /// URL of the page the ad was found on (empty after private redaction)
    #[serde(default)]
    pub page_url: String,
    /// Title of that page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    /// Registrable domain of the page, derived from `page_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_domain: Option<String>,
    /// Content kind
    pub content_type: ContentType,
    /// Type-specific content fields
    #[serde(default)]
    pub content_data: BTreeMap<String, Value>,
    /// Display title; "Pending" until a visit resolves one
    #[serde(default = "default_title")]
    pub title: String,
    /// Link the ad points at
    #[serde(default)]
    pub target_url: String,
    /// Final URL after redirects, set on a successful visit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_target_url: Option<String>,
    /// Recovered destination when the target was obfuscated or wrapped in
    /// an interstitial redirector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_target_url: Option<String>,
    /// Registrable domain of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<String>,
    /// Hostname of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_hostname: Option<String>,
    /// Ad network hostname, set when a private record is redacted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_network: Option<String>,
    /// Discovery timestamp (epoch ms)
    #[serde(default)]
    pub found_ts: i64,
    /// Timestamp of the in-flight attempt, 0 when idle
    #[serde(default)]
    pub attempted_ts: i64,
    /// Visit outcome timestamp (see type-level docs for the sign convention)
    #[serde(default)]
    pub visited_ts: i64,
    /// Number of visit attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// Failure descriptions, newest last
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Permanently excluded from scheduling
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_visit: bool,
    /// Excluded because the target domain honors do-not-track
    #[serde(default, skip_serializing_if = "is_false")]
    pub dnt_allowed: bool,
    /// Discovered in a private/incognito context
    #[serde(default, skip_serializing_if = "is_false")]
    pub private: bool,
    /// The user navigated to the target themselves
    #[serde(default, skip_serializing_if = "is_false")]
    pub clicked_by_user: bool,
    /// Belongs to the page's most recent load
    #[serde(default, skip_serializing_if = "is_false")]
    pub current: bool,
    /// Producer version that created the record
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl AdRecord {
    /// Short log label, e.g. `Ad#12(img)`.
    pub fn info(&self) -> String {
        format!("Ad#{}({})", self.id, self.content_type)
    }

    /// The URL a visit should actually fetch: the recovered destination
    /// when one was parsed, the raw target otherwise.
    pub fn effective_target(&self) -> &str {
        self.parsed_target_url.as_deref().unwrap_or(&self.target_url)
    }
}
