//! Content and page fingerprinting.
//!
//! Fingerprints are the store's dedup keys: hex-encoded SHA-256 digests
//! computed from an ad's semantic content. The hash input is built from
//! sorted content keys so field ordering never changes the result, and the
//! presentation-only `width`/`height` fields are excluded so a visually
//! resized duplicate collapses onto the same record.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::FINGERPRINT_HEX_LEN;
use crate::store::AdRecord;

/// Separator joining hash-input fragments.
const SEPARATOR: &str = "::";

/// Marker appended for records belonging to a private browsing context.
const PRIVATE_MARKER: &str = "private";

/// Content fields that never contribute to the fingerprint.
const POSITIONAL_FIELDS: &[&str] = &["width", "height"];

static FINGERPRINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    // LazyLock body, pattern is a compile-time constant so parse cannot fail
    Regex::new(&format!("^[0-9a-f]{{{FINGERPRINT_HEX_LEN}}}$")).expect("static fingerprint regex")
});

/// Returns true if `key` has the exact shape of a fingerprint
/// (64 lowercase hex digits).
pub fn is_valid_fingerprint(key: &str) -> bool {
    FINGERPRINT_RE.is_match(key)
}

fn digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Renders a content-data value the way it participates in the hash input.
/// Strings contribute their raw text; everything else its JSON rendering.
fn value_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Computes the content fingerprint for an ad.
///
/// The hash input is the page domain (page URL when no domain is known)
/// followed by each non-positional content value in sorted-key order. Pass
/// `private = true` to derive the relocated key used when a private-context
/// record is redacted into the reserved bucket.
pub fn content_fingerprint(ad: &AdRecord, private: bool) -> String {
    let seed = ad
        .page_domain
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(&ad.page_url);
    content_fingerprint_parts(seed, &ad.content_data, private)
}

/// [`content_fingerprint`] over raw parts, for callers that have not built
/// a full record yet.
pub fn content_fingerprint_parts(
    seed: &str,
    content_data: &BTreeMap<String, Value>,
    private: bool,
) -> String {
    let mut input = seed.to_string();
    for (key, value) in content_data {
        if POSITIONAL_FIELDS.contains(&key.as_str()) {
            continue;
        }
        input.push_str(SEPARATOR);
        input.push_str(&value_fragment(value));
    }
    if private {
        input.push_str(PRIVATE_MARKER);
    }
    digest(&input)
}

/// Computes the page-level bucket key for a page URL.
pub fn page_fingerprint(page_url: &str) -> String {
    digest(page_url)
}

/// The reserved bucket key holding anonymized private-context records:
/// the fingerprint of the empty string.
pub fn private_bucket_key() -> String {
    digest("")
}
