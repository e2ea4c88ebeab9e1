//! Candidate validation and record construction.
//!
//! A candidate becomes an [`AdRecord`] only after its page URL, content
//! data, and target survive validation. Failures are reported as
//! [`ValidationError`] and the candidate is dropped by the caller; nothing
//! here is fatal.

use std::collections::HashSet;

use log::{debug, warn};
use serde_json::Value;
use url::Url;

use crate::config::{INTERNAL_LINK_DOMAINS, MAX_URL_LENGTH};
use crate::error_handling::ValidationError;
use crate::store::{AdCandidate, AdRecord, ContentType};
use crate::utils::{decode_entities, domain_of, hostname_of, is_http_url};
use crate::visit::validate_target;

/// Builds the effective internal-link allow-list: the caller's override
/// when non-empty, the built-in defaults otherwise.
pub fn internal_link_allowlist(overrides: &[String]) -> HashSet<String> {
    if overrides.is_empty() {
        INTERNAL_LINK_DOMAINS.iter().map(|d| d.to_string()).collect()
    } else {
        overrides.iter().map(|d| d.to_lowercase()).collect()
    }
}

/// Validates a candidate and builds the record that will be registered.
///
/// Performs the content fix-ups the detector cannot: entity decoding of
/// text fields, image-source repair, domain derivation, obfuscated-target
/// recovery, and the internal-target rejection for same-domain image ads.
pub fn build_record(
    candidate: AdCandidate,
    allowlist: &HashSet<String>,
    now_ms: i64,
    version: &str,
) -> Result<AdRecord, ValidationError> {
    if candidate.page_url.len() > MAX_URL_LENGTH || !is_http_url(&candidate.page_url) {
        return Err(ValidationError::InvalidPageUrl(candidate.page_url));
    }
    if candidate.content_data.is_empty() {
        return Err(ValidationError::MissingContentData);
    }

    let mut content_data = candidate.content_data;
    match candidate.content_type {
        ContentType::Text => {
            for key in ["title", "text", "site"] {
                let decoded = match content_data.get(key) {
                    Some(Value::String(s)) => Some(decode_entities(s)),
                    _ => None,
                };
                if let Some(decoded) = decoded {
                    content_data.insert(key.to_string(), Value::String(decoded));
                }
            }
        }
        ContentType::Image => {
            let fixed = match content_data.get("src") {
                Some(Value::String(src)) => repair_image_src(src, &candidate.page_url)
                    .inspect(|fixed| debug!("Repaired image source {src} -> {fixed}")),
                _ => None,
            };
            if let Some(fixed) = fixed {
                content_data.insert("src".to_string(), Value::String(fixed));
            }
        }
    }

    let page_domain = domain_of(&candidate.page_url)
        .or_else(|| hostname_of(&candidate.page_url))
        .unwrap_or_else(|| candidate.page_url.clone());

    let mut record = AdRecord {
        id: 0,
        page_url: candidate.page_url,
        page_title: candidate.page_title,
        page_domain: Some(page_domain),
        content_type: candidate.content_type,
        content_data,
        title: "Pending".to_string(),
        target_url: candidate.target_url,
        resolved_target_url: None,
        parsed_target_url: None,
        target_domain: None,
        target_hostname: None,
        ad_network: None,
        found_ts: now_ms,
        attempted_ts: 0,
        visited_ts: 0,
        attempts: 0,
        errors: Vec::new(),
        no_visit: false,
        dnt_allowed: false,
        private: candidate.private,
        clicked_by_user: false,
        current: true,
        version: version.to_string(),
    };

    validate_target(&mut record)?;

    if is_internal_target(&record, allowlist) {
        let domain = record.page_domain.clone().unwrap_or_default();
        warn!(
            "[INTERN] Ignoring ad on {}, target: {}",
            domain, record.target_url
        );
        return Err(ValidationError::InternalTarget(domain));
    }

    Ok(record)
}

/// An image ad whose target stays on the page's own registrable domain is
/// site navigation, not advertising, unless the domain is allow-listed.
/// Text ads are exempt: search-style ads routinely point at the search
/// engine itself.
fn is_internal_target(record: &AdRecord, allowlist: &HashSet<String>) -> bool {
    if record.content_type == ContentType::Text {
        return false;
    }
    match (&record.page_domain, &record.target_domain) {
        (Some(page), Some(target)) if page == target => !allowlist.contains(page.as_str()),
        _ => false,
    }
}

/// Repairs protocol-relative and page-relative image sources. Returns the
/// replacement source, or `None` when the original is already usable.
fn repair_image_src(src: &str, page_url: &str) -> Option<String> {
    if src.starts_with("http") || src.starts_with("data:image") {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    match Url::parse(page_url).and_then(|base| base.join(src)) {
        Ok(joined) => Some(joined.to_string()),
        Err(_) => None,
    }
}

/// Structural validation and self-healing for stored or imported records.
///
/// Repairs the `visitedTs == 0 ⇒ attempts == 0` resting-state invariant
/// and re-derives the domain fields an export strips. Returns false when
/// the record is unusable and must be dropped.
pub(crate) fn validate_fields(ad: &mut AdRecord) -> bool {
    if ad.visited_ts == 0 && ad.attempts > 0 {
        warn!("Invalid visitedTs/attempts pair on {}, resetting attempts", ad.info());
        ad.attempts = 0;
    }

    // derived fields are stripped on export; re-derive them
    if ad.page_domain.as_deref().map_or(true, str::is_empty) && !ad.page_url.is_empty() {
        ad.page_domain = domain_of(&ad.page_url)
            .or_else(|| hostname_of(&ad.page_url))
            .or_else(|| Some(ad.page_url.clone()));
    }
    let effective = ad
        .resolved_target_url
        .clone()
        .unwrap_or_else(|| ad.target_url.clone());
    if ad.target_domain.is_none() && !effective.is_empty() {
        ad.target_domain = domain_of(&effective);
    }
    if ad.target_hostname.is_none() && !effective.is_empty() {
        ad.target_hostname = hostname_of(&effective);
    }

    // redacted private records legitimately have empty page and target URLs
    if ad.private {
        return true;
    }
    !ad.page_url.is_empty() && !ad.target_url.is_empty()
}
