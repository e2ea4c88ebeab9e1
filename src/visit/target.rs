//! Target URL validation and repair.
//!
//! Ad targets arrive in rough shape: tracking wrappers embed the real URL
//! percent-encoded mid-string, and some networks emit URLs missing the
//! slash between domain and path. Everything recoverable is repaired in
//! place on the record; anything else is a [`ValidationError`] and the
//! record is deleted rather than retried.

use log::debug;
use url::Url;

use crate::config::MAX_URL_LENGTH;
use crate::error_handling::ValidationError;
use crate::store::AdRecord;
use crate::utils::{domain_of, hostname_of, is_valid_domain};

/// Validates a record's target, repairing what it can.
///
/// On success `target_hostname`/`target_domain` are set and the target URL
/// is normalized. An embedded http(s) URL recovered from an obfuscated
/// target lands in `parsed_target_url` and replaces `target_url`.
pub fn validate_target(ad: &mut AdRecord) -> Result<(), ValidationError> {
    if ad.target_url.len() > MAX_URL_LENGTH {
        return Err(ValidationError::MalformedTarget(format!(
            "{}... ({} chars)",
            &ad.target_url[..50.min(ad.target_url.len())],
            ad.target_url.len()
        )));
    }

    if !ad.target_url.starts_with("http") {
        let Some(idx) = ad.target_url.find("http") else {
            return Err(ValidationError::MalformedTarget(ad.target_url.clone()));
        };
        let embedded = &ad.target_url[idx..];
        let recovered = urlencoding::decode(embedded)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| embedded.to_string());
        debug!("Recovered embedded target: {} -> {}", ad.target_url, recovered);
        ad.parsed_target_url = Some(recovered.clone());
        ad.target_url = recovered;
    }

    let effective = ad
        .resolved_target_url
        .clone()
        .unwrap_or_else(|| ad.target_url.clone());
    let parsed = Url::parse(&effective)
        .map_err(|e| ValidationError::MalformedTarget(format!("{effective}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::MalformedTarget(effective));
    }

    let hostname = parsed
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or_else(|| ValidationError::MalformedTarget(effective.clone()))?;
    let domain = domain_of(&effective)
        .or_else(|| hostname_of(&effective))
        .unwrap_or_else(|| hostname.clone());
    if !is_valid_domain(&domain) {
        return Err(ValidationError::InvalidTargetDomain(domain));
    }

    repair_missing_slash(ad, &domain);

    ad.target_hostname = Some(hostname);
    ad.target_domain = Some(domain);
    Ok(())
}

/// Some ad networks emit targets like `http://shop.example?c=1` where the
/// path starts directly after the domain. Insert the missing slash so the
/// URL is unambiguous. Ports and existing paths are left alone.
fn repair_missing_slash(ad: &mut AdRecord, domain: &str) {
    let url = ad.target_url.clone();
    let Some(idx) = url.find(domain) else {
        return;
    };
    let end = idx + domain.len();
    if end < url.len() {
        let next = url.as_bytes()[end];
        if next != b'/' && next != b':' {
            ad.target_url = format!("{}/{}", &url[..end], &url[end..]);
        }
    }
}
