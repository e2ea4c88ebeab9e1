//! URL and domain helpers.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Syntactic domain check: dotted labels of letters, digits, and hyphens
/// ending in an alphabetic TLD.
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9-]{1,63}\.){0,5}[a-zA-Z0-9][a-zA-Z0-9-]{0,62}\.[a-zA-Z]{2,64}$")
        .expect("static domain regex")
});

/// Returns true if `domain` is a syntactically valid domain name.
pub fn is_valid_domain(domain: &str) -> bool {
    DOMAIN_RE.is_match(domain)
}

/// Lowercased hostname of a URL, if it parses and has one.
pub fn hostname_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|h| h.to_lowercase())
}

/// Registrable domain of a URL, via the Public Suffix List. Falls back to
/// the bare hostname when the PSL has no answer (e.g. intranet hosts).
pub fn domain_of(url: &str) -> Option<String> {
    let host = hostname_of(url)?;
    match psl::domain_str(&host) {
        Some(domain) => Some(domain.to_string()),
        None => Some(host),
    }
}

/// Returns true if the URL parses and uses the http or https scheme.
pub fn is_http_url(url: &str) -> bool {
    matches!(Url::parse(url), Ok(parsed) if matches!(parsed.scheme(), "http" | "https"))
}
