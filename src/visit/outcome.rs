//! Visit outcome classification and response parsing.

use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use scraper::{Html, Selector};

use crate::config::ERROR_TITLE_STRINGS;
use crate::error_handling::VisitError;

/// Result of one visit attempt, as reported back to the scheduler.
#[derive(Debug, Clone)]
pub enum VisitOutcome {
    /// The target answered 2xx with a plausible landing page.
    Success {
        /// Landing-page title, when one was found
        title: Option<String>,
        /// URL after redirects
        resolved_url: String,
        /// True destination decoded from an interstitial redirector
        parsed_target_url: Option<String>,
    },
    /// The attempt failed; the record may be retried until its attempt
    /// budget runs out.
    Failure(VisitError),
}

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static title selector"));

/// Known interstitial redirectors whose response is not the ad's landing
/// page; the true destination is embedded in the URL.
static OUTLINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"facebook\.com/l\.php").expect("static outlink regex"));

/// Extracts the landing page's title, if any.
pub fn extract_title(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let element = document.select(&TITLE_SELECTOR).next()?;
    let title: String = element.text().collect::<String>().trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// True when a title matches a known soft-404 signature; such responses
/// count as failures despite their 2xx status.
pub fn is_error_page_title(title: &str) -> bool {
    let lowered = title.to_lowercase();
    ERROR_TITLE_STRINGS
        .iter()
        .any(|signature| lowered.contains(signature))
}

/// Detects an interstitial-redirector visit and decodes the true
/// destination from the final URL. Returns `None` for ordinary targets.
pub fn decode_outlink(requested_url: &str, final_url: &str) -> Option<String> {
    if !OUTLINK_RE.is_match(requested_url) {
        return None;
    }
    let decoded = urlencoding::decode(final_url)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| final_url.to_string());
    let idx = decoded.rfind("http")?;
    let destination = decoded[idx..].to_string();
    if destination == decoded && idx == 0 {
        // nothing was actually embedded
        warn!("Outlink redirector without embedded destination: {final_url}");
        return None;
    }
    Some(destination)
}

/// Maps a reqwest failure onto the visit error taxonomy.
pub fn classify_request_error(err: &reqwest::Error) -> VisitError {
    if err.is_timeout() {
        VisitError::Timeout
    } else if err.is_connect() {
        VisitError::Network(format!("connect: {err}"))
    } else {
        VisitError::Network(err.to_string())
    }
}
