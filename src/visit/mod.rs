//! The visit executor: one credentialed fetch per pending ad.
//!
//! The executor performs exactly one network round-trip and classifies the
//! result; all record mutation happens back on the scheduler task when the
//! outcome is delivered.

mod outcome;
mod target;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::error_handling::VisitError;
use crate::store::AdRecord;

pub use outcome::{
    classify_request_error, decode_outlink, extract_title, is_error_page_title, VisitOutcome,
};
pub use target::validate_target;

/// Performs visit fetches with a fixed timeout.
#[derive(Clone)]
pub struct VisitExecutor {
    client: Arc<reqwest::Client>,
    timeout: Duration,
}

impl VisitExecutor {
    /// Creates an executor over a shared HTTP client.
    pub fn new(client: Arc<reqwest::Client>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetches the record's target and classifies the result.
    ///
    /// The whole round-trip (request plus body read) is bounded by the
    /// visit timeout. HTTP 2xx with an error-page title is a failure.
    pub async fn visit(&self, ad: &AdRecord) -> VisitOutcome {
        let target = ad.effective_target().to_string();
        debug!("[TRYING] {} {}", ad.info(), target);

        let response = match tokio::time::timeout(self.timeout, self.client.get(&target).send())
            .await
        {
            Err(_) => {
                warn!("[TIMEOUT] Visiting {target}");
                return VisitOutcome::Failure(VisitError::Timeout);
            }
            Ok(Err(e)) => return VisitOutcome::Failure(classify_request_error(&e)),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        let resolved_url = response.url().to_string();
        if !status.is_success() {
            return VisitOutcome::Failure(VisitError::HttpStatus {
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            });
        }

        // an interstitial redirector's body is not the ad's landing page
        if let Some(parsed) = decode_outlink(&target, &resolved_url) {
            return VisitOutcome::Success {
                title: None,
                resolved_url,
                parsed_target_url: Some(parsed),
            };
        }

        let body = match tokio::time::timeout(self.timeout, response.text()).await {
            Err(_) => return VisitOutcome::Failure(VisitError::Timeout),
            Ok(Err(e)) => return VisitOutcome::Failure(VisitError::Body(e.to_string())),
            Ok(Ok(body)) => body,
        };

        match extract_title(&body) {
            Some(title) if is_error_page_title(&title) => {
                warn!("Error-page title for {target}: {title}");
                VisitOutcome::Failure(VisitError::BadTitle(title))
            }
            title => VisitOutcome::Success {
                title,
                resolved_url,
                parsed_target_url: None,
            },
        }
    }
}
