//! HTTP client initialization.

use std::sync::Arc;
use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::Config;

/// Initializes the HTTP client used for ad visits.
///
/// Visits are credentialed: the cookie store is enabled so a visit looks
/// like an ordinary browser navigation to the ad network. Redirects are
/// followed (the post-redirect URL is read off the response); the
/// per-request timeout matches the visit timeout.
pub fn init_client(config: &Config) -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(config.visit_timeout_secs))
        .user_agent(config.user_agent.clone())
        .cookie_store(true)
        .build()?;
    Ok(Arc::new(client))
}
