//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ad_visitor::{
    AdCandidate, AdService, AllowAll, ContentType, DntPolicy, DurableStore, MemoryStore,
    ProcessingStats, Scheduler, SchedulerOptions,
};
use serde_json::json;

/// A text ad candidate for `page` pointing at `target`.
pub fn text_candidate(page: &str, target: &str) -> AdCandidate {
    AdCandidate {
        target_url: target.to_string(),
        content_type: ContentType::Text,
        content_data: [
            ("title".to_string(), json!("T")),
            ("text".to_string(), json!("hi")),
        ]
        .into_iter()
        .collect(),
        page_url: page.to_string(),
        page_title: Some("Page".to_string()),
        private: false,
    }
}

/// An image ad candidate.
pub fn image_candidate(page: &str, target: &str, src: &str) -> AdCandidate {
    AdCandidate {
        target_url: target.to_string(),
        content_type: ContentType::Image,
        content_data: [
            ("src".to_string(), json!(src)),
            ("width".to_string(), json!(300)),
            ("height".to_string(), json!(250)),
        ]
        .into_iter()
        .collect(),
        page_url: page.to_string(),
        page_title: None,
        private: false,
    }
}

/// Options for tests that must never hit the network.
pub fn no_visit_options() -> SchedulerOptions {
    let mut options = SchedulerOptions::default();
    options.visiting_enabled = false;
    options
}

/// Starts a scheduler over an in-memory durable store.
pub async fn start_memory_service(
    options: SchedulerOptions,
    dnt: Arc<dyn DntPolicy>,
) -> (AdService, Scheduler, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::new());
    let durable: Arc<dyn DurableStore> = memory.clone();
    let (service, scheduler) = Scheduler::start(
        options,
        Arc::new(reqwest::Client::new()),
        dnt,
        durable,
        Arc::new(ProcessingStats::new()),
    )
    .await
    .expect("scheduler start");
    (service, scheduler, memory)
}

/// Starts a no-network scheduler with a permissive DNT policy.
pub async fn start_quiet_service() -> (AdService, Scheduler, Arc<MemoryStore>) {
    start_memory_service(no_visit_options(), Arc::new(AllowAll)).await
}
