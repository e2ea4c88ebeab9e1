//! Import/export through the service handle.

mod helpers;

use helpers::{start_quiet_service, text_candidate};
use serde_json::{json, Value};

#[tokio::test]
async fn test_export_import_round_trip_between_services() {
    let (source, source_scheduler, _s) = start_quiet_service().await;
    source
        .register_candidate(text_candidate("https://a.example/p", "https://s1.example/x"))
        .await
        .unwrap();
    source
        .register_candidate(text_candidate("https://b.example/p", "https://s2.example/y"))
        .await
        .unwrap();
    let exported = source.export(false).await.unwrap();
    source_scheduler.shutdown().await;

    let (target, target_scheduler, _t) = start_quiet_service().await;
    let payload: Value = serde_json::from_str(&exported).unwrap();
    let report = target.import(payload, false).await.unwrap();
    assert_eq!(report.count, 2);
    assert_eq!(target.count(None).await.unwrap(), 2);
    assert_eq!(
        target.count(Some("https://a.example/p".into())).await.unwrap(),
        1
    );

    target_scheduler.shutdown().await;
}

#[tokio::test]
async fn test_sanitized_export_redacts_page_fields() {
    let (service, scheduler, _s) = start_quiet_service().await;
    service
        .register_candidate(text_candidate("https://secret.example/p", "https://s1.example/x"))
        .await
        .unwrap();

    let exported = service.export(true).await.unwrap();
    assert!(!exported.contains("secret.example/p"));
    assert!(exported.contains("********"));
    // target information is retained
    assert!(exported.contains("https://s1.example/x"));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_import_merges_with_live_records() {
    let (service, scheduler, _s) = start_quiet_service().await;
    service
        .register_candidate(text_candidate("https://live.example/p", "https://s0.example/z"))
        .await
        .unwrap();

    let payload = json!({
        "https://a.example/p": [{
            "pageUrl": "https://a.example/p",
            "contentType": "text",
            "contentData": {"title": "Legacy"},
            "targetUrl": "https://s1.example/x"
        }]
    });
    let report = service.import(payload, false).await.unwrap();
    assert_eq!(report.count, 1);
    assert_eq!(service.count(None).await.unwrap(), 2);

    // imported ids never collide with live ones
    let records = service.list(None, false).await.unwrap();
    let mut ids: Vec<u64> = records.iter().map(|ad| ad.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 2);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_import_replace_drops_previous_records() {
    let (service, scheduler, _s) = start_quiet_service().await;
    service
        .register_candidate(text_candidate("https://live.example/p", "https://s0.example/z"))
        .await
        .unwrap();

    let payload = json!({
        "pageUrl": "https://a.example/p",
        "contentType": "text",
        "contentData": {"title": "Only"},
        "targetUrl": "https://s1.example/x"
    });
    let report = service.import(payload, true).await.unwrap();
    assert_eq!(report.count, 1);
    assert_eq!(service.count(None).await.unwrap(), 1);
    assert_eq!(
        service.count(Some("https://a.example/p".into())).await.unwrap(),
        1
    );

    scheduler.shutdown().await;
}
