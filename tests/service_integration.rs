//! End-to-end tests of the service handle against an in-memory store.

mod helpers;

use ad_visitor::{AdEvent, RegisterOutcome};
use helpers::{image_candidate, start_quiet_service, text_candidate};
use serde_json::json;

#[tokio::test]
async fn test_register_then_duplicate_keeps_one_record() {
    let (service, scheduler, _store) = start_quiet_service().await;

    let first = service
        .register_candidate(text_candidate("http://x.com", "https://shop.example/deal"))
        .await
        .unwrap();
    let RegisterOutcome::Inserted(inserted) = first else {
        panic!("expected insert, got {first:?}");
    };
    assert_eq!(inserted.id, 1);
    assert_eq!(inserted.title, "Pending");

    // identical content registers as a duplicate and returns the original
    let second = service
        .register_candidate(text_candidate("http://x.com", "https://shop.example/deal"))
        .await
        .unwrap();
    let RegisterOutcome::Duplicate(existing) = second else {
        panic!("expected duplicate, got {second:?}");
    };
    assert_eq!(existing.id, inserted.id);
    assert_eq!(service.count(None).await.unwrap(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_resized_image_ad_is_a_duplicate() {
    let (service, scheduler, _store) = start_quiet_service().await;

    let mut small = image_candidate(
        "https://news.example/story",
        "https://shop.example/deal",
        "https://cdn.example/ad.png",
    );
    small.content_data.insert("width".into(), json!(300));

    let mut large = small.clone();
    large.content_data.insert("width".into(), json!(728));
    large.content_data.insert("height".into(), json!(90));

    assert!(matches!(
        service.register_candidate(small).await.unwrap(),
        RegisterOutcome::Inserted(_)
    ));
    assert!(matches!(
        service.register_candidate(large).await.unwrap(),
        RegisterOutcome::Duplicate(_)
    ));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_monotonic_ids_across_register_and_delete() {
    let (service, scheduler, _store) = start_quiet_service().await;

    let mut ids = Vec::new();
    for n in 0..3 {
        let outcome = service
            .register_candidate(text_candidate(
                &format!("https://page{n}.example/p"),
                &format!("https://shop{n}.example/deal"),
            ))
            .await
            .unwrap();
        let RegisterOutcome::Inserted(ad) = outcome else {
            panic!("expected insert");
        };
        ids.push(ad.id);
    }
    assert_eq!(ids, vec![1, 2, 3]);

    // deleting the newest record must not allow id reuse
    assert!(service.delete(3).await.unwrap());
    let outcome = service
        .register_candidate(text_candidate(
            "https://page9.example/p",
            "https://shop9.example/deal",
        ))
        .await
        .unwrap();
    let RegisterOutcome::Inserted(ad) = outcome else {
        panic!("expected insert");
    };
    assert_eq!(ad.id, 4);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_list_by_page_and_current_only() {
    let (service, scheduler, _store) = start_quiet_service().await;

    service
        .register_candidate(text_candidate("https://a.example/p", "https://s1.example/x"))
        .await
        .unwrap();
    service
        .register_candidate(text_candidate("https://b.example/p", "https://s2.example/y"))
        .await
        .unwrap();

    assert_eq!(service.count(None).await.unwrap(), 2);
    assert_eq!(
        service.count(Some("https://a.example/p".into())).await.unwrap(),
        1
    );

    // a fresh page load demotes the page's ads from "current"
    service.page_loaded("https://a.example/p").await.unwrap();
    service.flush().await.unwrap();
    let current = service
        .list(Some("https://a.example/p".into()), true)
        .await
        .unwrap();
    assert!(current.is_empty());
    let all = service
        .list(Some("https://a.example/p".into()), false)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_clear_all_resets_ids_and_user_visits() {
    let (service, scheduler, _store) = start_quiet_service().await;

    service
        .register_candidate(text_candidate("https://a.example/p", "https://s1.example/x"))
        .await
        .unwrap();
    service.page_loaded("https://s1.example/x").await.unwrap();

    assert_eq!(service.clear_all().await.unwrap(), 1);
    assert_eq!(service.count(None).await.unwrap(), 0);

    // the generator restarts: the next registration gets id 1 and is not
    // suppressed by the (cleared) user-visited set
    let outcome = service
        .register_candidate(text_candidate("https://a.example/p", "https://s1.example/x"))
        .await
        .unwrap();
    let RegisterOutcome::Inserted(ad) = outcome else {
        panic!("expected insert after clear");
    };
    assert_eq!(ad.id, 1);
    assert!(!ad.no_visit);
    assert_eq!(service.pending_count().await.unwrap(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_unparseable_import_reports_zero_and_preserves_store() {
    let (service, scheduler, _store) = start_quiet_service().await;

    service
        .register_candidate(text_candidate("https://a.example/p", "https://s1.example/x"))
        .await
        .unwrap();

    let report = service
        .import(json!("not an object or array"), false)
        .await
        .unwrap();
    assert_eq!(report.count, 0);
    assert_eq!(service.count(None).await.unwrap(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_detected_event_is_broadcast() {
    let (service, scheduler, _store) = start_quiet_service().await;
    let mut events = service.subscribe();

    service
        .register_candidate(text_candidate("https://a.example/p", "https://s1.example/x"))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        AdEvent::Detected(ad) => assert_eq!(ad.page_url, "https://a.example/p"),
        other => panic!("unexpected event {other:?}"),
    }

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_user_visited_target_is_never_scheduled() {
    let (service, scheduler, _store) = start_quiet_service().await;

    service
        .register_candidate(text_candidate("https://a.example/p", "https://s1.example/x"))
        .await
        .unwrap();
    // the user navigates to the ad's target themselves
    service.page_loaded("https://s1.example/x").await.unwrap();
    assert_eq!(service.pending_count().await.unwrap(), 0);

    scheduler.shutdown().await;
}
