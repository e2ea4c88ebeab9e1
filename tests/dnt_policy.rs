//! Do-not-track policy behavior across scheduler ticks.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use ad_visitor::{DomainListPolicy, RegisterOutcome, SchedulerOptions};
use helpers::{start_memory_service, text_candidate};

#[tokio::test(start_paused = true)]
async fn test_dnt_listed_target_is_flagged_and_never_visited() {
    // visiting is fully enabled; the DNT policy alone must keep the
    // record out of the schedule
    let options = SchedulerOptions::default();
    let dnt = Arc::new(DomainListPolicy::new(["tracker.example"]));
    let (service, scheduler, _store) = start_memory_service(options, dnt).await;

    let outcome = service
        .register_candidate(text_candidate(
            "https://news.example/story",
            "https://ads.tracker.example/click?id=1",
        ))
        .await
        .unwrap();
    let RegisterOutcome::Inserted(ad) = outcome else {
        panic!("expected insert, got {outcome:?}");
    };
    assert!(ad.dnt_allowed);
    assert!(ad.no_visit);

    // let many poll intervals elapse (virtual time)
    tokio::time::sleep(Duration::from_secs(120)).await;

    let records = service.list(None, false).await.unwrap();
    assert_eq!(records.len(), 1);
    let ad = &records[0];
    // never selected by the scheduler across any number of ticks
    assert_eq!(ad.attempts, 0);
    assert_eq!(ad.attempted_ts, 0);
    assert_eq!(ad.visited_ts, 0);
    assert_eq!(service.pending_count().await.unwrap(), 0);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unlisted_target_stays_pending_when_visiting_disabled() {
    let mut options = SchedulerOptions::default();
    options.visiting_enabled = false;
    let dnt = Arc::new(DomainListPolicy::new(["tracker.example"]));
    let (service, scheduler, _store) = start_memory_service(options, dnt).await;

    let outcome = service
        .register_candidate(text_candidate(
            "https://news.example/story",
            "https://shop.example/deal",
        ))
        .await
        .unwrap();
    let RegisterOutcome::Inserted(ad) = outcome else {
        panic!("expected insert");
    };
    assert!(!ad.dnt_allowed);
    assert!(!ad.no_visit);

    tokio::time::sleep(Duration::from_secs(60)).await;

    // visiting disabled: the record stays untouched but pending
    let records = service.list(None, false).await.unwrap();
    assert_eq!(records[0].attempts, 0);
    assert_eq!(service.pending_count().await.unwrap(), 1);

    scheduler.shutdown().await;
}
