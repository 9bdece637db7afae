//! Progress store tests: per-request isolation, bounds and expiry

use chrono::{Duration, Utc};
use sheet_migrate::migrate::ProgressSink;
use sheet_migrate::progress::{ProgressState, ProgressStore};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_requests_do_not_interfere() {
    let store = Arc::new(ProgressStore::default());

    let workers: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let id = format!("req-{}", n);
                store.begin(&id);
                let handle = store.handle(id.clone());
                for percent in [10u8, 60, 70, 80, 90] {
                    handle.report(percent, &format!("{} at {}", id, percent));
                }
                if n % 2 == 0 {
                    handle.complete("Migration complete");
                } else {
                    handle.fail("Error processing file");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(store.len(), 8);
    for n in 0..8 {
        let entry = store.get(&format!("req-{}", n)).unwrap();
        assert_eq!(entry.percent, 100);
        let expected = if n % 2 == 0 {
            ProgressState::Completed
        } else {
            ProgressState::Failed
        };
        assert_eq!(entry.state, expected);
    }
}

#[test]
fn test_running_entries_outlive_finished_ones() {
    let store = ProgressStore::new(4, Duration::seconds(1));
    store.update("slow", 60, "Copied Planned");
    store.complete("done", "Migration complete");

    let an_hour_later = Utc::now() + Duration::hours(1);
    assert!(store.get_at("slow", an_hour_later).is_some());
    assert!(store.get_at("done", an_hour_later).is_none());
}

#[test]
fn test_stale_running_entries_free_their_slot() {
    let store = ProgressStore::new(1, Duration::seconds(1));
    store.update("abandoned", 60, "Copied Planned");

    let two_days_later = Utc::now() + Duration::days(2);
    assert!(store.get_at("abandoned", two_days_later).is_none());
    assert_eq!(store.evict_expired_at(two_days_later), 1);
    store.begin("next");
    assert!(store.get("next").is_some());
}

#[test]
fn test_capacity_is_at_least_one() {
    let store = ProgressStore::new(0, Duration::seconds(60));
    assert_eq!(store.capacity(), 1);
    store.begin("a");
    store.begin("b");
    assert_eq!(store.len(), 1);
    assert!(store.get("b").is_some());
}

#[test]
fn test_updating_existing_entry_does_not_evict() {
    let store = ProgressStore::new(2, Duration::seconds(60));
    store.begin("a");
    store.begin("b");
    store.update("a", 50, "halfway");
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("b").unwrap().percent, 0);
}

#[test]
fn test_removed_entry_is_gone() {
    let store = ProgressStore::default();
    store.begin("gone");
    assert!(store.remove("gone").is_some());
    assert!(store.get("gone").is_none());
    assert!(store.is_empty());
}
