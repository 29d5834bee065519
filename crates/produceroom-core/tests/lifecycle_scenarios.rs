//! End-to-end lifecycle scenarios against the in-memory store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use produceroom_core::store::{self, paths};
use produceroom_core::{
    CompletedItem, Event, Item, ItemLifecycle, ItemState, KvStore, ManualClock, MemoryStore,
    NewItem, Priority, Sku, TimingEvent,
};
use serde_json::json;

fn harness() -> (Arc<MemoryStore>, Arc<ManualClock>, ItemLifecycle) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 7, 30, 0).unwrap(),
    ));
    let lifecycle = ItemLifecycle::new(store.clone(), clock.clone());
    (store, clock, lifecycle)
}

fn seed(store: &MemoryStore, id: &str, name: &str, cases: u32) {
    store
        .set(
            &paths::item(id),
            json!({"name": name, "location": "Cooler 3", "cases": cases, "priority": 2}),
        )
        .unwrap();
}

#[test]
fn timed_completion_records_history() {
    let (store, clock, mut lc) = harness();
    seed(&store, "apples", "Apples #123", 10);
    lc.load().unwrap();

    lc.start_timer("apples").unwrap();
    clock.advance(Duration::seconds(5));
    let event = lc.complete("apples", None).unwrap();

    let Event::ItemCompleted {
        timing: Some(timing),
        average: Some(average),
        ..
    } = event
    else {
        panic!("expected a timed completion");
    };
    assert!((timing.total_time - 5.0).abs() < 0.01);
    assert_eq!(timing.cases, 10);
    assert!((timing.time_per_case - 0.5).abs() < 0.001);
    assert!((average - 0.5).abs() < 0.001);

    let history: Vec<TimingEvent> = store::read(store.as_ref(), "timingEvents/123")
        .unwrap()
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(store.get("items/apples").unwrap(), None);

    let done: CompletedItem = store::read(store.as_ref(), "completedItems/apples")
        .unwrap()
        .unwrap();
    assert_eq!(done.completed_at, lc.now());
    assert!(!lc.timers().is_tracking("apples"));
}

#[test]
fn paused_time_is_what_gets_recorded() {
    let (store, clock, mut lc) = harness();
    seed(&store, "kale", "Kale #77", 4);
    lc.load().unwrap();

    lc.start_timer("kale").unwrap();
    clock.advance(Duration::seconds(8));
    lc.toggle("kale").unwrap();
    clock.advance(Duration::minutes(30));
    lc.complete("kale", None).unwrap();

    let stats = lc.stats(&Sku::parse("77").unwrap()).unwrap();
    assert!((stats.average - 2.0).abs() < 1e-9);
    assert_eq!(stats.total_cases, 4);
}

#[test]
fn sku_77_average_tracks_deletions() {
    let (store, clock, mut lc) = harness();
    lc.load().unwrap();
    for (id, secs) in [("a", 2), ("b", 4)] {
        seed(&store, id, "Leeks #77", 1);
        lc.load().unwrap();
        lc.start_timer(id).unwrap();
        clock.advance(Duration::seconds(secs));
        lc.toggle(id).unwrap();
        lc.complete(id, None).unwrap();
    }
    let sku = Sku::parse("77").unwrap();
    assert_eq!(lc.stats(&sku).unwrap().average, 3.0);
    assert_eq!(store.get("historicalTimes/77").unwrap(), Some(json!(3.0)));

    lc.delete_timing_event(&sku, 0).unwrap();
    assert_eq!(lc.stats(&sku).unwrap().average, 4.0);

    lc.delete_timing_event(&sku, 0).unwrap();
    assert!(lc.stats(&sku).is_none());
    assert_eq!(store.get("historicalTimes/77").unwrap(), None);
    assert!(lc.delete_timing_event(&sku, 0).is_err());
}

#[test]
fn undo_restores_item_but_keeps_average() {
    let (store, clock, mut lc) = harness();
    seed(&store, "pears", "Pears #9", 3);
    lc.load().unwrap();
    let before: Item = lc.state().items["pears"].clone();

    lc.start_timer("pears").unwrap();
    clock.advance(Duration::seconds(9));
    lc.complete("pears", None).unwrap();
    lc.undo("pears").unwrap();

    let restored: Item = store::read(store.as_ref(), "items/pears").unwrap().unwrap();
    assert_eq!(restored.name, before.name);
    assert_eq!(restored.location, before.location);
    assert_eq!(restored.cases, before.cases);
    assert_eq!(restored.priority, before.priority);
    assert!(store.get("items/pears/completedAt").unwrap().is_none());
    assert_eq!(store.get("completedItems").unwrap(), None);
    assert_eq!(store.get("historicalTimes/9").unwrap(), Some(json!(3.0)));
    assert_eq!(lc.item_state("pears"), Some(ItemState::Queued));
    assert!(lc.undo("pears").is_err());
}

#[test]
fn item_without_sku_completes_without_history() {
    let (store, clock, mut lc) = harness();
    seed(&store, "onions", "Loose onions", 2);
    lc.load().unwrap();
    lc.start_timer("onions").unwrap();
    clock.advance(Duration::seconds(4));
    let event = lc.complete("onions", None).unwrap();
    assert!(matches!(event, Event::ItemCompleted { sku: None, timing: None, .. }));
    assert_eq!(store.get("timingEvents").unwrap(), None);
}

#[test]
fn priority_registry_scenario() {
    let (_store, _clock, mut lc) = harness();
    assert!(lc.add_priority(Priority::Level(5)).unwrap().is_some());
    assert!(lc.add_priority(Priority::Level(5)).unwrap().is_none());
    lc.add_priority(Priority::Missing).unwrap();
    assert_eq!(lc.priorities(), &[Priority::Missing, Priority::Level(5)]);
}

#[test]
fn removed_priority_stays_on_items() {
    let (store, _clock, mut lc) = harness();
    lc.add_item(NewItem {
        name: "Chard #31".into(),
        location: "Bay 1".into(),
        cases: 2,
        priority: Priority::Level(4),
    })
    .unwrap();
    lc.remove_priority(Priority::Level(4)).unwrap();
    assert!(lc.priorities().is_empty());
    let id = lc.state().items.keys().next().cloned().unwrap();
    assert_eq!(store.get(&format!("items/{id}/priority")).unwrap(), Some(json!(4)));
}

#[test]
fn progress_follows_completions() {
    let (_store, _clock, mut lc) = harness();
    lc.load_worklist(
        vec![
            NewItem {
                name: "Apples #123".into(),
                location: "A".into(),
                cases: 6,
                priority: Priority::Level(1),
            },
            NewItem {
                name: "Kale #77".into(),
                location: "B".into(),
                cases: 2,
                priority: Priority::Missing,
            },
        ],
        None,
    )
    .unwrap();
    let kale = lc
        .state()
        .items
        .values()
        .find(|i| i.name.starts_with("Kale"))
        .map(|i| i.id.clone())
        .unwrap();
    lc.complete(&kale, None).unwrap();

    let progress = lc.progress();
    assert_eq!(progress.total_cases, 8);
    assert_eq!(progress.completed_cases, 2);
    assert_eq!(progress.remaining_cases, 6);
    assert_eq!(progress.remaining_items, 1);
    assert_eq!(progress.completed_pct, 25);
}

#[test]
fn two_clients_share_the_store() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    seed(&store, "x", "Beets #40", 5);

    let mut first = ItemLifecycle::new(store.clone(), clock.clone());
    let mut second = ItemLifecycle::new(store.clone(), clock.clone());
    first.load().unwrap();
    let rx = second.watch().unwrap();
    second.pump(&rx);

    first.complete("x", None).unwrap();
    second.pump(&rx);
    assert_eq!(second.item_state("x"), Some(ItemState::Completed));
}
