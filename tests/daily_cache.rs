//! Daily cache behavior against a scripted catalogue and in-memory store.

mod helpers;

use futures::future::join_all;
use grocle::challenge::seed::daily_selection;
use grocle::challenge::{CatalogueLayout, ChallengeError, DailyCache};
use grocle::store::{ChallengeStore, MemoryStore};
use helpers::{CountingStore, FailingStore, FakeCatalogue, WINDOW, items_for, settle};
use std::sync::Arc;
use std::time::Duration;

const LAYOUT: CatalogueLayout = CatalogueLayout::DEFAULT;

fn cache(catalogue: &Arc<FakeCatalogue>, store: Option<Arc<MemoryStore>>) -> DailyCache {
    DailyCache::new(
        LAYOUT,
        catalogue.clone(),
        store.map(|s| s as Arc<dyn ChallengeStore>),
    )
}

#[tokio::test(start_paused = true)]
async fn concurrent_reads_share_one_fetch() {
    let catalogue = Arc::new(FakeCatalogue::with_delay(Duration::from_millis(200)));
    let daily = cache(&catalogue, None);

    let results = join_all((0..20).map(|_| daily.read("2024-03-01"))).await;

    assert_eq!(catalogue.calls(), 1);
    let first = results[0].as_ref().unwrap();
    assert_eq!(first.len(), WINDOW);
    for result in &results {
        assert_eq!(result.as_ref().unwrap(), first);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_share_one_fetch_across_threads() {
    let catalogue = Arc::new(FakeCatalogue::with_delay(Duration::from_millis(50)));
    let daily = Arc::new(cache(&catalogue, None));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let daily = Arc::clone(&daily);
            tokio::spawn(async move { daily.read("2024-03-01").await })
        })
        .collect();

    let mut windows = Vec::new();
    for handle in handles {
        windows.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(catalogue.calls(), 1);
    assert!(windows.iter().all(|w| w == &windows[0]));
}

#[tokio::test]
async fn fresh_entry_is_served_without_fetching() {
    let catalogue = Arc::new(FakeCatalogue::new());
    let daily = cache(&catalogue, None);

    let first = daily.read("2024-03-01").await.unwrap();
    let second = daily.read("2024-03-01").await.unwrap();

    assert_eq!(catalogue.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(daily.peek().map(|(date, _)| date).as_deref(), Some("2024-03-01"));
}

#[tokio::test]
async fn new_day_triggers_a_new_fetch() {
    let catalogue = Arc::new(FakeCatalogue::new());
    let daily = cache(&catalogue, None);

    daily.read("2024-03-01").await.unwrap();
    let next = daily.read("2024-03-02").await.unwrap();
    daily.read("2024-03-02").await.unwrap();

    assert_eq!(catalogue.calls(), 2);
    let selection = daily_selection("2024-03-02", LAYOUT);
    assert_eq!(next.to_vec(), items_for(selection.page, selection.offset));
}

#[tokio::test(start_paused = true)]
async fn overlapping_days_never_share_a_result() {
    let catalogue = Arc::new(FakeCatalogue::with_delay(Duration::from_millis(100)));
    let daily = &cache(&catalogue, None);

    let reads = ["2024-03-01", "2024-03-02", "2024-03-01", "2024-03-02"]
        .map(|date| async move { (date, daily.read(date).await) });
    let results = join_all(reads).await;

    assert_eq!(catalogue.calls(), 2);
    for (date, result) in results {
        let selection = daily_selection(date, LAYOUT);
        assert_eq!(
            result.unwrap().to_vec(),
            items_for(selection.page, selection.offset)
        );
    }
}

#[tokio::test]
async fn fetches_the_page_of_the_day() {
    let catalogue = Arc::new(FakeCatalogue::new());
    let daily = cache(&catalogue, None);

    daily.read("2024-03-01").await.unwrap();
    daily.read("2024-03-02").await.unwrap();

    assert_eq!(catalogue.requests(), vec![(72, 11), (13, 15)]);
    for (page, offset) in catalogue.requests() {
        assert!(page < LAYOUT.max_page);
        assert!(offset + WINDOW <= LAYOUT.page_size);
    }
}

#[tokio::test]
async fn failure_is_shared_and_not_cached() {
    let catalogue = Arc::new(FakeCatalogue::new());
    let store = Arc::new(MemoryStore::new());
    let daily = cache(&catalogue, Some(store.clone()));

    catalogue.fail_next(1);
    let err = daily.read("2024-03-01").await.unwrap_err();
    assert!(matches!(err, ChallengeError::Upstream(_)));
    assert!(daily.peek().is_none());
    settle().await;
    assert!(store.is_empty());

    let items = daily.read("2024-03-01").await.unwrap();
    assert_eq!(items.len(), WINDOW);
    assert_eq!(catalogue.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn coalesced_callers_all_see_the_failure() {
    let catalogue = Arc::new(FakeCatalogue::with_delay(Duration::from_millis(100)));
    let daily = cache(&catalogue, None);

    catalogue.fail_next(1);
    let results = join_all((0..5).map(|_| daily.read("2024-03-01"))).await;

    assert_eq!(catalogue.calls(), 1);
    assert!(results.iter().all(|r| matches!(r, Err(ChallengeError::Upstream(_)))));
}

#[tokio::test]
async fn partial_window_is_an_error() {
    let catalogue = Arc::new(FakeCatalogue::short());
    let daily = cache(&catalogue, None);

    let err = daily.read("2024-03-01").await.unwrap_err();
    assert!(matches!(err, ChallengeError::Upstream(_)));
    assert!(daily.peek().is_none());
}

#[tokio::test]
async fn stored_challenge_is_read_through() {
    let catalogue = Arc::new(FakeCatalogue::new());
    let store = Arc::new(MemoryStore::new());
    let stored = items_for(99, 2);
    store
        .put("2024-03-01", &stored, Duration::from_secs(3600))
        .await
        .unwrap();
    let daily = cache(&catalogue, Some(store));

    let items = daily.read("2024-03-01").await.unwrap();
    daily.read("2024-03-01").await.unwrap();

    assert_eq!(catalogue.calls(), 0);
    assert_eq!(items.to_vec(), stored);
}

#[tokio::test]
async fn wrong_sized_stored_value_is_ignored() {
    let catalogue = Arc::new(FakeCatalogue::new());
    let store = Arc::new(MemoryStore::new());
    store
        .put("2024-03-01", &items_for(1, 0)[..2], Duration::from_secs(3600))
        .await
        .unwrap();
    let daily = cache(&catalogue, Some(store));

    let items = daily.read("2024-03-01").await.unwrap();

    assert_eq!(catalogue.calls(), 1);
    assert_eq!(items.len(), WINDOW);
}

#[tokio::test]
async fn fresh_fetch_is_written_behind() {
    let catalogue = Arc::new(FakeCatalogue::new());
    let store = Arc::new(MemoryStore::new());
    let daily = cache(&catalogue, Some(store.clone()));

    let items = daily.read("2024-03-01").await.unwrap();
    settle().await;

    let persisted = store.get("2024-03-01").await.unwrap();
    assert_eq!(persisted, Some(items.to_vec()));

    // A restarted process adopts the persisted window without fetching.
    let restarted_catalogue = Arc::new(FakeCatalogue::new());
    let restarted = cache(&restarted_catalogue, Some(store));
    assert_eq!(restarted.read("2024-03-01").await.unwrap(), items);
    assert_eq!(restarted_catalogue.calls(), 0);
}

#[tokio::test]
async fn store_failures_never_fail_the_read() {
    let catalogue = Arc::new(FakeCatalogue::new());
    let daily = DailyCache::new(LAYOUT, catalogue.clone(), Some(Arc::new(FailingStore)));

    let items = daily.read("2024-03-01").await.unwrap();
    settle().await;

    assert_eq!(items.len(), WINDOW);
    assert_eq!(catalogue.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_stale_reads_share_one_store_read_and_write() {
    let catalogue = Arc::new(FakeCatalogue::with_delay(Duration::from_millis(100)));
    let store = Arc::new(CountingStore::with_read_delay(Duration::from_millis(50)));
    let daily = DailyCache::new(LAYOUT, catalogue.clone(), Some(store.clone()));

    let results = join_all((0..10).map(|_| daily.read("2024-03-01"))).await;
    settle().await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(store.gets(), 1);
    assert_eq!(store.puts(), 1);
    assert_eq!(catalogue.calls(), 1);

    // Served from memory afterwards: no further store traffic.
    daily.read("2024-03-01").await.unwrap();
    assert_eq!((store.gets(), store.puts()), (1, 1));
}
