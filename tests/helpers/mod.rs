//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use grocle::catalogue::{CatalogueClient, Item, UpstreamError};
use grocle::challenge::CatalogueLayout;
use grocle::store::{ChallengeStore, MemoryStore, StoreError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const WINDOW: usize = CatalogueLayout::DEFAULT.window;

/// The item a fake catalogue returns at `page`, `index`.
pub fn make_item(page: u32, index: usize) -> Item {
    Item {
        title: format!("Product p{page}-{index}"),
        price: (page as f64) + (index as f64) / 100.0,
        image_url_small: format!("https://img.example/{page}/{index}.jpg?h=225&w=225"),
        image_url_large: format!("https://img.example/{page}/{index}.jpg?h=540&w=540"),
    }
}

/// Expected window for a fetch at (`page`, `offset`).
pub fn items_for(page: u32, offset: usize) -> Vec<Item> {
    (offset..offset + WINDOW)
        .map(|index| make_item(page, index))
        .collect()
}

/// Scripted catalogue client: counts calls, optionally sleeps, and can be
/// told to fail the next few fetches.
#[derive(Default)]
pub struct FakeCatalogue {
    calls: AtomicUsize,
    failures: AtomicUsize,
    delay: Option<Duration>,
    short_window: bool,
    requests: Mutex<Vec<(u32, usize)>>,
}

impl FakeCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each fetch sleeps for `delay` (tokio time) before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every fetch answers with one item fewer than a full window.
    pub fn short() -> Self {
        Self {
            short_window: true,
            ..Self::default()
        }
    }

    /// Fail the next `n` fetches with a missing-catalogue error.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(u32, usize)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogueClient for FakeCatalogue {
    async fn fetch(&self, page: u32, offset: usize) -> Result<Vec<Item>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((page, offset));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(UpstreamError::MissingCatalogue);
        }

        let mut items = items_for(page, offset);
        if self.short_window {
            items.pop();
        }
        Ok(items)
    }
}

/// A store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl ChallengeStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<Item>>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn put(&self, _key: &str, _items: &[Item], _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

/// Let spawned background work (write-behind) run to completion.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// In-memory store that counts reads and writes, optionally slowing reads.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    read_delay: Option<Duration>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_delay(delay: Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<Item>>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, items: &[Item], ttl: Duration) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, items, ttl).await
    }
}
