//! Daily challenge cache: one window per calendar day.
//!
//! Freshness is purely a function of the date string the caller passes in;
//! the cache never looks at the clock to decide a day has ended. A miss first
//! consults the durable store (so a restart keeps serving the same items),
//! then derives the page of the day and fetches it. Freshly fetched windows
//! are written back to the store in the background.

use crate::catalogue::CatalogueClient;
use crate::challenge::coalescer::Coalescer;
use crate::challenge::layout::{CatalogueLayout, STORE_TTL};
use crate::challenge::seed::daily_selection;
use crate::challenge::{CacheEntry, ChallengeError, Items, fetch_window};
use crate::store::ChallengeStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type DailyEntry = Option<CacheEntry<Items, String>>;

pub struct DailyCache {
    layout: CatalogueLayout,
    catalogue: Arc<dyn CatalogueClient>,
    store: Option<Arc<dyn ChallengeStore>>,
    coalescer: Coalescer<Items, ChallengeError, DailyEntry, String>,
}

impl DailyCache {
    pub fn new(
        layout: CatalogueLayout,
        catalogue: Arc<dyn CatalogueClient>,
        store: Option<Arc<dyn ChallengeStore>>,
    ) -> Self {
        Self {
            layout,
            catalogue,
            store,
            coalescer: Coalescer::new(None),
        }
    }

    /// Items of the challenge for `date`.
    pub async fn read(&self, date: &str) -> Result<Items, ChallengeError> {
        let key = date.to_owned();
        let committed_key = key.clone();

        self.coalescer
            .run_with(
                key.clone(),
                |entry| {
                    entry
                        .as_ref()
                        .filter(|entry| entry.key == date)
                        .map(|entry| entry.value.clone())
                },
                || self.populate(key),
                move |entry, items| {
                    *entry = Some(CacheEntry::new(items.clone(), committed_key));
                },
            )
            .await
    }

    /// Date and age of the cached challenge, if any.
    pub fn peek(&self) -> Option<(String, Duration)> {
        self.coalescer
            .with_state(|entry| entry.as_ref().map(|e| (e.key.clone(), e.age())))
    }

    fn populate(
        &self,
        date: String,
    ) -> impl Future<Output = Result<Items, ChallengeError>> + Send + use<> {
        let layout = self.layout;
        let catalogue = Arc::clone(&self.catalogue);
        let store = self.store.clone();

        async move {
            if let Some(store) = &store
                && let Some(items) = read_through(store.as_ref(), &date, layout).await
            {
                info!(date = %date, "daily challenge restored from store");
                return Ok(items);
            }

            let selection = daily_selection(&date, layout);
            let items = fetch_window(catalogue.as_ref(), selection, layout).await?;
            info!(
                date = %date,
                page = selection.page,
                offset = selection.offset,
                "daily challenge fetched"
            );

            if let Some(store) = store {
                write_behind(store, date, Arc::clone(&items));
            }
            Ok(items)
        }
    }
}

/// Look `date` up in the store; failures and malformed values count as absent.
async fn read_through(
    store: &dyn ChallengeStore,
    date: &str,
    layout: CatalogueLayout,
) -> Option<Items> {
    match store.get(date).await {
        Ok(Some(items)) if items.len() == layout.window => Some(items.into()),
        Ok(Some(items)) => {
            warn!(
                date,
                stored = items.len(),
                expected = layout.window,
                "ignoring stored challenge of the wrong size"
            );
            None
        }
        Ok(None) => {
            debug!(date, "no stored challenge");
            None
        }
        Err(e) => {
            warn!(date, error = %e, "failed to read stored challenge");
            None
        }
    }
}

fn write_behind(store: Arc<dyn ChallengeStore>, date: String, items: Items) {
    tokio::spawn(async move {
        match store.put(&date, &items, STORE_TTL).await {
            Ok(()) => debug!(date = %date, "daily challenge persisted"),
            Err(e) => warn!(date = %date, error = %e, "failed to persist daily challenge"),
        }
    });
}
