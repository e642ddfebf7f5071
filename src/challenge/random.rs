//! Short-lived random challenge for visitors who already played today.

use crate::catalogue::CatalogueClient;
use crate::challenge::coalescer::Coalescer;
use crate::challenge::layout::{CatalogueLayout, RANDOM_TTL, Selection};
use crate::challenge::{CacheEntry, ChallengeError, Items, fetch_window};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct RandomCache {
    layout: CatalogueLayout,
    ttl: Duration,
    catalogue: Arc<dyn CatalogueClient>,
    coalescer: Coalescer<Items, ChallengeError, Option<CacheEntry<Items>>>,
}

impl RandomCache {
    pub fn new(layout: CatalogueLayout, catalogue: Arc<dyn CatalogueClient>) -> Self {
        Self::with_ttl(layout, catalogue, RANDOM_TTL)
    }

    pub fn with_ttl(
        layout: CatalogueLayout,
        catalogue: Arc<dyn CatalogueClient>,
        ttl: Duration,
    ) -> Self {
        Self {
            layout,
            ttl,
            catalogue,
            coalescer: Coalescer::new(None),
        }
    }

    /// Items of the current random page, re-rolled once older than the TTL.
    pub async fn read(&self) -> Result<Items, ChallengeError> {
        let ttl = self.ttl;
        let layout = self.layout;

        self.coalescer
            .run_with(
                (),
                |entry| {
                    entry
                        .as_ref()
                        .filter(|entry| entry.age() <= ttl)
                        .map(|entry| entry.value.clone())
                },
                || {
                    let selection = random_selection(&mut rand::rng(), layout);
                    let catalogue = Arc::clone(&self.catalogue);
                    debug!(
                        page = selection.page,
                        offset = selection.offset,
                        "re-rolling random challenge"
                    );
                    async move { fetch_window(catalogue.as_ref(), selection, layout).await }
                },
                |entry, items| *entry = Some(CacheEntry::new(items.clone(), ())),
            )
            .await
    }

    /// Age of the cached random window, if any.
    pub fn peek(&self) -> Option<Duration> {
        self.coalescer
            .with_state(|entry| entry.as_ref().map(CacheEntry::age))
    }
}

/// Uniform pick over `[0, max_page]` and `[0, page_size - window]`.
pub fn random_selection(rng: &mut impl Rng, layout: CatalogueLayout) -> Selection {
    Selection {
        page: rng.random_range(0..=layout.max_page),
        offset: rng.random_range(0..=layout.max_offset()),
    }
}
