//! Selection and caching of challenge windows.
//!
//! Two singleflight caches sit in front of one catalogue client: the daily
//! cache (same items for everyone, per calendar day) and the random cache
//! (re-rolled every few seconds for players who finished today's challenge).

pub mod coalescer;
pub mod daily;
pub mod errors;
pub mod layout;
pub mod random;
pub mod router;
pub mod seed;

use crate::catalogue::{CatalogueClient, Item, UpstreamError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

pub use coalescer::Coalescer;
pub use daily::DailyCache;
pub use errors::ChallengeError;
pub use layout::{CatalogueLayout, LayoutError, Selection};
pub use random::RandomCache;
pub use router::{Challenge, ChallengeService, Mode};

/// One challenge window, shared between the cache and every reader.
pub type Items = Arc<[Item]>;

/// A cached value with the key it was computed for.
#[derive(Debug, Clone)]
pub struct CacheEntry<T, K = ()> {
    pub value: T,
    pub computed_at: Instant,
    pub key: K,
}

impl<T, K> CacheEntry<T, K> {
    pub fn new(value: T, key: K) -> Self {
        Self {
            value,
            computed_at: Instant::now(),
            key,
        }
    }

    pub fn age(&self) -> Duration {
        self.computed_at.elapsed()
    }
}

/// Fetch the window at `selection`, insisting on exactly one full window.
pub(crate) async fn fetch_window(
    catalogue: &dyn CatalogueClient,
    selection: Selection,
    layout: CatalogueLayout,
) -> Result<Items, ChallengeError> {
    let items = catalogue
        .fetch(selection.page, selection.offset)
        .await
        .inspect_err(|e| {
            warn!(
                page = selection.page,
                offset = selection.offset,
                error = %e,
                "catalogue fetch failed"
            );
        })?;

    if items.len() != layout.window {
        warn!(
            page = selection.page,
            received = items.len(),
            expected = layout.window,
            "catalogue returned a partial window"
        );
        return Err(UpstreamError::ShortPage {
            page: selection.page,
            available: selection.offset + items.len(),
            needed: selection.offset + layout.window,
        }
        .into());
    }

    Ok(items.into())
}
