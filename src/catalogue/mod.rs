//! Upstream grocery catalogue: the item model and the client seam.

pub mod errors;
pub mod images;
pub mod json;
pub mod tesco;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub use errors::UpstreamError;
pub use tesco::{TescoClient, TescoOptions};

/// A catalogue product as shown to players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Item {
    pub title: String,
    pub price: f64,
    pub image_url_small: String,
    pub image_url_large: String,
}

/// One page of the paginated upstream catalogue, narrowed to a window.
#[async_trait]
pub trait CatalogueClient: Send + Sync {
    /// Fetch catalogue `page` and return the window of items starting at
    /// `offset`. Performs exactly one upstream call.
    async fn fetch(&self, page: u32, offset: usize) -> Result<Vec<Item>, UpstreamError>;
}
