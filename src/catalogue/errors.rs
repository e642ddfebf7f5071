//! Error types for the catalogue client.

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Catalogue request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Catalogue responded with status {status}")]
    BadStatus { status: u16, body: String },
    #[error("Failed to parse catalogue response")]
    ParseFailed {
        page: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("Catalogue response has no productsByCategory field")]
    MissingCatalogue,
    #[error("Catalogue page {page} holds {available} products, window needs {needed}")]
    ShortPage {
        page: u32,
        available: usize,
        needed: usize,
    },
}
