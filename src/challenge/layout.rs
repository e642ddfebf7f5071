//! Catalogue geometry and cache lifetimes.

use std::time::Duration;

/// Upper bound of catalogue pages assumed to exist (there are ~250 at the
/// time of writing; staying well below avoids landing past the end).
pub const MAX_PAGE: u32 = 100;
/// Products per upstream page.
pub const PAGE_SIZE: usize = 24;
/// Items shown per challenge.
pub const WINDOW: usize = 5;
/// How long a random page is reused before re-rolling.
pub const RANDOM_TTL: Duration = Duration::from_secs(15);
/// Lifetime of a daily challenge in the durable store.
pub const STORE_TTL: Duration = Duration::from_secs(48 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("catalogue must have at least one page")]
    NoPages,
    #[error("window must hold at least one item")]
    EmptyWindow,
    #[error("window of {window} items exceeds the page size of {page_size}")]
    WindowExceedsPage { window: usize, page_size: usize },
}

/// Shape of the upstream catalogue as seen by the selection logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogueLayout {
    pub max_page: u32,
    pub page_size: usize,
    pub window: usize,
}

impl Default for CatalogueLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CatalogueLayout {
    pub const DEFAULT: Self = Self {
        max_page: MAX_PAGE,
        page_size: PAGE_SIZE,
        window: WINDOW,
    };

    /// Reject layouts where a window cannot fit inside a page.
    pub fn validate(self) -> Result<Self, LayoutError> {
        if self.max_page == 0 {
            return Err(LayoutError::NoPages);
        }
        if self.window == 0 {
            return Err(LayoutError::EmptyWindow);
        }
        if self.window > self.page_size {
            return Err(LayoutError::WindowExceedsPage {
                window: self.window,
                page_size: self.page_size,
            });
        }
        Ok(self)
    }

    /// Largest offset at which a full window still fits in a page.
    pub fn max_offset(self) -> usize {
        self.page_size - self.window
    }
}

/// A catalogue page and the first item of the window within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub page: u32,
    pub offset: usize,
}
