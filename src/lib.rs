pub mod beautify;
pub mod browser;
pub mod cache;

use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;
use crate::browser::{BrowserError, PageRenderer};
use crate::cache::{CacheError, SnapshotCache};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Render failed: {0}")]
    RenderError(#[from] BrowserError),
    #[error("Storage failed: {0}")]
    StorageError(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Renders `url` and stores the result, returning the artifact path.
///
/// Nothing is written when rendering fails.
pub fn fetch_page_source(renderer: &impl PageRenderer, cache: &SnapshotCache, url: &str) -> Result<PathBuf> {

    let html = renderer.render(url)?;
    debug!(url, bytes = html.len(), "storing rendered page");

    Ok(cache.store(url, &html)?)
}
