use std::future::ready;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::future::BoxFuture;
use serde::Serialize;

use super::ImageStore;
use crate::error::ImageError;

/// Where an archived image can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub url: String,
    pub thumb_url: String,
}

impl StoredImage {
    /// An image served at `url` with no separate thumbnail.
    pub fn at(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            thumb_url: url.clone(),
            url,
        }
    }
}

/// Archive file name for an image of `kind` captured at `at`.
pub fn archive_file_name(kind: &str, at: DateTime<Utc>) -> String {
    let safe: String = kind
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{safe}_{}.jpg", at.format("%Y%m%d_%H%M%S_%6f"))
}

/// [`ImageStore`] that keeps nothing but hands out archive-style URLs.
///
/// Only rejects empty payloads.
#[derive(Debug)]
pub struct MemoryImageStore {
    url_prefix: String,
    archived: AtomicUsize,
}

impl MemoryImageStore {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into().trim_end_matches('/').to_owned(),
            archived: AtomicUsize::new(0),
        }
    }

    pub fn archived(&self) -> usize {
        self.archived.load(Ordering::Relaxed)
    }
}

impl Default for MemoryImageStore {
    fn default() -> Self {
        Self::new("/static/targets")
    }
}

impl ImageStore for MemoryImageStore {
    fn archive<'a>(
        &'a self,
        image: Bytes,
        kind: &'a str,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<StoredImage, ImageError>> {
        let result = if image.is_empty() {
            Err(ImageError::Rejected("image data is empty".into()))
        } else {
            self.archived.fetch_add(1, Ordering::Relaxed);
            Ok(StoredImage::at(format!(
                "{}/archive/{}",
                self.url_prefix,
                archive_file_name(kind, at)
            )))
        };
        Box::pin(ready(result))
    }

    fn clear(&self) -> BoxFuture<'_, Result<usize, ImageError>> {
        Box::pin(ready(Ok(self.archived.swap(0, Ordering::Relaxed))))
    }
}
