// ── Filesystem image archive ──
//
// Writes each submission image twice: as `latest.jpg` at the root and as a
// timestamped copy under `archive/`. URLs point at the archive copy under a
// configurable prefix.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::future::BoxFuture;
use tokio::fs;
use tracing::debug;

use fieldlink_core::store::archive_file_name;
use fieldlink_core::{ImageError, ImageStore, StoredImage};

/// Smallest payload accepted as an image.
pub const MIN_IMAGE_BYTES: usize = 100;

const LATEST_FILE: &str = "latest.jpg";
const ARCHIVE_DIR: &str = "archive";

// JPEG, PNG, GIF
const SIGNATURES: [&[u8]; 3] = [b"\xff\xd8\xff", b"\x89PNG", b"GIF8"];

/// Reject payloads that are too small or carry no known image signature.
pub fn check_image(data: &[u8]) -> Result<(), ImageError> {
    if data.len() < MIN_IMAGE_BYTES {
        return Err(ImageError::Rejected(format!(
            "image too small ({} bytes, need at least {MIN_IMAGE_BYTES})",
            data.len()
        )));
    }
    if !SIGNATURES.iter().any(|sig| data.starts_with(sig)) {
        return Err(ImageError::Rejected(
            "unrecognized image format (expected JPEG, PNG or GIF)".into(),
        ));
    }
    Ok(())
}

/// [`ImageStore`] backed by a directory.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
    url_prefix: String,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_owned(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    async fn write(
        &self,
        image: Bytes,
        kind: &str,
        at: DateTime<Utc>,
    ) -> Result<StoredImage, ImageError> {
        check_image(&image)?;

        let archive_dir = self.archive_dir();
        fs::create_dir_all(&archive_dir).await?;

        let name = archive_file_name(kind, at);
        fs::write(self.root.join(LATEST_FILE), &image).await?;
        fs::write(archive_dir.join(&name), &image).await?;
        debug!(file = %name, bytes = image.len(), "image archived");

        Ok(StoredImage::at(format!(
            "{}/{ARCHIVE_DIR}/{name}",
            self.url_prefix
        )))
    }

    async fn remove_all(&self) -> Result<usize, ImageError> {
        let mut removed = 0;

        match fs::read_dir(self.archive_dir()).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_type().await?.is_file() {
                        fs::remove_file(entry.path()).await?;
                        removed += 1;
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match fs::remove_file(self.root.join(LATEST_FILE)).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!(removed, root = %self.root.display(), "image archive cleared");
        Ok(removed)
    }
}

impl ImageStore for FsImageStore {
    fn archive<'a>(
        &'a self,
        image: Bytes,
        kind: &'a str,
        at: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<StoredImage, ImageError>> {
        Box::pin(self.write(image, kind, at))
    }

    fn clear(&self) -> BoxFuture<'_, Result<usize, ImageError>> {
        Box::pin(self.remove_all())
    }
}
