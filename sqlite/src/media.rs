//! Locating cached media files.
//!
//! Downloaded media (avatars, thumbnails, attachments) is cached on disk
//! under a file name derived from its URL. This module only answers where a
//! URL's file lives and whether it is already there; fetching and eviction
//! belong to the application.

use std::path::{Path, PathBuf};

use activerow_core::Model;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Maps media URLs to cache file paths under a root directory.
///
/// # Examples
///
/// ```
/// use activerow_sqlite::MediaCache;
///
/// let cache = MediaCache::new("/tmp/media");
/// let path = cache.cache_location_for_media_url("https://cdn.example.com/a/photo.JPG?size=2");
/// assert!(path.starts_with("/tmp/media"));
/// assert_eq!(path.extension().unwrap(), "JPG");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCache {
    root: PathBuf,
}

impl MediaCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A cache scoped to one model type: `<root>/<table name>`.
    pub fn for_model<M: Model>(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(root.as_ref().join(M::table_name()?)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the file for `url` is (or would be) cached at: the hex SHA-256
    /// of the URL, keeping the extension of the URL's path.
    pub fn cache_location_for_media_url(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        let mut name = format!("{digest:x}");
        if let Some(ext) = url_extension(url) {
            name.push('.');
            name.push_str(ext);
        }
        self.root.join(name)
    }

    /// Returns `true` if the file for `url` exists.
    pub fn media_url_is_cached(&self, url: &str) -> bool {
        self.cache_location_for_media_url(url).is_file()
    }
}

/// Extension of the last path segment of `url`, ignoring query and
/// fragment.
fn url_extension(url: &str) -> Option<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    let path = path.split_once("://").map_or(path, |(_, rest)| {
        rest.find('/').map_or("", |i| &rest[i..])
    });
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= 8
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}
