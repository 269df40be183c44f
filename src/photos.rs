// SPDX-License-Identifier: MIT

//! Item photo cache.
//!
//! Builds a map from item id to photo metadata by scanning the items
//! endpoint with sparse fieldsets, then downloads each photo into the blob
//! cache. Photo cache keys are derived from the stable upload path rather
//! than the full URL, because the CDN rotates signed URL parameters on every
//! listing.

use crate::api::{BooqableClient, Dialect, ScanOptions};
use crate::cache::CacheStore;
use crate::config::Settings;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bumped when the map layout changes, so stale cached maps are rebuilt.
const PHOTO_MAP_VERSION: u32 = 1;

/// Items are tiny with sparse fieldsets, so larger pages are fine.
const ITEMS_PAGE_SIZE: u32 = 100;

const PHOTO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoMapEntry {
    pub item_id: String,
    pub item_name: String,
    pub photo_url: String,
    /// Stable cache key derived from the upload path.
    pub photo_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemPhotoMap {
    pub version: u32,
    pub entries: Vec<PhotoMapEntry>,
}

/// Counts from one photo sync pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PhotoSyncReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub fn photo_map_cache_key(tenant_slug: &str) -> String {
    format!("photo-map:{}", tenant_slug.trim().to_lowercase())
}

/// Blob keys carry the tenant slug so one tenant's sync or clear never
/// touches another's photos.
fn photo_blob_cache_key(tenant_slug: &str, photo_key: &str) -> String {
    format!("photo:{}:{photo_key}", tenant_slug.trim().to_lowercase())
}

/// Derive a stable key from a photo URL: the path below `/uploads/` with
/// the size-variant filename dropped. Returns `None` for URLs that do not
/// look like upload URLs.
pub fn extract_photo_key_from_url(url: &str) -> Option<String> {
    let (_, path) = url.split_once("/uploads/")?;
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let (key, _) = path.rsplit_once('/')?;
    if key.is_empty() {
        return None;
    }
    Some(key.to_string())
}

pub struct PhotoStore<'a> {
    client: &'a BooqableClient,
    cache: &'a CacheStore,
    tenant_slug: String,
}

impl<'a> PhotoStore<'a> {
    pub fn new(client: &'a BooqableClient, cache: &'a CacheStore, tenant_slug: &str) -> Self {
        Self {
            client,
            cache,
            tenant_slug: tenant_slug.to_string(),
        }
    }

    /// Scan the items endpoint and build the photo map. Items without a
    /// photo URL, or with an unrecognized one, are left out.
    pub async fn build_photo_map(&self, settings: &Settings) -> Result<ItemPhotoMap> {
        let opts = ScanOptions {
            page_size: ITEMS_PAGE_SIZE,
            dialect: Dialect::Structured,
            extra_query: vec![("fields[items]".to_string(), "id,name,photo_url".to_string())],
            ..ScanOptions::from_settings(settings)
        };
        let outcome = self.client.get_all_paginated("items", opts).await?;

        let entries: Vec<PhotoMapEntry> = outcome
            .records
            .iter()
            .filter_map(|item| {
                let photo_url = item.str_field("photo_url")?;
                let photo_key = extract_photo_key_from_url(photo_url)?;
                Some(PhotoMapEntry {
                    item_id: item.id.clone(),
                    item_name: item.str_field("name").unwrap_or_default().to_string(),
                    photo_url: photo_url.to_string(),
                    photo_key,
                })
            })
            .collect();

        tracing::info!(
            items = outcome.records.len(),
            with_photos = entries.len(),
            "Built item photo map"
        );
        let map = ItemPhotoMap {
            version: PHOTO_MAP_VERSION,
            entries,
        };
        self.cache
            .set(&photo_map_cache_key(&self.tenant_slug), &self.tenant_slug, &map)
            .await;
        Ok(map)
    }

    /// The cached photo map, if a current-version one exists.
    pub async fn cached_photo_map(&self) -> Option<ItemPhotoMap> {
        let entry = self
            .cache
            .get::<ItemPhotoMap>(&photo_map_cache_key(&self.tenant_slug))
            .await?;
        (entry.value.version == PHOTO_MAP_VERSION).then_some(entry.value)
    }

    /// Download every photo in the map into the blob cache. Already-cached
    /// photos are skipped and download failures are logged per photo.
    pub async fn sync_photos(&self, map: &ItemPhotoMap) -> PhotoSyncReport {
        let mut report = PhotoSyncReport::default();
        for entry in &map.entries {
            let key = photo_blob_cache_key(&self.tenant_slug, &entry.photo_key);
            if self.cache.contains(&key).await {
                report.skipped += 1;
                continue;
            }
            match self.client.fetch_blob(&entry.photo_url, PHOTO_TIMEOUT).await {
                Ok(bytes) => {
                    self.cache.set_blob(&key, &self.tenant_slug, &bytes).await;
                    report.downloaded += 1;
                }
                Err(e) => {
                    tracing::warn!(item_id = %entry.item_id, error = %e, "Photo download failed");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            "Photo sync complete"
        );
        report
    }

    /// A cached photo blob by its stable key.
    pub async fn cached_photo(&self, photo_key: &str) -> Option<Vec<u8>> {
        self.cache
            .get_blob(&photo_blob_cache_key(&self.tenant_slug, photo_key))
            .await
            .map(|entry| entry.value)
    }

    /// Drop this tenant's cached photo blobs, then the map itself.
    pub async fn clear(&self) {
        self.cache
            .delete_prefix(&photo_blob_cache_key(&self.tenant_slug, ""))
            .await;
        self.cache
            .delete(&photo_map_cache_key(&self.tenant_slug))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_keys_are_tenant_qualified() {
        assert_eq!(photo_blob_cache_key(" Acme ", "aa/photo"), "photo:acme:aa/photo");
        assert_eq!(photo_blob_cache_key("beta", "aa/photo"), "photo:beta:aa/photo");
    }

    #[test]
    fn photo_key_drops_the_variant_filename() {
        let url = "https://cdn.example.com/uploads/ab12/photo/large_chair.jpg";
        assert_eq!(extract_photo_key_from_url(url).as_deref(), Some("ab12/photo"));
    }

    #[test]
    fn photo_key_ignores_query_parameters() {
        let url = "https://cdn.example.com/uploads/ab12/photo/thumb.jpg?sig=abc&exp=123";
        assert_eq!(extract_photo_key_from_url(url).as_deref(), Some("ab12/photo"));
    }

    #[test]
    fn non_upload_urls_have_no_key() {
        assert_eq!(extract_photo_key_from_url("https://example.com/logo.png"), None);
        assert_eq!(extract_photo_key_from_url("https://example.com/uploads/bare.jpg"), None);
        assert_eq!(extract_photo_key_from_url(""), None);
    }
}
