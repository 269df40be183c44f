// SPDX-License-Identifier: MIT

//! The orders store: cache-first reads, full scans and checkpointed
//! incremental refreshes over the paginated engine, with relationship
//! resolution and selective enrichment applied to freshly fetched data.

use crate::api::{
    enrich_missing_lines, merge_included, BooqableClient, Dialect, EnrichWindow, Record,
    ScanOptions,
};
use crate::cache::{orders_cache_key, CacheStore};
use crate::config::{ScanCheckpoint, Settings};
use crate::error::Result;
use std::collections::HashSet;

/// How a load was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Cache,
    FullScan,
    IncrementalScan,
}

/// Orders plus where they came from.
#[derive(Debug)]
pub struct OrdersLoad {
    pub orders: Vec<Record>,
    pub source: LoadSource,
    /// Checkpoint after this load. The caller persists it.
    pub checkpoint: ScanCheckpoint,
}

pub struct OrdersStore<'a> {
    client: &'a BooqableClient,
    cache: &'a CacheStore,
    tenant_slug: String,
}

impl<'a> OrdersStore<'a> {
    pub fn new(client: &'a BooqableClient, cache: &'a CacheStore, tenant_slug: &str) -> Self {
        Self {
            client,
            cache,
            tenant_slug: tenant_slug.to_string(),
        }
    }

    /// Load orders, serving from the cache when an entry for this tenant
    /// exists and falling back to a full scan otherwise.
    pub async fn load(&self, settings: &Settings) -> Result<OrdersLoad> {
        if let Some(cached) = self.cached_orders().await {
            tracing::info!(orders = cached.len(), "Serving orders from cache");
            return Ok(OrdersLoad {
                orders: cached,
                source: LoadSource::Cache,
                checkpoint: settings.orders_checkpoint.clone(),
            });
        }
        self.refresh_full(settings).await
    }

    /// Scan every order from page 1, ignoring any cached data, then write
    /// the result back to the cache with a fresh checkpoint.
    pub async fn refresh_full(&self, settings: &Settings) -> Result<OrdersLoad> {
        let opts = ScanOptions {
            dialect: Dialect::Structured,
            extra_query: vec![("include".to_string(), "lines,customer".to_string())],
            ..ScanOptions::from_settings(settings)
        };

        let outcome = self.client.get_all_paginated("orders", opts).await?;
        let mut orders = outcome.records;
        merge_included(&mut orders, &outcome.included);
        enrich_missing_lines(self.client, &mut orders, EnrichWindow::resolve(None, None), None)
            .await;

        let checkpoint = checkpoint_from(&orders);
        self.store_orders(&orders).await;
        Ok(OrdersLoad {
            orders,
            source: LoadSource::FullScan,
            checkpoint,
        })
    }

    /// Fetch only orders newer than the checkpoint and merge them over the
    /// cached list. Without a usable cache entry or checkpoint this degrades
    /// to a full scan.
    pub async fn refresh_incremental(&self, settings: &Settings) -> Result<OrdersLoad> {
        let checkpoint = &settings.orders_checkpoint;
        let (Some(cached), true) = (self.cached_orders().await, checkpoint.is_set()) else {
            tracing::info!("No cache entry or checkpoint, running a full scan");
            return self.refresh_full(settings).await;
        };

        let boundary_id = checkpoint
            .last_seen_record_id
            .clone()
            .unwrap_or_default();
        let opts = ScanOptions {
            dialect: Dialect::Structured,
            extra_query: vec![
                ("include".to_string(), "lines,customer".to_string()),
                ("sort".to_string(), "-created_at".to_string()),
            ],
            stop_when: Some(Box::new(move |record: &Record| record.id == boundary_id)),
            ..ScanOptions::from_settings(settings)
        };

        let outcome = self.client.get_all_paginated("orders", opts).await?;
        let mut fresh = outcome.records;
        merge_included(&mut fresh, &outcome.included);
        enrich_missing_lines(self.client, &mut fresh, EnrichWindow::resolve(None, None), None)
            .await;
        tracing::info!(
            fresh = fresh.len(),
            stopped_early = outcome.stopped_early,
            "Incremental scan done, merging over cached orders"
        );

        let orders = merge_records_by_id(cached, fresh);
        let mut checkpoint = checkpoint.clone();
        let newest = checkpoint_from(&orders);
        if let (Some(id), Some(at)) = (newest.last_seen_record_id.as_deref(), newest.last_seen_timestamp) {
            checkpoint.advance(id, at);
        }
        self.store_orders(&orders).await;
        Ok(OrdersLoad {
            orders,
            source: LoadSource::IncrementalScan,
            checkpoint,
        })
    }

    /// Cached orders for this tenant, or `None` when the entry is missing
    /// or belongs to another tenant.
    pub async fn cached_orders(&self) -> Option<Vec<Record>> {
        let key = orders_cache_key(&self.tenant_slug);
        let entry = self.cache.get::<Vec<Record>>(&key).await?;
        if entry.tenant_slug != self.tenant_slug {
            tracing::warn!(
                cached_tenant = %entry.tenant_slug,
                tenant = %self.tenant_slug,
                "Cached orders belong to another tenant, ignoring"
            );
            return None;
        }
        Some(entry.value)
    }

    async fn store_orders(&self, orders: &[Record]) {
        let key = orders_cache_key(&self.tenant_slug);
        self.cache.set(&key, &self.tenant_slug, &orders).await;
    }

    /// Drop this tenant's cached orders.
    pub async fn clear_cached_orders(&self) {
        self.cache.delete(&orders_cache_key(&self.tenant_slug)).await;
    }
}

/// Merge a fresh batch over the cached list. Fresh records win on id
/// collisions and sort first, matching the newest-first server order the
/// incremental scan fetches in.
fn merge_records_by_id(cached: Vec<Record>, fresh: Vec<Record>) -> Vec<Record> {
    let fresh_ids: HashSet<String> = fresh.iter().map(|r| r.id.clone()).collect();
    let mut merged = fresh;
    merged.extend(cached.into_iter().filter(|r| !fresh_ids.contains(&r.id)));
    merged
}

/// Checkpoint pointing at the newest record in the list by `created_at`.
fn checkpoint_from(orders: &[Record]) -> ScanCheckpoint {
    let newest = orders
        .iter()
        .filter_map(|r| r.timestamp("created_at").map(|at| (r, at)))
        .max_by_key(|(_, at)| *at);

    let mut checkpoint = ScanCheckpoint::default();
    if let Some((record, at)) = newest {
        checkpoint.advance(&record.id, at);
    }
    checkpoint
}
