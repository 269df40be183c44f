// SPDX-License-Identifier: MIT

//! Command-line entry point for the Booqable helper.

use booqable_helper::api::BooqableClient;
use booqable_helper::cache::CacheStore;
use booqable_helper::config::SettingsStore;
use booqable_helper::normalize::{normalize_api_key, normalize_slug};
use booqable_helper::orders::OrdersStore;
use booqable_helper::photos::PhotoStore;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CACHE_PATH_ENV: &str = "BOOQABLE_HELPER_CACHE";
const DEFAULT_CACHE_PATH: &str = "booqable-helper-cache.db";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    let store = SettingsStore::from_env();
    match command {
        "configure" => {
            let (slug, key) = match (args.get(1), args.get(2)) {
                (Some(slug), Some(key)) => (slug, key),
                _ => {
                    eprintln!("usage: booqable-helper configure <company-slug-or-url> <api-key>");
                    std::process::exit(2);
                }
            };
            let slug = normalize_slug(slug);
            let key = normalize_api_key(key);
            let settings = store.update(|settings| {
                settings.tenant_slug = slug.clone();
                settings.api_key = key;
            })?;
            let client = BooqableClient::new(&settings.tenant_slug, &settings.api_key);
            if client.test_connection().await {
                tracing::info!(tenant = %slug, "Settings saved, credentials verified");
            } else {
                tracing::warn!(tenant = %slug, "Settings saved, but a test request failed");
            }
        }
        "refresh" | "refresh-full" => {
            let settings = store.load();
            settings.ensure_configured()?;
            let client = BooqableClient::new(&settings.tenant_slug, &settings.api_key);
            let cache = CacheStore::open(&cache_path()).await?;
            let orders = OrdersStore::new(&client, &cache, &settings.tenant_slug);

            let load = if command == "refresh-full" {
                orders.refresh_full(&settings).await?
            } else {
                orders.refresh_incremental(&settings).await?
            };
            store.update(|settings| settings.orders_checkpoint = load.checkpoint.clone())?;
            tracing::info!(
                orders = load.orders.len(),
                source = ?load.source,
                "Orders refreshed"
            );
        }
        "photos" => {
            let settings = store.load();
            settings.ensure_configured()?;
            let client = BooqableClient::new(&settings.tenant_slug, &settings.api_key);
            let cache = CacheStore::open(&cache_path()).await?;
            let photos = PhotoStore::new(&client, &cache, &settings.tenant_slug);

            let map = photos.build_photo_map(&settings).await?;
            let report = photos.sync_photos(&map).await;
            tracing::info!(
                downloaded = report.downloaded,
                skipped = report.skipped,
                failed = report.failed,
                "Photos synced"
            );
        }
        "clear-cache" => {
            let settings = store.load();
            let cache = CacheStore::open(&cache_path()).await?;
            if !settings.tenant_slug.is_empty() {
                let client = BooqableClient::new(&settings.tenant_slug, &settings.api_key);
                OrdersStore::new(&client, &cache, &settings.tenant_slug)
                    .clear_cached_orders()
                    .await;
                PhotoStore::new(&client, &cache, &settings.tenant_slug)
                    .clear()
                    .await;
            }
            store.update(|settings| settings.orders_checkpoint = Default::default())?;
            tracing::info!("Cache cleared");
        }
        "reset" => {
            let settings = store.load();
            let cache = CacheStore::open(&cache_path()).await?;
            if !settings.tenant_slug.is_empty() {
                let client = BooqableClient::new(&settings.tenant_slug, &settings.api_key);
                OrdersStore::new(&client, &cache, &settings.tenant_slug)
                    .clear_cached_orders()
                    .await;
                PhotoStore::new(&client, &cache, &settings.tenant_slug)
                    .clear()
                    .await;
            }
            store.clear()?;
            tracing::info!("Stored credentials and cache removed");
        }
        _ => {
            eprintln!(
                "usage: booqable-helper <configure|refresh|refresh-full|photos|clear-cache|reset>"
            );
            std::process::exit(2);
        }
    }

    Ok(())
}

fn cache_path() -> PathBuf {
    std::env::var(CACHE_PATH_ENV)
        .unwrap_or_else(|_| DEFAULT_CACHE_PATH.to_string())
        .into()
}

fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("booqable_helper=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
