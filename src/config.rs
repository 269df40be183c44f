// SPDX-License-Identifier: MIT

//! Persistent settings: credentials, scan tuning, and scan checkpoints.
//!
//! Settings live in one JSON blob on disk and are merged over hard-coded
//! defaults on read, so blobs written by older versions keep loading after
//! new fields are added. The struct is passed explicitly into the fetch
//! engine rather than read from a global.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Env var that overrides the settings file location.
const SETTINGS_PATH_VAR: &str = "BOOQABLE_HELPER_SETTINGS";

const DEFAULT_SETTINGS_PATH: &str = "booqable-helper-settings.json";

fn default_page_size() -> u32 {
    50
}

fn default_request_delay_ms() -> u64 {
    500
}

/// All persisted settings, merged over defaults on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Booqable API key, already normalized (see [`crate::normalize`]).
    pub api_key: String,
    /// Tenant subdomain slug, already normalized.
    pub tenant_slug: String,
    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Courtesy delay between successive page requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Checkpoint from the last completed orders scan.
    pub orders_checkpoint: ScanCheckpoint,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            tenant_slug: String::new(),
            page_size: default_page_size(),
            request_delay_ms: default_request_delay_ms(),
            orders_checkpoint: ScanCheckpoint::default(),
        }
    }
}

impl Settings {
    /// Fail fast when credentials are missing, before any network call.
    pub fn ensure_configured(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config(
                "No API key configured. Please complete onboarding first.".to_string(),
            ));
        }
        if self.tenant_slug.trim().is_empty() {
            return Err(AppError::Config(
                "No business slug configured. Please complete onboarding first.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Last-seen record marker from a completed scan, used to bound the next
/// incremental scan.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ScanCheckpoint {
    pub last_seen_record_id: Option<String>,
    pub last_seen_timestamp: Option<DateTime<Utc>>,
}

impl ScanCheckpoint {
    /// Advance to a newer record. The checkpoint is monotonic: a candidate
    /// older than the current timestamp is ignored.
    pub fn advance(&mut self, record_id: &str, timestamp: DateTime<Utc>) {
        if let Some(current) = self.last_seen_timestamp {
            if timestamp <= current {
                return;
            }
        }
        self.last_seen_record_id = Some(record_id.to_string());
        self.last_seen_timestamp = Some(timestamp);
    }

    pub fn is_set(&self) -> bool {
        self.last_seen_record_id.is_some()
    }
}

/// File-backed settings store.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the settings path from the environment (`.env` honored),
    /// falling back to a file in the working directory.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let path = std::env::var(SETTINGS_PATH_VAR)
            .unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, merging the stored blob over defaults. A missing or
    /// unreadable file loads as pure defaults.
    pub fn load(&self) -> Settings {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Corrupt settings file, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    /// Persist the full settings blob.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::Config(format!("Cannot create settings dir: {e}")))?;
            }
        }
        let raw = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Config(format!("Cannot serialize settings: {e}")))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| AppError::Config(format!("Cannot write settings: {e}")))
    }

    /// Load, apply a mutation, and persist. Returns the updated settings.
    pub fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut settings = self.load();
        apply(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }

    /// Remove the stored blob entirely.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Config(format!("Cannot remove settings: {e}"))),
        }
    }
}
