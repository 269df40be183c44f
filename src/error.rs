// SPDX-License-Identifier: MIT

//! Application error types.
//!
//! The taxonomy mirrors how failures are handled:
//! - `Config` is detectable before any network call and surfaced verbatim.
//! - `Api` carries the HTTP status plus the retry-after duration when the
//!   vendor rate-limits us; only 429 is auto-recovered by the fetch engine.
//! - `UnexpectedShape` and `PaginationStall` are contract violations and are
//!   never retried automatically.

use std::time::Duration;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    Config(String),

    #[error("Booqable API error: HTTP {status}: {body}")]
    Api {
        status: u16,
        body: String,
        /// Parsed `Retry-After` header, present on 429 responses.
        retry_after: Option<Duration>,
    },

    #[error("Unexpected response shape for `{resource}`: expected a `data` array or a `{resource}` key, found keys [{found}]")]
    UnexpectedShape { resource: String, found: String },

    #[error("Pagination is not advancing for `{resource}`: page {page} returned no new records")]
    PaginationStall { resource: String, page: u32 },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
