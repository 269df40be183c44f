// SPDX-License-Identifier: MIT

//! Vendor API access: HTTP client, page parsing, the paginated fetch
//! engine, relationship resolution and per-order enrichment.

pub mod client;
pub mod enrich;
pub mod merge;
pub mod paginate;
pub mod resource;

pub use client::{BooqableClient, Dialect};
pub use enrich::{enrich_missing_lines, EnrichProgressFn, EnrichWindow};
pub use merge::merge_included;
pub use paginate::{ScanOptions, ScanOutcome};
pub use resource::{PageShape, Record, ResourcePage};
