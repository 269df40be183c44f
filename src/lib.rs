// SPDX-License-Identifier: MIT

//! Booqable helper: a data-access layer for the Booqable rental API.
//!
//! Wraps the vendor's two API generations behind one paginated fetch
//! engine, resolves compound-document relationships, enriches orders with
//! their lines on demand, and keeps everything in a local SQLite cache so
//! repeat loads and incremental refreshes stay cheap.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod normalize;
pub mod orders;
pub mod photos;

pub use error::{AppError, Result};
