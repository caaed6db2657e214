//! HTTP transport for nudge update checks.
//!
//! Fetches configuration documents and app-store lookups, then hands the raw
//! bytes to `nudge-core`. No retries and no response caching.

mod client;
mod error;

pub use client::{
    APP_STORE_LOOKUP_URL, check_app_store, check_remote_configuration, fetch_app_store_lookup,
    fetch_configuration, lookup_url,
};
pub use error::FetchError;
