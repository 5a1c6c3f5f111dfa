use std::time::Duration;

pub mod geo;
pub mod htan;
pub mod tenx;

pub use geo::{GeoFetcher, GeoSettings};
pub use htan::HtanFetcher;
pub use tenx::TenxFetcher;

/// Pause after an unsuccessful catalog endpoint before trying the next one.
pub const CATALOG_REQUEST_DELAY: Duration = Duration::from_secs(1);
