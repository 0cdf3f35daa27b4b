//! EOL exporter. Republishes end-of-life data of installed software as
//! Prometheus gauges.
//!
//! Discovery providers report which (product, version) pairs are present
//! on the host. For each one the scheduler keeps an independent refresh
//! task that looks the release cycle up on endoflife.date, normalizes the
//! record and writes it into an owned [`metrics::MetricSchema`], which the
//! HTTP layer serves at `/metrics`.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod providers;
pub mod scheduler;
pub mod server;

pub use error::{Error, Result};
