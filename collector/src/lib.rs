//! Nature Remo temperature collection: fetch the latest reading from the
//! device API, append it to a SQL time series, and summarize the stored
//! series for dashboards.

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod ingest;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod metrics;
pub mod model;
pub mod remo;
pub mod remote;
pub mod rest;
pub mod series;
pub mod store;

pub use errors::{Error, Result};
