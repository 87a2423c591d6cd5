//! Query surface consumed by chart renderers.
//!
//! A query always yields one of three distinguishable states: the store holds
//! no rows yet, the store could not be read, or a snapshot of the series.

use crate::cache::SeriesCache;
use crate::errors::Result;
use crate::metrics::{QUERIES_TOTAL, QUERY_LATENCY_SECONDS};
use crate::series::{load_series, summarize, TimeSeries, Window, WindowSummary};
use crate::store::{StoreConnector, TableName};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timestamp: DateTime<Tz>,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub device_name: String,
    pub last_updated: DateTime<Tz>,
    pub window: Window,
    /// Points inside the window, oldest first
    pub series: Vec<ChartPoint>,
    pub summary: WindowSummary,
    /// Window mean rounded for display, absent when the window is empty
    pub mean_display: Option<String>,
    pub record_count: usize,
    pub earliest_timestamp: DateTime<Tz>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardState {
    /// Store reachable, zero rows collected so far
    NoData,
    Ready(DashboardSnapshot),
    Unavailable { reason: String },
}

pub fn snapshot(series: &TimeSeries, window: Window, now: DateTime<Tz>) -> DashboardState {
    let (Some(latest), Some(earliest), Some(summary)) = (
        series.latest(),
        series.earliest(),
        summarize(series, window, now),
    ) else {
        return DashboardState::NoData;
    };

    let points = series
        .window(window, now)
        .iter()
        .rev()
        .map(|p| ChartPoint {
            timestamp: p.timestamp,
            temperature: p.temperature,
        })
        .collect();

    DashboardState::Ready(DashboardSnapshot {
        device_name: latest.device_name.clone(),
        last_updated: latest.timestamp,
        window,
        series: points,
        summary,
        mean_display: match summary {
            WindowSummary::Stats(stats) => Some(stats.mean_display()),
            WindowSummary::EmptyWindow { .. } => None,
        },
        record_count: series.len(),
        earliest_timestamp: earliest.timestamp,
    })
}

pub fn dashboard_state(
    loaded: Result<Arc<TimeSeries>>,
    window: Window,
    now: DateTime<Tz>,
) -> DashboardState {
    match loaded {
        Ok(series) => snapshot(&series, window, now),
        Err(e) => {
            warn!("Temperature data unavailable: {}", e);
            DashboardState::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}

/// Answer one dashboard render: load (or reuse) the series and summarize it.
pub async fn query_dashboard<C: StoreConnector>(
    connector: &C,
    cache: &SeriesCache,
    table: &TableName,
    tz: Tz,
    window: Window,
) -> DashboardState {
    let started = Instant::now();
    QUERIES_TOTAL.inc();

    let loaded = cache
        .get_or_load(table, || load_series(connector, table, tz))
        .await;
    let state = dashboard_state(loaded, window, Utc::now().with_timezone(&tz));

    QUERY_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());
    state
}
