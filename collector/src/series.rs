use crate::errors::{Error, Result};
use crate::model::TemperatureRecord;
use crate::store::{RowQuery, StoreConnector, TableName, TemperatureStore};
use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Trailing interval selectable on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "all")]
    All,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown window '{0}', expected one of 1h, 6h, 12h, 24h, all")]
pub struct UnknownWindow(String);

impl Window {
    pub const ALL: [Window; 5] = [
        Window::OneHour,
        Window::SixHours,
        Window::TwelveHours,
        Window::Day,
        Window::All,
    ];

    /// `None` for the unbounded window.
    pub fn duration(self) -> Option<TimeDelta> {
        match self {
            Window::OneHour => Some(TimeDelta::hours(1)),
            Window::SixHours => Some(TimeDelta::hours(6)),
            Window::TwelveHours => Some(TimeDelta::hours(12)),
            Window::Day => Some(TimeDelta::hours(24)),
            Window::All => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Window::OneHour => "1h",
            Window::SixHours => "6h",
            Window::TwelveHours => "12h",
            Window::Day => "24h",
            Window::All => "all",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Window {
    type Err = UnknownWindow;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Window::ALL
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownWindow(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Tz>,
    pub device_name: String,
    pub temperature: f64,
}

/// Stored readings in the display timezone, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn from_records(records: Vec<TemperatureRecord>, tz: Tz) -> Result<Self> {
        let mut points = records
            .into_iter()
            .map(|record| {
                let timestamp = DateTime::parse_from_rfc3339(&record.timestamp)
                    .map_err(|e| {
                        Error::Query(format!(
                            "row {} has an invalid timestamp '{}': {}",
                            record.id, record.timestamp, e
                        ))
                    })?
                    .with_timezone(&tz);
                Ok(SeriesPoint {
                    timestamp,
                    device_name: record.device_name,
                    temperature: record.temperature,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(Self { points })
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }

    pub fn earliest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Points with `timestamp >= now - window`, newest first.
    pub fn window(&self, window: Window, now: DateTime<Tz>) -> &[SeriesPoint] {
        match window.duration() {
            Some(duration) => {
                let cutoff = now - duration;
                let end = self.points.partition_point(|p| p.timestamp >= cutoff);
                &self.points[..end]
            }
            None => &self.points,
        }
    }
}

/// Read every stored row and convert it to `tz`.
pub async fn load_series<C: StoreConnector>(
    connector: &C,
    table: &TableName,
    tz: Tz,
) -> Result<TimeSeries> {
    let mut store = connector.connect().await.map_err(query_error)?;
    let rows = store.query_rows(table, RowQuery::Latest).await;
    if let Err(e) = store.close().await {
        warn!("Failed to close store connection: {}", e);
    }

    let rows = rows.map_err(query_error)?;
    debug!("Loaded {} row(s) from {}", rows.len(), table);
    TimeSeries::from_records(rows, tz)
}

fn query_error(err: Error) -> Error {
    match err {
        Error::Query(_) => err,
        other => Error::Query(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub current: f64,
    pub max: f64,
    pub min: f64,
    pub mean: f64,
}

impl Summary {
    pub fn mean_display(&self) -> String {
        format!("{:.1}", self.mean)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WindowSummary {
    Stats(Summary),
    /// Nothing inside the window; only the overall latest value is known.
    EmptyWindow { current: f64 },
}

impl WindowSummary {
    pub fn current(&self) -> f64 {
        match self {
            WindowSummary::Stats(summary) => summary.current,
            WindowSummary::EmptyWindow { current } => *current,
        }
    }
}

/// Summary statistics over `window`. `current` is always the newest reading
/// of the whole series. Returns `None` when the series holds no rows.
pub fn summarize(series: &TimeSeries, window: Window, now: DateTime<Tz>) -> Option<WindowSummary> {
    let current = series.latest()?.temperature;
    let points = series.window(window, now);
    if points.is_empty() {
        return Some(WindowSummary::EmptyWindow { current });
    }

    let temperatures = points.iter().map(|p| p.temperature);
    let max = temperatures.clone().fold(f64::NEG_INFINITY, f64::max);
    let min = temperatures.clone().fold(f64::INFINITY, f64::min);
    let mean = temperatures.sum::<f64>() / points.len() as f64;

    Some(WindowSummary::Stats(Summary {
        current,
        max,
        min,
        mean,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Asia::Tokyo;
    use rand::Rng;

    fn record(id: i64, timestamp: DateTime<Utc>, temperature: f64) -> TemperatureRecord {
        TemperatureRecord {
            id,
            timestamp: timestamp.to_rfc3339(),
            device_name: "living".to_string(),
            temperature,
        }
    }

    fn now() -> DateTime<Tz> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .unwrap()
            .with_timezone(&Tokyo)
    }

    fn series_at(offsets_minutes: &[(i64, f64)]) -> TimeSeries {
        let base = now().with_timezone(&Utc);
        let records = offsets_minutes
            .iter()
            .enumerate()
            .map(|(i, (minutes_ago, temp))| {
                record(i as i64 + 1, base - TimeDelta::minutes(*minutes_ago), *temp)
            })
            .collect();
        TimeSeries::from_records(records, Tokyo).unwrap()
    }

    #[test]
    fn test_window_parse() {
        assert_eq!("1h".parse::<Window>().unwrap(), Window::OneHour);
        assert_eq!("24H".parse::<Window>().unwrap(), Window::Day);
        assert_eq!("all".parse::<Window>().unwrap(), Window::All);
        assert!("2h".parse::<Window>().is_err());
        assert_eq!(Window::default(), Window::All);
    }

    #[test]
    fn test_from_records_normalizes_and_orders() {
        let series = series_at(&[(120, 24.0), (0, 24.2), (60, 23.8)]);

        let temps: Vec<f64> = series.points().iter().map(|p| p.temperature).collect();
        assert_eq!(temps, vec![24.2, 23.8, 24.0]);
        assert_eq!(series.latest().unwrap().timestamp.timezone(), Tokyo);
        assert_eq!(
            series.latest().unwrap().timestamp.format("%H:%M").to_string(),
            "21:00"
        );
    }

    #[test]
    fn test_invalid_timestamp_is_query_error() {
        let records = vec![TemperatureRecord {
            id: 7,
            timestamp: "yesterday".to_string(),
            device_name: "living".to_string(),
            temperature: 20.0,
        }];

        assert!(matches!(
            TimeSeries::from_records(records, Tokyo),
            Err(Error::Query(_))
        ));
    }

    #[test]
    fn test_window_lower_bound_is_inclusive() {
        let series = series_at(&[(0, 24.0), (60, 23.0), (61, 22.0)]);

        let window = series.window(Window::OneHour, now());

        assert_eq!(window.len(), 2);
        assert_eq!(window[1].temperature, 23.0);
    }

    #[test]
    fn test_window_all_keeps_everything() {
        let series = series_at(&[(0, 24.0), (60 * 24 * 30, 10.0)]);

        assert_eq!(series.window(Window::All, now()).len(), 2);
        assert_eq!(series.window(Window::Day, now()).len(), 1);
    }

    #[test]
    fn test_summarize_five_readings() {
        let series = series_at(&[
            (120, 24.0),
            (90, 24.5),
            (60, 23.8),
            (30, 25.1),
            (0, 24.2),
        ]);

        let summary = match summarize(&series, Window::SixHours, now()) {
            Some(WindowSummary::Stats(summary)) => summary,
            other => panic!("expected stats, got {:?}", other),
        };

        assert_eq!(summary.current, 24.2);
        assert_eq!(summary.max, 25.1);
        assert_eq!(summary.min, 23.8);
        assert!((summary.mean - 24.32).abs() < 1e-9);
        assert_eq!(summary.mean_display(), "24.3");
    }

    #[test]
    fn test_current_ignores_window() {
        // Latest reading is two hours old; the hour window holds nothing.
        let series = series_at(&[(120, 26.0), (180, 20.0)]);

        assert_eq!(
            summarize(&series, Window::OneHour, now()),
            Some(WindowSummary::EmptyWindow { current: 26.0 })
        );

        match summarize(&series, Window::All, now()) {
            Some(WindowSummary::Stats(summary)) => {
                assert_eq!(summary.current, 26.0);
                assert_eq!(summary.min, 20.0);
            }
            other => panic!("expected stats, got {:?}", other),
        }
    }

    #[test]
    fn test_summarize_empty_series_is_none() {
        assert_eq!(summarize(&TimeSeries::default(), Window::All, now()), None);
    }

    #[test]
    fn test_summary_bounds_hold_for_random_series() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let count = rng.gen_range(1..40);
            let offsets: Vec<(i64, f64)> = (0..count)
                .map(|_| (rng.gen_range(0..600), rng.gen_range(-10.0..40.0)))
                .collect();
            let series = series_at(&offsets);

            if let Some(WindowSummary::Stats(summary)) = summarize(&series, Window::All, now()) {
                assert!(summary.min <= summary.mean + 1e-9);
                assert!(summary.mean <= summary.max + 1e-9);
                assert_eq!(summary.current, series.latest().unwrap().temperature);
            } else {
                panic!("non-empty series must produce stats");
            }
        }
    }

    #[tokio::test]
    async fn test_load_series_reads_store() {
        let connector = MemoryConnector::new();
        let table = TableName::new("temperature_logs").unwrap();
        connector.seed(&table, "2024-05-01T10:00:00.000000+00:00", "living", 21.0);
        connector.seed(&table, "2024-05-01T11:00:00.000000+00:00", "living", 22.0);

        let series = load_series(&connector, &table, Tokyo).await.unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.latest().unwrap().temperature, 22.0);
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_load_series_empty_store_is_not_an_error() {
        let connector = MemoryConnector::new();
        let table = TableName::new("temperature_logs").unwrap();

        let series = load_series(&connector, &table, Tokyo).await.unwrap();

        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_load_series_failure_is_query_error() {
        let connector = MemoryConnector::new();
        connector.fail_reads(true);
        let table = TableName::new("temperature_logs").unwrap();

        let result = load_series(&connector, &table, Tokyo).await;

        assert!(matches!(result, Err(Error::Query(_))));
        assert_eq!(connector.open_connections(), 0);
    }
}
