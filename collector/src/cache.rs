use crate::errors::Result;
use crate::metrics::{CACHE_HITS_TOTAL, SERIES_LOADS_TOTAL, SERIES_LOAD_FAILURES_TOTAL};
use crate::series::TimeSeries;
use crate::store::TableName;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

struct CachedSeries {
    loaded_at: Instant,
    series: Arc<TimeSeries>,
}

/// Time-bounded cache of loaded series, keyed by table.
///
/// Entries older than the TTL are never served: once expired, a failing load
/// surfaces its error instead of falling back to the old series.
pub struct SeriesCache {
    ttl: Duration,
    entries: Mutex<HashMap<TableName, CachedSeries>>,
}

impl SeriesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<TableName, CachedSeries>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn clear(&self) {
        self.entries().clear();
        debug!("Series cache cleared");
    }

    pub fn get_fresh(&self, table: &TableName) -> Option<Arc<TimeSeries>> {
        let mut entries = self.entries();
        match entries.get(table) {
            Some(entry) if entry.loaded_at.elapsed() < self.ttl => Some(Arc::clone(&entry.series)),
            Some(_) => {
                entries.remove(table);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, table: &TableName, series: TimeSeries) -> Arc<TimeSeries> {
        let series = Arc::new(series);
        self.entries().insert(
            table.clone(),
            CachedSeries {
                loaded_at: Instant::now(),
                series: Arc::clone(&series),
            },
        );
        series
    }

    /// Serve a fresh entry or run `load` and remember its result.
    pub async fn get_or_load<F, Fut>(&self, table: &TableName, load: F) -> Result<Arc<TimeSeries>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TimeSeries>>,
    {
        if let Some(series) = self.get_fresh(table) {
            CACHE_HITS_TOTAL.inc();
            return Ok(series);
        }

        SERIES_LOADS_TOTAL.inc();
        match load().await {
            Ok(series) => Ok(self.insert(table, series)),
            Err(e) => {
                SERIES_LOAD_FAILURES_TOTAL.inc();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table() -> TableName {
        TableName::new("temperature_logs").unwrap()
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_loader() {
        let cache = SeriesCache::new(Duration::from_secs(60));
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            cache
                .get_or_load(&table(), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(TimeSeries::default())
                })
                .await
                .unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_reload() {
        let cache = SeriesCache::new(Duration::from_secs(60));
        let loads = AtomicUsize::new(0);
        let load = || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(TimeSeries::default())
        };

        cache.get_or_load(&table(), load).await.unwrap();
        cache.clear();
        cache.get_or_load(&table(), load).await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_served_on_failure() {
        let cache = SeriesCache::new(Duration::ZERO);

        cache
            .get_or_load(&table(), || async { Ok(TimeSeries::default()) })
            .await
            .unwrap();
        let result = cache
            .get_or_load(&table(), || async {
                Err(Error::Query("store unreachable".to_string()))
            })
            .await;

        assert!(matches!(result, Err(Error::Query(_))));
        assert!(cache.get_fresh(&table()).is_none());
    }
}
