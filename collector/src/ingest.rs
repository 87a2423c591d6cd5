use crate::config::IngestConfig;
use crate::errors::Result;
use crate::model::SensorReading;
use crate::remo::{fetch_latest_temperature, DeviceSession};
use crate::store::{write_reading, StoreConnector, Verification};
use tracing::{error, info, warn};

/// What one successful ingestion cycle wrote
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub reading: SensorReading,
    pub verification: Verification,
}

impl IngestReport {
    pub fn is_verified(&self) -> bool {
        self.verification.check().is_ok()
    }
}

/// Fetch the latest temperature and append it to the store.
///
/// Errors from either step are logged and returned unchanged; nothing is
/// retried. A verification mismatch is only a warning.
pub async fn collect_once<S, C>(
    config: &IngestConfig,
    session: &S,
    connector: &C,
) -> Result<IngestReport>
where
    S: DeviceSession,
    C: StoreConnector,
{
    let reading = fetch_latest_temperature(
        &config.remo.api_key,
        &config.remo.endpoint,
        session,
    )
    .await
    .inspect_err(|e| error!("Failed to fetch temperature: {}", e))?;

    let verification = write_reading(connector, &config.store.table, &reading)
        .await
        .inspect_err(|e| error!("Failed to store reading: {}", e))?;

    if let Err(e) = verification.check() {
        warn!("{}", e);
    }

    info!(
        "Saved reading: {} | {} | {}°C (verified: {} row(s))",
        verification.timestamp, reading.device_name, reading.temperature, verification.observed
    );

    Ok(IngestReport {
        reading,
        verification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RemoConfig, StoreConfig};
    use crate::errors::Error;
    use crate::memory::MemoryConnector;
    use crate::store::TableName;
    use std::time::Duration;

    struct FixedSession(&'static str);

    impl DeviceSession for FixedSession {
        async fn get(&self, _url: &str, _api_key: &str) -> Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    fn config() -> IngestConfig {
        IngestConfig {
            remo: RemoConfig {
                api_key: "key".to_string(),
                endpoint: "https://api.nature.global/1/devices".to_string(),
                request_timeout: Duration::from_secs(10),
            },
            store: StoreConfig {
                database_url: "sqlite::memory:".to_string(),
                auth_token: "token".to_string(),
                table: TableName::new("temperature_logs").unwrap(),
            },
        }
    }

    #[tokio::test]
    async fn test_collect_once_appends_verified_row() {
        let config = config();
        let connector = MemoryConnector::new();
        let session = FixedSession(r#"[{"name": "living", "newest_events": {"te": {"val": 24.5}}}]"#);

        let report = collect_once(&config, &session, &connector).await.unwrap();

        assert!(report.is_verified());
        assert_eq!(report.reading.device_name, "living");
        let rows = connector.rows(&config.store.table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].temperature, 24.5);
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_touches_no_store() {
        let config = config();
        let connector = MemoryConnector::new();
        let session = FixedSession("[]");

        let result = collect_once(&config, &session, &connector).await;

        assert!(matches!(result, Err(Error::DeviceNotFound)));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let config = config();
        let connector = MemoryConnector::new();
        connector.fail_writes(true);
        let session = FixedSession(r#"[{"name": "living", "newest_events": {"te": {"val": 24.5}}}]"#);

        let result = collect_once(&config, &session, &connector).await;

        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_verification_mismatch_is_not_fatal() {
        let config = config();
        let connector = MemoryConnector::new();
        connector.fail_reads(true);
        let session = FixedSession(r#"[{"name": "living", "newest_events": {"te": {"val": 24.5}}}]"#);

        let report = collect_once(&config, &session, &connector).await.unwrap();

        assert!(!report.is_verified());
        assert_eq!(connector.rows(&config.store.table).len(), 1);
    }
}
