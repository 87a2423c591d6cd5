use crate::config::StoreConfig;
use crate::errors::Result;
use crate::model::{SensorReading, TemperatureRecord};
use crate::store::{RowQuery, StoreConnector, TableName, TemperatureStore};
use libsql::{params, Builder, Connection, Row};
use std::fmt;
use tracing::info;

/// URL schemes served by a remote libsql server
pub const REMOTE_SCHEMES: [&str; 3] = ["libsql://", "https://", "http://"];

/// Remote libsql binding, authenticated with the store's auth token.
/// The database lives on the server, so there is nothing to create locally.
#[derive(Clone)]
pub struct RemoteConnector {
    url: String,
    auth_token: String,
}

impl RemoteConnector {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        info!("Using remote store at {}", config.redacted_url());
        Ok(Self {
            url: config.database_url.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

impl fmt::Debug for RemoteConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConnector")
            .field("url", &self.url)
            .field("auth_token", &"***")
            .finish()
    }
}

impl StoreConnector for RemoteConnector {
    type Store = RemoteStore;

    async fn connect(&self) -> Result<RemoteStore> {
        let db = Builder::new_remote(self.url.clone(), self.auth_token.clone())
            .build()
            .await?;
        let conn = db.connect()?;
        Ok(RemoteStore { conn })
    }
}

pub struct RemoteStore {
    conn: Connection,
}

impl RemoteStore {
    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table.as_str()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }
}

fn record_from_row(row: &Row) -> Result<TemperatureRecord> {
    Ok(TemperatureRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        device_name: row.get(2)?,
        temperature: row.get(3)?,
    })
}

impl TemperatureStore for RemoteStore {
    async fn create_table_if_absent(&mut self, table: &TableName) -> Result<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                device_name TEXT NOT NULL,
                temperature REAL NOT NULL
            )
            "#,
            table
        );

        self.conn.execute(&ddl, ()).await?;
        Ok(())
    }

    async fn insert_row(
        &mut self,
        table: &TableName,
        timestamp: &str,
        reading: &SensorReading,
    ) -> Result<()> {
        let insert = format!(
            "INSERT INTO {} (timestamp, device_name, temperature) VALUES (?1, ?2, ?3)",
            table
        );

        let tx = self.conn.transaction().await?;
        tx.execute(
            &insert,
            params![timestamp, reading.device_name.as_str(), reading.temperature],
        )
        .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn query_rows(
        &mut self,
        table: &TableName,
        query: RowQuery,
    ) -> Result<Vec<TemperatureRecord>> {
        if !self.table_exists(table).await? {
            return Ok(Vec::new());
        }

        let mut rows = match query {
            RowQuery::Latest => {
                let select = format!(
                    "SELECT id, timestamp, device_name, temperature FROM {} ORDER BY timestamp DESC, id DESC",
                    table
                );
                self.conn.query(&select, ()).await?
            }
            RowQuery::AtTimestamp(timestamp) => {
                let select = format!(
                    "SELECT id, timestamp, device_name, temperature FROM {} WHERE timestamp = ?1",
                    table
                );
                self.conn.query(&select, params![timestamp]).await?
            }
        };

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }

    async fn close(self) -> Result<()> {
        drop(self.conn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_auth_token() {
        let config = StoreConfig {
            database_url: "libsql://remo.turso.io".to_string(),
            auth_token: "secret-token".to_string(),
            table: TableName::new("temperature_logs").unwrap(),
        };
        let connector = RemoteConnector::new(&config).unwrap();

        let rendered = format!("{:?}", connector);
        assert!(rendered.contains("libsql://remo.turso.io"));
        assert!(!rendered.contains("secret-token"));
    }
}
