use crate::config::StoreConfig;
use crate::errors::{Error, Result};
use crate::model::{SensorReading, TemperatureRecord};
use crate::remote::{RemoteConnector, RemoteStore, REMOTE_SCHEMES};
use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// SQL identifier for the temperature table. Table names cannot be bound as
/// query parameters, so they are restricted to `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };

        if !valid {
            return Err(Error::Configuration(format!(
                "invalid table name '{}'",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row selection supported by `TemperatureStore::query_rows`
#[derive(Debug, Clone, PartialEq)]
pub enum RowQuery {
    /// Every row, newest timestamp first
    Latest,
    /// Rows written at exactly this timestamp
    AtTimestamp(String),
}

/// The store capability used by both the ingestion and the query path.
/// A missing table reads as zero rows.
#[allow(async_fn_in_trait)]
pub trait TemperatureStore {
    async fn create_table_if_absent(&mut self, table: &TableName) -> Result<()>;

    async fn insert_row(
        &mut self,
        table: &TableName,
        timestamp: &str,
        reading: &SensorReading,
    ) -> Result<()>;

    async fn query_rows(
        &mut self,
        table: &TableName,
        query: RowQuery,
    ) -> Result<Vec<TemperatureRecord>>;

    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Opens a fresh store handle for each operation.
#[allow(async_fn_in_trait)]
pub trait StoreConnector {
    type Store: TemperatureStore;

    async fn connect(&self) -> Result<Self::Store>;
}

/// Outcome of the read-back that follows every insert
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub timestamp: String,
    pub observed: usize,
}

impl Verification {
    pub const EXPECTED: usize = 1;

    pub fn check(&self) -> Result<()> {
        if self.observed == Self::EXPECTED {
            Ok(())
        } else {
            Err(Error::VerificationMismatch {
                timestamp: self.timestamp.clone(),
                expected: Self::EXPECTED,
                observed: self.observed,
            })
        }
    }
}

/// Current instant as ISO-8601 UTC, e.g. `2024-05-01T10:00:00.123456+00:00`.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub async fn ensure_table(store: &mut impl TemperatureStore, table: &TableName) -> Result<()> {
    store.create_table_if_absent(table).await?;
    debug!("Table {} ready", table);
    Ok(())
}

/// Insert one reading stamped with the current UTC time, then count the rows
/// carrying that timestamp. A failed read-back is reported as zero rows.
pub async fn append_record(
    store: &mut impl TemperatureStore,
    table: &TableName,
    reading: &SensorReading,
) -> Result<Verification> {
    let timestamp = utc_timestamp();
    store.insert_row(table, &timestamp, reading).await?;

    let observed = match store
        .query_rows(table, RowQuery::AtTimestamp(timestamp.clone()))
        .await
    {
        Ok(rows) => rows.len(),
        Err(e) => {
            warn!("Verification read failed for {}: {}", timestamp, e);
            0
        }
    };

    debug!("Verification for {}: {} row(s)", timestamp, observed);
    Ok(Verification {
        timestamp,
        observed,
    })
}

/// One ensure + append + verify cycle on a connection that is closed before
/// returning, whether or not the cycle succeeded.
pub async fn write_reading<C: StoreConnector>(
    connector: &C,
    table: &TableName,
    reading: &SensorReading,
) -> Result<Verification> {
    let mut store = connector.connect().await?;

    let result = match ensure_table(&mut store, table).await {
        Ok(()) => append_record(&mut store, table, reading).await,
        Err(e) => Err(e),
    };

    if let Err(e) = store.close().await {
        warn!("Failed to close store connection: {}", e);
    }

    result
}

/// How a connector may touch the database. Only ingestion creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

/// SQLite binding over `sqlx`
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    options: SqliteConnectOptions,
}

impl SqliteConnector {
    pub fn new(config: &StoreConfig, mode: AccessMode) -> Result<Self> {
        if !config.database_url.starts_with("sqlite:") {
            return Err(Error::Configuration(format!(
                "unsupported database URL scheme for {}, expected sqlite:",
                config.redacted_url()
            )));
        }

        let options = SqliteConnectOptions::from_str(&config.database_url).map_err(|e| {
            Error::Configuration(format!("unsupported database URL: {}", e))
        })?;
        let options = match mode {
            AccessMode::ReadWrite => options.create_if_missing(true),
            AccessMode::ReadOnly => options.create_if_missing(false).read_only(true),
        };

        info!("Using store at {} ({:?})", config.redacted_url(), mode);
        Ok(Self { options })
    }
}

impl StoreConnector for SqliteConnector {
    type Store = SqliteStore;

    async fn connect(&self) -> Result<SqliteStore> {
        let conn = SqliteConnection::connect_with(&self.options).await?;
        Ok(SqliteStore { conn })
    }
}

pub struct SqliteStore {
    conn: SqliteConnection,
}

impl SqliteStore {
    async fn table_exists(&mut self, table: &TableName) -> Result<bool> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table.as_str())
                .fetch_optional(&mut self.conn)
                .await?;
        Ok(found.is_some())
    }
}

impl TemperatureStore for SqliteStore {
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

        sqlx::query(&ddl).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn insert_row(
        &mut self,
        table: &TableName,
        timestamp: &str,
        reading: &SensorReading,
    ) -> Result<()> {
        let insert = format!(
            "INSERT INTO {} (timestamp, device_name, temperature) VALUES (?, ?, ?)",
            table
        );

        let mut tx = self.conn.begin().await?;
        sqlx::query(&insert)
            .bind(timestamp)
            .bind(&reading.device_name)
            .bind(reading.temperature)
            .execute(&mut *tx)
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

        let rows = match query {
            RowQuery::Latest => {
                let select = format!(
                    "SELECT id, timestamp, device_name, temperature FROM {} ORDER BY timestamp DESC, id DESC",
                    table
                );
                sqlx::query_as::<_, TemperatureRecord>(&select)
                    .fetch_all(&mut self.conn)
                    .await?
            }
            RowQuery::AtTimestamp(timestamp) => {
                let select = format!(
                    "SELECT id, timestamp, device_name, temperature FROM {} WHERE timestamp = ?",
                    table
                );
                sqlx::query_as::<_, TemperatureRecord>(&select)
                    .bind(timestamp)
                    .fetch_all(&mut self.conn)
                    .await?
            }
        };

        Ok(rows)
    }

    async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Store selected by the scheme of the configured database URL:
/// `sqlite:` opens a local file, `libsql://`, `https://` and `http://`
/// reach a remote libsql server with the auth token.
#[derive(Debug, Clone)]
pub enum StoreBinding {
    Sqlite(SqliteConnector),
    Remote(RemoteConnector),
}

impl StoreBinding {
    pub fn from_config(config: &StoreConfig, mode: AccessMode) -> Result<Self> {
        if config.database_url.starts_with("sqlite:") {
            SqliteConnector::new(config, mode).map(StoreBinding::Sqlite)
        } else if REMOTE_SCHEMES
            .iter()
            .any(|scheme| config.database_url.starts_with(scheme))
        {
            RemoteConnector::new(config).map(StoreBinding::Remote)
        } else {
            Err(Error::Configuration(format!(
                "unsupported database URL scheme for {}, expected sqlite: or libsql://",
                config.redacted_url()
            )))
        }
    }
}

pub enum BoundStore {
    Sqlite(SqliteStore),
    Remote(RemoteStore),
}

impl StoreConnector for StoreBinding {
    type Store = BoundStore;

    async fn connect(&self) -> Result<BoundStore> {
        match self {
            StoreBinding::Sqlite(connector) => connector.connect().await.map(BoundStore::Sqlite),
            StoreBinding::Remote(connector) => connector.connect().await.map(BoundStore::Remote),
        }
    }
}

impl TemperatureStore for BoundStore {
    async fn create_table_if_absent(&mut self, table: &TableName) -> Result<()> {
        match self {
            BoundStore::Sqlite(store) => store.create_table_if_absent(table).await,
            BoundStore::Remote(store) => store.create_table_if_absent(table).await,
        }
    }

    async fn insert_row(
        &mut self,
        table: &TableName,
        timestamp: &str,
        reading: &SensorReading,
    ) -> Result<()> {
        match self {
            BoundStore::Sqlite(store) => store.insert_row(table, timestamp, reading).await,
            BoundStore::Remote(store) => store.insert_row(table, timestamp, reading).await,
        }
    }

    async fn query_rows(
        &mut self,
        table: &TableName,
        query: RowQuery,
    ) -> Result<Vec<TemperatureRecord>> {
        match self {
            BoundStore::Sqlite(store) => store.query_rows(table, query).await,
            BoundStore::Remote(store) => store.query_rows(table, query).await,
        }
    }

    async fn close(self) -> Result<()> {
        match self {
            BoundStore::Sqlite(store) => store.close().await,
            BoundStore::Remote(store) => store.close().await,
        }
    }
}
