//! In-memory store binding. Shares its tables between every handle opened
//! from the same connector, and can be told to fail reads or writes.

use crate::errors::Result;
use crate::model::{SensorReading, TemperatureRecord};
use crate::store::{RowQuery, StoreConnector, TableName, TemperatureStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<TemperatureRecord>>,
    next_id: i64,
    connects: usize,
    open: usize,
    fail_reads: bool,
    fail_writes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a row with an explicit timestamp, creating the table if needed.
    pub fn seed(&self, table: &TableName, timestamp: &str, device_name: &str, temperature: f64) {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state
            .tables
            .entry(table.as_str().to_string())
            .or_default()
            .push(TemperatureRecord {
                id,
                timestamp: timestamp.to_string(),
                device_name: device_name.to_string(),
                temperature,
            });
    }

    /// Rows in insertion order.
    pub fn rows(&self, table: &TableName) -> Vec<TemperatureRecord> {
        self.state()
            .tables
            .get(table.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_table(&self, table: &TableName) -> bool {
        self.state().tables.contains_key(table.as_str())
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn connects(&self) -> usize {
        self.state().connects
    }

    pub fn open_connections(&self) -> usize {
        self.state().open
    }
}

impl StoreConnector for MemoryConnector {
    type Store = MemoryStore;

    async fn connect(&self) -> Result<MemoryStore> {
        let mut state = self.state();
        state.connects += 1;
        state.open += 1;
        Ok(MemoryStore {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TemperatureStore for MemoryStore {
    async fn create_table_if_absent(&mut self, table: &TableName) -> Result<()> {
        self.state()
            .tables
            .entry(table.as_str().to_string())
            .or_default();
        Ok(())
    }

    async fn insert_row(
        &mut self,
        table: &TableName,
        timestamp: &str,
        reading: &SensorReading,
    ) -> Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(sqlx::Error::Protocol("simulated write failure".to_string()).into());
        }

        state.next_id += 1;
        let id = state.next_id;
        let rows = state
            .tables
            .get_mut(table.as_str())
            .ok_or_else(|| sqlx::Error::Protocol(format!("no such table: {}", table)))?;
        rows.push(TemperatureRecord {
            id,
            timestamp: timestamp.to_string(),
            device_name: reading.device_name.clone(),
            temperature: reading.temperature,
        });
        Ok(())
    }

    async fn query_rows(
        &mut self,
        table: &TableName,
        query: RowQuery,
    ) -> Result<Vec<TemperatureRecord>> {
        let state = self.state();
        if state.fail_reads {
            return Err(sqlx::Error::Protocol("simulated read failure".to_string()).into());
        }

        let rows = state.tables.get(table.as_str()).cloned().unwrap_or_default();
        let rows = match query {
            RowQuery::Latest => {
                let mut rows = rows;
                rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
                rows
            }
            RowQuery::AtTimestamp(timestamp) => rows
                .into_iter()
                .filter(|row| row.timestamp == timestamp)
                .collect(),
        };
        Ok(rows)
    }

    async fn close(self) -> Result<()> {
        self.state().open -= 1;
        Ok(())
    }
}
