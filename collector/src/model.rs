use serde::{Deserialize, Serialize};

/// Device descriptor as returned by `GET /1/devices`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(default)]
    pub newest_events: Option<NewestEvents>,
}

/// Latest event per sensor. Keys follow the device API: temperature,
/// humidity, illuminance and motion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewestEvents {
    pub te: Option<SensorEvent>,
    pub hu: Option<SensorEvent>,
    pub il: Option<SensorEvent>,
    pub mo: Option<SensorEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorEvent {
    pub val: f64,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Device {
    pub fn temperature(&self) -> Option<&SensorEvent> {
        self.newest_events.as_ref().and_then(|events| events.te.as_ref())
    }
}

/// One temperature sample on its way to the store
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub device_name: String,
    pub temperature: f64,
}

/// Persisted row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TemperatureRecord {
    pub id: i64,
    pub timestamp: String,
    pub device_name: String,
    pub temperature: f64,
}
