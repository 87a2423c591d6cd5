use crate::errors::{Error, Result};
use crate::model::{Device, SensorReading};
use std::time::Duration;
use tracing::{debug, info};

/// Minimal HTTP surface the fetcher needs. Implementations return the raw
/// response body of a successful (2xx) bearer-authenticated GET and map
/// everything else to `Error::Transport`.
#[allow(async_fn_in_trait)]
pub trait DeviceSession {
    async fn get(&self, url: &str, api_key: &str) -> Result<Vec<u8>>;
}

/// `reqwest`-backed session with a bounded request timeout
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: reqwest::Client,
}

impl HttpSession {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl DeviceSession for HttpSession {
    async fn get(&self, url: &str, api_key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(api_key)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }
}

/// Fetch every device visible to `api_key`.
pub async fn fetch_devices(
    api_key: &str,
    endpoint: &str,
    session: &impl DeviceSession,
) -> Result<Vec<Device>> {
    if api_key.is_empty() {
        return Err(Error::Configuration("device API key is empty".to_string()));
    }

    debug!("Requesting devices from {}", endpoint);
    let body = session.get(endpoint, api_key).await?;
    let devices: Vec<Device> = serde_json::from_slice(&body)?;
    debug!("Device API returned {} device(s)", devices.len());

    Ok(devices)
}

/// Latest temperature of the first device returned by the API.
pub async fn fetch_latest_temperature(
    api_key: &str,
    endpoint: &str,
    session: &impl DeviceSession,
) -> Result<SensorReading> {
    let devices = fetch_devices(api_key, endpoint, session).await?;

    // Single-device deployments: the first device wins.
    let device = devices.into_iter().next().ok_or(Error::DeviceNotFound)?;

    let temperature = device
        .temperature()
        .map(|event| event.val)
        .ok_or_else(|| Error::DataUnavailable {
            device: device.name.clone(),
            sensor: "te",
        })?;

    info!("Temperature reading: {} = {}°C", device.name, temperature);

    Ok(SensorReading {
        device_name: device.name,
        temperature,
    })
}
