use std::time::Duration;
use chrono::NaiveDateTime;
use log::{debug, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use crate::drivers::source::SampleSource;
use crate::drivers::PipelineError;
use crate::types::Sample;
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api/data";
/// Connection state the device API reports alongside an error.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DeviceStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub calibrating: bool,
    #[serde(default)]
    pub streaming: bool,
}
impl DeviceStatus {
    fn hint(&self) -> &'static str {
        if !self.connected {
            "device not connected, check the headband"
        } else if self.calibrating {
            "device is calibrating, please wait"
        } else if !self.streaming {
            "device not streaming yet"
        } else {
            "device reports an error while streaming"
        }
    }
}
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DevicePayload {
    Readings(Vec<Sample>),
    Fault {
        error: String,
        #[serde(default)]
        status: Option<DeviceStatus>,
    },
}
/// Polls the headband's HTTP bridge, which serves its last few readings.
///
/// Every failure mode (unreachable, timeout, device error payload, bad JSON)
/// is an acquisition gap for the caller: it logs and returns an empty cycle.
pub struct HttpDeviceSource {
    url: String,
    client: Client,
    last_delivered: Option<NaiveDateTime>,
}
impl HttpDeviceSource {
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Acquisition(format!("http client: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client,
            last_delivered: None,
        })
    }
    fn fetch(&self) -> Result<DevicePayload, PipelineError> {
        let response = self.client.get(&self.url).send()?;
        let status = response.status();
        let body = response.text()?;
        match serde_json::from_str::<DevicePayload>(&body) {
            Ok(payload) => Ok(payload),
            Err(_) if !status.is_success() => Err(PipelineError::Acquisition(format!(
                "device API answered {status}"
            ))),
            Err(e) => Err(PipelineError::Acquisition(format!("invalid JSON from device API: {e}"))),
        }
    }
    /// Drops readings the previous poll already delivered.
    fn take_new(&mut self, readings: Vec<Sample>) -> Vec<Sample> {
        let fresh: Vec<Sample> = match self.last_delivered {
            Some(last) => readings.into_iter().filter(|s| s.timestamp > last).collect(),
            None => readings,
        };
        if let Some(newest) = fresh.iter().map(|s| s.timestamp).max() {
            self.last_delivered = Some(newest);
        }
        fresh
    }
}
impl SampleSource for HttpDeviceSource {
    fn get_recent_samples(&mut self) -> Result<Vec<Sample>, PipelineError> {
        match self.fetch() {
            Ok(DevicePayload::Readings(readings)) => {
                let total = readings.len();
                let fresh = self.take_new(readings);
                if fresh.len() < total {
                    debug!("dropped {} readings already seen", total - fresh.len());
                }
                Ok(fresh)
            }
            Ok(DevicePayload::Fault { error, status }) => {
                let hint = status.unwrap_or_default().hint();
                warn!("device error: {error} ({hint})");
                Ok(Vec::new())
            }
            Err(e) => {
                warn!("{e}; is the EEG device API running at {}?", self.url);
                Ok(Vec::new())
            }
        }
    }
    fn describe(&self) -> String {
        format!("device API at {}", self.url)
    }
}
