//! http_tx.rs — Backend API client
//!
//! Thin wrapper over the backend's JSON endpoints. Domain failures come back
//! as the failure envelope with HTTP 400 and are returned as data, not errors;
//! only transport and decoding problems are `Err`.

use anyhow::{Context, Result};
use egress_types::{ApiResponse, DeviceResult, DeviceUpdateRequest, StateUpdate, WifiDevice};
use tracing::debug;

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: String,
}

impl BackendClient {
    pub fn new(base: &str) -> Self {
        Self { http: reqwest::Client::new(), base: base.trim_end_matches('/').to_string() }
    }

    pub async fn send_update(
        &self,
        device_tag: &str,
        wifi_devices: Vec<WifiDevice>,
    ) -> Result<ApiResponse<DeviceResult>> {
        let body = DeviceUpdateRequest { device_tag: device_tag.to_string(), wifi_devices };
        let resp = self
            .http
            .post(format!("{}/", self.base))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST / for {device_tag}"))?;
        debug!("POST / {device_tag}: {}", resp.status());
        Ok(resp.json().await?)
    }

    pub async fn result(&self, device_tag: &str) -> Result<ApiResponse<DeviceResult>> {
        let resp = self
            .http
            .get(format!("{}/result/{device_tag}", self.base))
            .send()
            .await
            .with_context(|| format!("GET /result/{device_tag}"))?;
        Ok(resp.json().await?)
    }

    pub async fn release(&self, device_tag: &str) -> Result<ApiResponse<String>> {
        let resp = self
            .http
            .post(format!("{}/exit/{device_tag}", self.base))
            .send()
            .await
            .with_context(|| format!("POST /exit/{device_tag}"))?;
        Ok(resp.json().await?)
    }

    pub async fn state(&self) -> Result<ApiResponse<StateUpdate>> {
        let resp = self
            .http
            .get(format!("{}/state", self.base))
            .send()
            .await
            .context("GET /state")?;
        Ok(resp.json().await?)
    }
}
