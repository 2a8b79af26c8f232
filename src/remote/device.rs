//! Request/response channel to the device-side video service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::correlation::ArtifactKey;

use super::deadline::{with_deadline, RemoteError};
use super::device_time::serde_device_time;

/// Each call is independently latent and unordered relative to other calls.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    async fn invoke(&self, command: Value) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum DeviceCommand {
    /// Starts server-side generation for `[from, to]`; returns before the artifact exists.
    Save {
        #[serde(with = "serde_device_time")]
        from: DateTime<Utc>,
        #[serde(with = "serde_device_time")]
        to: DateTime<Utc>,
        metadata: String,
    },
    Fetch {
        #[serde(with = "serde_device_time")]
        from: DateTime<Utc>,
        #[serde(with = "serde_device_time")]
        to: DateTime<Utc>,
    },
    GetStorageState,
}

impl DeviceCommand {
    fn operation(&self) -> &'static str {
        match self {
            DeviceCommand::Save { .. } => "save",
            DeviceCommand::Fetch { .. } => "fetch",
            DeviceCommand::GetStorageState => "get-storage-state",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SaveAck {
    /// Name the device will give the generated file, when it reports one.
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedVideo {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoredRange {
    #[serde(with = "serde_device_time")]
    pub from: DateTime<Utc>,
    #[serde(with = "serde_device_time")]
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StorageState {
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub stored_video: Vec<StoredRange>,
}

impl StorageState {
    /// True when a single retained range spans all of `[from, to]`.
    pub fn covers(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.stored_video
            .iter()
            .any(|range| range.from <= from && range.to >= to)
    }
}

/// Typed wrapper around a [`DeviceChannel`] with a per-call deadline.
#[derive(Clone)]
pub struct VideoService {
    channel: Arc<dyn DeviceChannel>,
    timeout: Duration,
}

impl VideoService {
    pub fn new(channel: Arc<dyn DeviceChannel>, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    pub async fn save(
        &self,
        key: &ArtifactKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SaveAck, RemoteError> {
        let response = self
            .invoke(DeviceCommand::Save {
                from,
                to,
                metadata: key.metadata_tag(),
            })
            .await?;
        // Some device builds answer `save` with an empty body.
        if response.is_null() {
            return Ok(SaveAck::default());
        }
        serde_json::from_value(response)
            .context("unexpected save response")
            .map_err(RemoteError::Failed)
    }

    /// Returns `None` when the device answered without inline video bytes.
    pub async fn fetch(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<FetchedVideo>, RemoteError> {
        let response = self.invoke(DeviceCommand::Fetch { from, to }).await?;
        decode_inline_video(&response).map_err(RemoteError::Failed)
    }

    pub async fn storage_state(&self) -> Result<StorageState, RemoteError> {
        let response = self.invoke(DeviceCommand::GetStorageState).await?;
        serde_json::from_value(response)
            .context("unexpected get-storage-state response")
            .map_err(RemoteError::Failed)
    }

    async fn invoke(&self, command: DeviceCommand) -> Result<Value, RemoteError> {
        let operation = command.operation();
        let payload = serde_json::to_value(&command)
            .with_context(|| format!("failed to encode {operation} command"))?;
        debug!("invoking device command {payload}");
        with_deadline(operation, self.timeout, self.channel.invoke(payload)).await
    }
}

fn decode_inline_video(response: &Value) -> Result<Option<FetchedVideo>> {
    let Some(encoded) = response.get("video") else {
        return Ok(None);
    };
    let encoded = encoded
        .as_str()
        .ok_or_else(|| anyhow!("fetch response 'video' is not a string"))?;
    if encoded.is_empty() {
        return Ok(None);
    }
    let bytes = STANDARD
        .decode(encoded)
        .context("fetch response carries invalid base64 video")?;
    Ok(Some(FetchedVideo { bytes }))
}
