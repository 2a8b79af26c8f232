use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::generation::PollingConfig;
use crate::notes::NoteConfig;

const PART_ID_ENV: &str = "SANDWATCH_PART_ID";

/// Where generated step videos show up and the page size a refresh walks them with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub component_name: String,
    pub component_type: String,
    pub refresh_page_size: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            component_name: "video-store".into(),
            component_type: "video".into(),
            refresh_page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Owner id for every write and listing.
    pub part_id: String,
    pub polling: PollingConfig,
    pub notes: NoteConfig,
    pub videos: VideoConfig,
    /// Page size for image and file listings of a pass.
    pub listing_page_size: usize,
    /// Deadline for a single device command.
    pub remote_timeout_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            part_id: String::new(),
            polling: PollingConfig::default(),
            notes: NoteConfig::default(),
            videos: VideoConfig::default(),
            listing_page_size: 100,
            remote_timeout_secs: 30,
        }
    }
}

impl MonitorSettings {
    /// Reads settings from `path` when it exists, defaults otherwise.
    ///
    /// Unparsable content falls back to defaults. `SANDWATCH_PART_ID`
    /// overrides the configured part id.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring invalid settings in {}: {err}", path.display());
                MonitorSettings::default()
            })
        } else {
            MonitorSettings::default()
        };

        if let Ok(part_id) = std::env::var(PART_ID_ENV) {
            if !part_id.is_empty() {
                settings.part_id = part_id;
            }
        }

        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs.max(1))
    }
}
