//! Capture records as handed out by the capture store.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable stored artifact (image, video or note payload).
///
/// The core never mutates a record; it only reads records and deletes them by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRecord {
    pub id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub filename: String,
    pub uri: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub component_name: Option<String>,
    pub component_type: Option<String>,
    /// Only present once the record has been hydrated through `read_by_ids`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<Vec<u8>>,
}

impl CaptureRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_from_component(&self, component_name: &str) -> bool {
        self.component_name.as_deref() == Some(component_name)
    }

    /// True when `passId` appears as a whole `/`-separated segment of the filename.
    pub fn has_path_segment(&self, segment: &str) -> bool {
        self.filename.split('/').any(|part| part == segment)
    }
}
