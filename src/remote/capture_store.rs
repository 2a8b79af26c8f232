//! Append-only remote object store consumed by the core.
//!
//! Writes are durable at least once and become visible to listings of the same
//! session eventually. Nothing is ever updated in place.

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::CaptureRecord;

/// One object to append to the store.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub owner_id: String,
    pub component_type: String,
    pub component_name: String,
    pub method: String,
    pub file_ext: String,
    pub time_range: (DateTime<Utc>, DateTime<Utc>),
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFilter {
    pub owner_id: String,
    pub component_name: Option<String>,
    pub component_type: Option<String>,
    /// Records must carry every listed tag.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CaptureFilter {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Self::default()
        }
    }

    pub fn component_name(mut self, name: impl Into<String>) -> Self {
        self.component_name = Some(name.into());
        self
    }

    pub fn component_type(mut self, kind: impl Into<String>) -> Self {
        self.component_type = Some(kind.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn matches(&self, record: &CaptureRecord, owner_id: &str) -> bool {
        owner_id == self.owner_id
            && self
                .component_name
                .as_deref()
                .map_or(true, |name| record.component_name.as_deref() == Some(name))
            && self
                .component_type
                .as_deref()
                .map_or(true, |kind| record.component_type.as_deref() == Some(kind))
            && self.tags.iter().all(|tag| record.has_tag(tag))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub limit: usize,
    pub order: SortOrder,
    pub token: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize, order: SortOrder) -> Self {
        Self {
            limit,
            order,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapturePage {
    pub records: Vec<CaptureRecord>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait CaptureStore: Send + Sync {
    /// Appends one object and returns its store-assigned id.
    async fn write(&self, upload: Upload) -> Result<String>;

    /// Lists records ordered by capture timestamp. `binary` may be left empty.
    async fn list_by_filter(&self, filter: &CaptureFilter, page: PageRequest) -> Result<CapturePage>;

    /// Returns the requested records with `binary` populated. Unknown ids are left out.
    async fn read_by_ids(&self, ids: &[String]) -> Result<Vec<CaptureRecord>>;

    /// Deletes in one batch and returns how many records were actually removed.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64>;
}
