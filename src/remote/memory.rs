//! In-process [`CaptureStore`] used for local runs and tests.
//!
//! Listings never carry `binary`, like the remote store; use `read_by_ids`
//! to hydrate.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::CaptureRecord;

use super::capture_store::{CaptureFilter, CapturePage, CaptureStore, PageRequest, SortOrder, Upload};

struct StoredRecord {
    owner_id: String,
    record: CaptureRecord,
}

#[derive(Default)]
pub struct InMemoryCaptureStore {
    records: Mutex<Vec<StoredRecord>>,
    fail_writes: AtomicBool,
    fail_lists: AtomicBool,
    fail_deletes: AtomicBool,
    delete_calls: AtomicUsize,
}

impl InMemoryCaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record as if some other writer had uploaded it.
    pub fn insert(&self, owner_id: &str, record: CaptureRecord) {
        self.lock().push(StoredRecord {
            owner_id: owner_id.to_string(),
            record,
        });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CaptureStore for InMemoryCaptureStore {
    async fn write(&self, upload: Upload) -> Result<String> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("capture store rejected write");
        }

        let id = Uuid::new_v4().to_string();
        let record = CaptureRecord {
            id: id.clone(),
            timestamp_utc: upload.time_range.0,
            filename: format!("{}/{}{}", upload.component_name, id, upload.file_ext),
            uri: format!("memory://{}/{}", upload.owner_id, id),
            tags: upload.tags.into_iter().collect::<BTreeSet<_>>(),
            component_name: Some(upload.component_name),
            component_type: Some(upload.component_type),
            binary: Some(upload.bytes),
        };
        self.insert(&upload.owner_id, record);
        Ok(id)
    }

    async fn list_by_filter(&self, filter: &CaptureFilter, page: PageRequest) -> Result<CapturePage> {
        if self.fail_lists.load(Ordering::SeqCst) {
            bail!("capture store listing unavailable");
        }

        let mut matching: Vec<CaptureRecord> = self
            .lock()
            .iter()
            .filter(|stored| filter.matches(&stored.record, &stored.owner_id))
            .map(|stored| CaptureRecord {
                binary: None,
                ..stored.record.clone()
            })
            .collect();

        match page.order {
            SortOrder::Ascending => matching.sort_by(|a, b| a.timestamp_utc.cmp(&b.timestamp_utc)),
            SortOrder::Descending => matching.sort_by(|a, b| b.timestamp_utc.cmp(&a.timestamp_utc)),
        }

        let offset = match page.token.as_deref() {
            Some(token) => token
                .parse::<usize>()
                .with_context(|| format!("invalid page token '{token}'"))?,
            None => 0,
        };
        let limit = page.limit.max(1);
        let end = (offset + limit).min(matching.len());
        let records = matching.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(CapturePage { records, next_token })
    }

    async fn read_by_ids(&self, ids: &[String]) -> Result<Vec<CaptureRecord>> {
        // Ids deleted since they were listed are simply absent from the result.
        let guard = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| {
                guard
                    .iter()
                    .find(|stored| &stored.record.id == id)
                    .map(|stored| stored.record.clone())
            })
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("capture store rejected delete");
        }

        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|stored| !ids.contains(&stored.record.id));
        Ok((before - guard.len()) as u64)
    }
}
