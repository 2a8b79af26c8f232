use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::models::CaptureRecord;
use crate::remote::paging::list_all;
use crate::remote::{CaptureFilter, CaptureStore, SortOrder};

/// Produces the current candidate records the coordinator matches against.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn refresh(&self) -> Result<Vec<CaptureRecord>>;
}

/// Lists every video record straight from the capture store, newest first.
///
/// Generated videos are stamped inside their step's window, so a video for an
/// old pass can sit behind any number of newer ones. The whole listing is read.
pub struct StoreRecordSource {
    store: Arc<dyn CaptureStore>,
    filter: CaptureFilter,
    page_size: usize,
}

impl StoreRecordSource {
    pub fn new(store: Arc<dyn CaptureStore>, filter: CaptureFilter, page_size: usize) -> Self {
        Self {
            store,
            filter,
            page_size,
        }
    }
}

#[async_trait]
impl RecordSource for StoreRecordSource {
    async fn refresh(&self) -> Result<Vec<CaptureRecord>> {
        list_all(self.store.as_ref(), &self.filter, self.page_size, SortOrder::Descending)
            .await
            .context("failed to refresh video records")
    }
}
