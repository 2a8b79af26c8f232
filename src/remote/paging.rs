use anyhow::{Context, Result};

use crate::models::CaptureRecord;

use super::capture_store::{CaptureFilter, CapturePage, CaptureStore, PageRequest, SortOrder};

/// Walks every page of a listing, handing each page to `visit` as it arrives.
pub async fn for_each_page<F>(
    store: &dyn CaptureStore,
    filter: &CaptureFilter,
    page_size: usize,
    order: SortOrder,
    mut visit: F,
) -> Result<()>
where
    F: FnMut(CapturePage) -> Result<()>,
{
    let mut request = PageRequest::first(page_size, order);
    loop {
        let page = store
            .list_by_filter(filter, request.clone())
            .await
            .context("failed to list capture records")?;
        let next_token = page.next_token.clone();
        visit(page)?;

        match next_token {
            Some(token) => request.token = Some(token),
            None => return Ok(()),
        }
    }
}

pub async fn list_all(
    store: &dyn CaptureStore,
    filter: &CaptureFilter,
    page_size: usize,
    order: SortOrder,
) -> Result<Vec<CaptureRecord>> {
    let mut records = Vec::new();
    for_each_page(store, filter, page_size, order, |page| {
        records.extend(page.records);
        Ok(())
    })
    .await?;
    Ok(records)
}

/// Fills in `binary` for records that were listed without it. Input order is kept.
pub async fn hydrate(store: &dyn CaptureStore, records: Vec<CaptureRecord>) -> Result<Vec<CaptureRecord>> {
    let missing: Vec<String> = records
        .iter()
        .filter(|record| record.binary.is_none())
        .map(|record| record.id.clone())
        .collect();
    if missing.is_empty() {
        return Ok(records);
    }

    let mut loaded = store
        .read_by_ids(&missing)
        .await
        .context("failed to read capture payloads")?;

    Ok(records
        .into_iter()
        .map(|mut record| {
            if record.binary.is_none() {
                if let Some(pos) = loaded.iter().position(|full| full.id == record.id) {
                    record.binary = loaded.swap_remove(pos).binary;
                }
            }
            record
        })
        .collect())
}
