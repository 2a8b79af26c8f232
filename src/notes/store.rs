//! Latest-value-wins notes on top of the append-only capture store.
//!
//! Every save appends a new record and then compacts in the background. The
//! read-side rule is always "newest `created_at_utc` wins", so duplicates left
//! by racing saves are harmless until the next compaction removes them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, error, info, warn};

use crate::models::note::sort_newest_first;
use crate::models::{CaptureRecord, PassNote};
use crate::remote::paging::{hydrate, list_all};
use crate::remote::{CaptureFilter, CaptureStore, PageRequest, SortOrder, Upload};

use super::config::NoteConfig;

const NOTE_METHOD: &str = "PassNote";
const NOTE_FILE_EXT: &str = ".json";

pub type NotesByPass = HashMap<String, Vec<PassNote>>;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct NoteStore {
    store: Arc<dyn CaptureStore>,
    part_id: String,
    config: NoteConfig,
    clock: Clock,
}

impl NoteStore {
    pub fn new(store: Arc<dyn CaptureStore>, part_id: impl Into<String>, config: NoteConfig) -> Self {
        Self {
            store,
            part_id: part_id.into(),
            config,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Appends a new note version and schedules compaction without waiting for it.
    ///
    /// Only the write can fail the save.
    pub async fn save(&self, pass_id: &str, note_text: &str, part_id: &str) -> Result<PassNote> {
        // Payloads carry millisecond timestamps.
        let created_at = (self.clock)().trunc_subsecs(3);
        let mut note = PassNote {
            pass_id: pass_id.to_string(),
            note_text: note_text.to_string(),
            created_at_utc: created_at,
            created_by: self.config.created_by.clone(),
            storage_id: None,
        };

        let bytes = note.to_bytes().context("failed to encode pass note")?;
        let storage_id = self
            .store
            .write(Upload {
                bytes,
                owner_id: part_id.to_string(),
                component_type: self.config.component_type.clone(),
                component_name: self.config.component_name.clone(),
                method: NOTE_METHOD.to_string(),
                file_ext: NOTE_FILE_EXT.to_string(),
                time_range: (created_at, created_at),
                tags: vec![PassNote::pass_tag(pass_id)],
            })
            .await
            .with_context(|| format!("failed to write note for pass {pass_id}"))?;
        note.storage_id = Some(storage_id);

        self.spawn_compaction(part_id, pass_id);
        Ok(note)
    }

    /// Every stored version for the pass, newest first.
    pub async fn fetch(&self, pass_id: &str) -> Result<Vec<PassNote>> {
        let mut notes = self.load_pass(&self.part_id, pass_id).await?;
        sort_newest_first(&mut notes);
        Ok(notes)
    }

    /// Current value for the pass, if any note was ever saved.
    pub async fn latest(&self, pass_id: &str) -> Result<Option<PassNote>> {
        Ok(self.fetch(pass_id).await?.into_iter().next())
    }

    /// Bulk fetch over all notes of this part, grouped by the pass id in each payload.
    ///
    /// `on_batch` sees the accumulated map after every page. An empty `pass_ids`
    /// keeps every pass.
    pub async fn fetch_many(
        &self,
        pass_ids: &[String],
        mut on_batch: Option<&mut (dyn FnMut(&NotesByPass) + Send)>,
    ) -> Result<NotesByPass> {
        let wanted: HashSet<&str> = pass_ids.iter().map(String::as_str).collect();
        let filter = self.base_filter(&self.part_id);
        let mut grouped = NotesByPass::new();
        let mut request = PageRequest::first(self.config.page_size, SortOrder::Descending);

        loop {
            let page = self
                .store
                .list_by_filter(&filter, request.clone())
                .await
                .context("failed to list pass notes")?;
            let next_token = page.next_token;
            let records = hydrate(self.store.as_ref(), page.records).await?;

            for note in decode_notes(records) {
                if wanted.is_empty() || wanted.contains(note.pass_id.as_str()) {
                    grouped.entry(note.pass_id.clone()).or_default().push(note);
                }
            }
            grouped.values_mut().for_each(|notes| sort_newest_first(notes));

            if let Some(callback) = on_batch.as_deref_mut() {
                callback(&grouped);
            }

            match next_token {
                Some(token) => request.token = Some(token),
                None => break,
            }
        }

        debug!("fetched notes for {} pass(es)", grouped.len());
        Ok(grouped)
    }

    /// Deletes every stored version but the newest, in one batch.
    /// Returns how many records the store removed.
    pub async fn compact(&self, pass_id: &str) -> Result<u64> {
        self.compact_for_owner(&self.part_id, pass_id).await
    }

    async fn compact_for_owner(&self, owner_id: &str, pass_id: &str) -> Result<u64> {
        let mut notes = self.load_pass(owner_id, pass_id).await?;
        if notes.len() <= 1 {
            return Ok(0);
        }

        sort_newest_first(&mut notes);
        let stale: Vec<String> = notes
            .iter()
            .skip(1)
            .filter_map(|note| note.storage_id.clone())
            .collect();

        let deleted = self
            .store
            .delete_by_ids(&stale)
            .await
            .with_context(|| format!("failed to delete stale notes for pass {pass_id}"))?;
        info!(
            "compacted notes for pass {pass_id}: kept {}, deleted {deleted}",
            notes[0].storage_id.as_deref().unwrap_or("?")
        );
        Ok(deleted)
    }

    fn spawn_compaction(&self, owner_id: &str, pass_id: &str) {
        let this = self.clone();
        let owner_id = owner_id.to_string();
        let pass_id = pass_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = this.compact_for_owner(&owner_id, &pass_id).await {
                error!("note compaction for pass {pass_id} failed: {err:#}");
            }
        });
    }

    async fn load_pass(&self, owner_id: &str, pass_id: &str) -> Result<Vec<PassNote>> {
        let filter = self.base_filter(owner_id).tag(PassNote::pass_tag(pass_id));
        let records = list_all(
            self.store.as_ref(),
            &filter,
            self.config.page_size,
            SortOrder::Descending,
        )
        .await
        .with_context(|| format!("failed to list notes for pass {pass_id}"))?;
        let records = hydrate(self.store.as_ref(), records).await?;
        Ok(decode_notes(records))
    }

    fn base_filter(&self, owner_id: &str) -> CaptureFilter {
        CaptureFilter::for_owner(owner_id)
            .component_name(self.config.component_name.clone())
            .component_type(self.config.component_type.clone())
    }
}

/// Decodes note payloads; records that cannot be decoded are skipped.
fn decode_notes(records: Vec<CaptureRecord>) -> Vec<PassNote> {
    records
        .into_iter()
        .filter_map(|record| {
            let Some(bytes) = record.binary.as_deref() else {
                warn!("note record {} has no payload, skipping", record.id);
                return None;
            };
            match PassNote::from_bytes(bytes, &record.id) {
                Ok(note) => Some(note),
                Err(err) => {
                    warn!("skipping malformed note record {}: {err}", record.id);
                    None
                }
            }
        })
        .collect()
}
