pub mod correlation;
pub mod generation;
pub mod models;
pub mod notes;
pub mod remote;
pub mod settings;
mod utils;

use std::sync::Arc;

use anyhow::{bail, Result};
use log::info;

use correlation::{match_before_after_images, match_pass_files};
use generation::{GenerationCoordinator, RecordSource, StepVideoRequester, StoreRecordSource};
use models::{CaptureRecord, Pass};
use notes::NoteStore;
use remote::paging::{hydrate, list_all};
use remote::{CaptureFilter, CaptureStore, DeviceChannel, SortOrder, VideoService};
use settings::MonitorSettings;

pub use utils::logging::init_logging;

/// Composition root: one of each service, shared by reference with every consumer.
pub struct Monitor {
    settings: MonitorSettings,
    store: Arc<dyn CaptureStore>,
    video_source: Arc<StoreRecordSource>,
    pub coordinator: GenerationCoordinator,
    pub notes: NoteStore,
    pub videos: VideoService,
    pub requester: StepVideoRequester,
}

/// First and last image of a camera during a pass, with payloads loaded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PassImages {
    pub before: Option<CaptureRecord>,
    pub after: Option<CaptureRecord>,
}

impl Monitor {
    pub fn new(
        settings: MonitorSettings,
        store: Arc<dyn CaptureStore>,
        device: Arc<dyn DeviceChannel>,
    ) -> Result<Self> {
        if settings.part_id.is_empty() {
            bail!("part_id must be configured");
        }

        let video_filter = CaptureFilter::for_owner(settings.part_id.clone())
            .component_name(settings.videos.component_name.clone())
            .component_type(settings.videos.component_type.clone());
        let video_source = Arc::new(StoreRecordSource::new(
            store.clone(),
            video_filter,
            settings.videos.refresh_page_size,
        ));

        let coordinator = GenerationCoordinator::new(settings.polling.clone(), video_source.clone());
        let notes = NoteStore::new(store.clone(), settings.part_id.clone(), settings.notes.clone());
        let videos = VideoService::new(device, settings.remote_timeout());
        let requester = StepVideoRequester::new(videos.clone(), coordinator.clone());

        info!("monitor ready for part {}", settings.part_id);

        Ok(Self {
            settings,
            store,
            video_source,
            coordinator,
            notes,
            videos,
            requester,
        })
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Observer-side refresh: reloads videos, hands them to the coordinator and
    /// settles whatever became due without waiting for the next tick.
    pub async fn refresh_videos(&self) -> Result<Vec<CaptureRecord>> {
        let records = self.video_source.refresh().await?;
        self.coordinator.update_current_records(records.clone());
        self.coordinator.force_check();
        Ok(records)
    }

    /// Before/after images of `component_name` for the pass, hydrated.
    pub async fn pass_images(&self, pass: &Pass, component_name: &str) -> Result<PassImages> {
        let filter = CaptureFilter::for_owner(self.settings.part_id.clone()).component_name(component_name);
        let records = list_all(
            self.store.as_ref(),
            &filter,
            self.settings.listing_page_size,
            SortOrder::Ascending,
        )
        .await?;

        let matched = match_before_after_images(pass, &records, component_name);
        let mut picked: Vec<CaptureRecord> = matched.before.into_iter().cloned().collect();
        if !matched.is_single() {
            picked.extend(matched.after.cloned());
        }
        let mut hydrated = hydrate(self.store.as_ref(), picked).await?.into_iter();

        let before = hydrated.next();
        let after = if matched.is_single() {
            before.clone()
        } else {
            hydrated.next()
        };
        Ok(PassImages { before, after })
    }

    /// Every record of this part tied to the pass, oldest first.
    pub async fn pass_files(&self, pass: &Pass) -> Result<Vec<CaptureRecord>> {
        let filter = CaptureFilter::for_owner(self.settings.part_id.clone());
        let records = list_all(
            self.store.as_ref(),
            &filter,
            self.settings.listing_page_size,
            SortOrder::Ascending,
        )
        .await?;
        Ok(match_pass_files(pass, &records).into_iter().cloned().collect())
    }
}
