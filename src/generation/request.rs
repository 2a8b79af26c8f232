use log::{info, warn};

use crate::correlation::ArtifactKey;
use crate::models::Step;
use crate::remote::{RemoteError, VideoService};

use super::coordinator::{Completion, GenerationCoordinator};

/// Asks the device to cut a step's video and tracks its arrival.
#[derive(Clone)]
pub struct StepVideoRequester {
    videos: VideoService,
    coordinator: GenerationCoordinator,
}

impl StepVideoRequester {
    pub fn new(videos: VideoService, coordinator: GenerationCoordinator) -> Self {
        Self { videos, coordinator }
    }

    /// Triggers generation for the step window and registers a polling request.
    ///
    /// A failed `save` is returned to the caller and nothing is registered.
    /// If the key is already pending the device is not asked again; the
    /// callback simply joins the live request.
    pub async fn request<F>(&self, step: &Step, on_complete: F) -> Result<String, RemoteError>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        step.validate()?;
        let key = ArtifactKey::for_step(step);

        if self.coordinator.contains(&key.request_key()) {
            info!("{key} already pending, joining the live request");
            return Ok(self.coordinator.add_request(step, on_complete));
        }

        match self.videos.save(&key, step.start, step.end).await {
            Ok(ack) => {
                info!(
                    "requested video for {key} ({})",
                    ack.filename.as_deref().unwrap_or("name pending")
                );
                Ok(self.coordinator.add_request(step, on_complete))
            }
            Err(err) => {
                warn!("video generation request for {key} failed: {err}");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{PollingConfig, RecordSource};
    use crate::models::CaptureRecord;
    use crate::remote::DeviceChannel;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Device {
        refuse: AtomicBool,
        hang: AtomicBool,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl DeviceChannel for Device {
        async fn invoke(&self, command: Value) -> Result<Value> {
            assert_eq!(command["command"], "save");
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.hang.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
            }
            if self.refuse.load(Ordering::SeqCst) {
                return Err(anyhow!("camera busy"));
            }
            Ok(json!({ "filename": format!("video_cam1_{}.mp4", command["metadata"].as_str().unwrap()) }))
        }
    }

    struct Empty;

    #[async_trait]
    impl RecordSource for Empty {
        async fn refresh(&self) -> Result<Vec<CaptureRecord>> {
            Ok(Vec::new())
        }
    }

    fn setup() -> (StepVideoRequester, GenerationCoordinator, Arc<Device>) {
        let device = Arc::new(Device::default());
        let coordinator = GenerationCoordinator::new(PollingConfig::default(), Arc::new(Empty));
        let videos = VideoService::new(device.clone(), Duration::from_secs(10));
        (StepVideoRequester::new(videos, coordinator.clone()), coordinator, device)
    }

    fn step() -> Step {
        let start = Utc.with_ymd_and_hms(2025, 1, 21, 21, 12, 0).unwrap();
        Step::new("p1", "Execute", start, start + chrono::Duration::minutes(3)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn successful_save_registers_once() {
        let (requester, coordinator, device) = setup();

        let key = requester.request(&step(), |_| {}).await.unwrap();
        assert_eq!(key, "p1-Execute");
        assert!(coordinator.contains("p1-Execute"));

        requester.request(&step(), |_| {}).await.unwrap();
        assert_eq!(device.saves.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.pending_keys().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_save_registers_nothing() {
        let (requester, coordinator, device) = setup();
        device.refuse.store(true, Ordering::SeqCst);

        let err = requester.request(&step(), |_| {}).await.unwrap_err();
        assert!(!err.is_timeout());
        assert!(coordinator.pending_keys().is_empty());
        assert!(!coordinator.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_save_is_a_timeout_and_registers_nothing() {
        let (requester, coordinator, device) = setup();
        device.hang.store(true, Ordering::SeqCst);

        let err = requester.request(&step(), |_| {}).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(!coordinator.contains("p1-Execute"));
    }
}
