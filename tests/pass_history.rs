use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use sandwatch_lib::correlation::{match_step_videos, ArtifactKey};
use sandwatch_lib::generation::Completion;
use sandwatch_lib::models::{CaptureRecord, Pass, Step};
use sandwatch_lib::notes::{NoteConfig, NoteStore};
use sandwatch_lib::remote::device_time::parse_device_time;
use sandwatch_lib::remote::memory::InMemoryCaptureStore;
use sandwatch_lib::remote::DeviceChannel;
use sandwatch_lib::settings::MonitorSettings;
use sandwatch_lib::Monitor;

const PART: &str = "part-1";

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 21, h, m, 0).unwrap()
}

fn pass_p1() -> Pass {
    Pass {
        pass_id: "p1".into(),
        start: at(21, 11),
        end: at(21, 32),
        steps: vec![
            Step::new("p1", "Plan", at(21, 11), at(21, 14)).unwrap(),
            Step::new("p1", "Execute", at(21, 14), at(21, 30)).unwrap(),
        ],
        success: true,
        err_string: None,
    }
}

fn capture(id: &str, filename: &str, ts: DateTime<Utc>, component: &str, kind: &str) -> CaptureRecord {
    CaptureRecord {
        id: id.into(),
        timestamp_utc: ts,
        filename: filename.into(),
        uri: format!("memory://{PART}/{id}"),
        tags: BTreeSet::new(),
        component_name: Some(component.into()),
        component_type: Some(kind.into()),
        binary: Some(id.as_bytes().to_vec()),
    }
}

/// Device double: a `save` makes the video appear in the store after a delay.
struct GeneratingDevice {
    store: Arc<InMemoryCaptureStore>,
    delay: Duration,
    saves: AtomicUsize,
}

#[async_trait]
impl DeviceChannel for GeneratingDevice {
    async fn invoke(&self, command: Value) -> Result<Value> {
        if command["command"] != "save" {
            return Err(anyhow!("unsupported command {}", command["command"]));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);

        let metadata = command["metadata"].as_str().unwrap_or_default().to_string();
        let to = parse_device_time(command["to"].as_str().unwrap_or_default())?;
        let filename = format!("video_cam1_{metadata}.mp4");
        let store = self.store.clone();
        let delay = self.delay;
        let record = capture(&format!("vid-{metadata}"), &filename, to, "video-store", "video");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.insert(PART, record);
        });

        Ok(json!({ "filename": filename }))
    }
}

fn monitor(delay: Duration) -> (Monitor, Arc<InMemoryCaptureStore>, Arc<GeneratingDevice>) {
    let store = Arc::new(InMemoryCaptureStore::new());
    let device = Arc::new(GeneratingDevice {
        store: store.clone(),
        delay,
        saves: AtomicUsize::new(0),
    });
    let settings = MonitorSettings {
        part_id: PART.into(),
        ..MonitorSettings::default()
    };
    let monitor = Monitor::new(settings, store.clone(), device.clone()).unwrap();
    (monitor, store, device)
}

#[test]
fn execute_video_is_found_by_name() {
    let pass = pass_p1();
    let records = vec![
        capture("v1", "video_cam1_p1_Execute.mp4", at(22, 5), "video-store", "video"),
        capture("v2", "video_cam1_p1_Plan.mp4", at(22, 6), "video-store", "video"),
        capture("v3", "video_cam1_p2_Execute.mp4", at(22, 7), "video-store", "video"),
    ];

    let step = pass.step("Execute").unwrap();
    let found = match_step_videos(step, &records);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].filename, "video_cam1_p1_Execute.mp4");
    assert!(ArtifactKey::for_step(step).matches_filename(&found[0].filename));
}

#[tokio::test]
async fn last_note_by_creation_time_survives_compaction() {
    let store = Arc::new(InMemoryCaptureStore::new());
    store.set_fail_deletes(true);
    let stamps = Mutex::new(vec![at(21, 43), at(21, 42), at(21, 41)]);
    let notes = NoteStore::new(store.clone(), PART, NoteConfig::default())
        .with_clock(move || stamps.lock().unwrap().pop().unwrap_or_else(Utc::now));

    notes.save("p1", "ok", PART).await.unwrap();
    notes.save("p1", "ok2", PART).await.unwrap();
    notes.save("p1", "ok2", PART).await.unwrap();
    assert_eq!(notes.fetch("p1").await.unwrap().len(), 3);

    store.set_fail_deletes(false);
    assert_eq!(notes.compact("p1").await.unwrap(), 2);

    let remaining = notes.fetch("p1").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].note_text, "ok2");
    assert_eq!(remaining[0].created_at_utc, at(21, 43));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn creation_time_not_call_order_decides_the_current_note() {
    let store = Arc::new(InMemoryCaptureStore::new());
    store.set_fail_deletes(true);
    // The second save carries the earlier timestamp.
    let stamps = Mutex::new(vec![at(21, 41), at(21, 45)]);
    let notes = NoteStore::new(store.clone(), PART, NoteConfig::default())
        .with_clock(move || stamps.lock().unwrap().pop().unwrap_or_else(Utc::now));

    notes.save("p1", "stamped-later", PART).await.unwrap();
    notes.save("p1", "saved-later", PART).await.unwrap();
    store.set_fail_deletes(false);
    notes.compact("p1").await.unwrap();

    let current = notes.latest("p1").await.unwrap().unwrap();
    assert_eq!(current.note_text, "stamped-later");
}

#[tokio::test(start_paused = true)]
async fn requested_step_video_arrives_through_polling() {
    sandwatch_lib::init_logging();
    let (monitor, _store, device) = monitor(Duration::from_secs(7));
    let pass = pass_p1();
    let step = pass.step("Execute").unwrap();
    let outcome: Arc<Mutex<Option<Completion>>> = Default::default();

    let sink = outcome.clone();
    let key = monitor
        .requester
        .request(step, move |completion| *sink.lock().unwrap() = Some(completion))
        .await
        .unwrap();
    assert_eq!(key, "p1-Execute");

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(outcome.lock().unwrap().is_none());

    tokio::time::sleep(Duration::from_secs(5)).await;
    let completion = outcome.lock().unwrap().clone();
    match completion {
        Some(Completion::Found(videos)) => assert_eq!(videos[0].filename, "video_cam1_p1_Execute.mp4"),
        other => panic!("expected the video, got {other:?}"),
    }
    assert_eq!(device.saves.load(Ordering::SeqCst), 1);
    assert!(!monitor.coordinator.is_polling());
}

#[tokio::test(start_paused = true)]
async fn observer_refresh_settles_before_the_next_tick() {
    let (monitor, _store, _device) = monitor(Duration::from_secs(1));
    let pass = pass_p1();
    let outcome: Arc<Mutex<Option<Completion>>> = Default::default();

    let sink = outcome.clone();
    monitor
        .requester
        .request(pass.step("Plan").unwrap(), move |completion| {
            *sink.lock().unwrap() = Some(completion)
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    let videos = monitor.refresh_videos().await.unwrap();
    assert_eq!(videos.len(), 1);
    assert!(matches!(*outcome.lock().unwrap(), Some(Completion::Found(_))));
    assert!(monitor.coordinator.pending_keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn video_that_never_arrives_times_out() {
    // Generation takes longer than the polling budget.
    let (monitor, _store, _device) = monitor(Duration::from_secs(600));
    let pass = pass_p1();
    let outcome: Arc<Mutex<Option<Completion>>> = Default::default();

    let sink = outcome.clone();
    monitor
        .requester
        .request(pass.step("Execute").unwrap(), move |completion| {
            *sink.lock().unwrap() = Some(completion)
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(66)).await;
    assert_eq!(*outcome.lock().unwrap(), Some(Completion::TimedOut));
    assert!(!monitor.coordinator.contains("p1-Execute"));
}

#[tokio::test]
async fn pass_images_and_files() {
    let (monitor, store, _device) = monitor(Duration::from_secs(1));
    let pass = pass_p1();
    store.insert(PART, capture("img-late", "cam1/late.jpg", at(21, 31), "cam1", "image"));
    store.insert(PART, capture("img-early", "cam1/early.jpg", at(21, 12), "cam1", "image"));
    store.insert(PART, capture("img-out", "cam1/out.jpg", at(21, 40), "cam1", "image"));
    store.insert(PART, capture("only-cam2", "cam2/a.jpg", at(21, 20), "cam2", "image"));
    store.insert(PART, capture("summary", "runs/p1/summary.json", at(23, 0), "runs", "file"));

    let images = monitor.pass_images(&pass, "cam1").await.unwrap();
    assert_eq!(images.before.as_ref().map(|r| r.id.as_str()), Some("img-early"));
    assert_eq!(images.after.as_ref().map(|r| r.id.as_str()), Some("img-late"));
    assert_eq!(images.before.unwrap().binary.as_deref(), Some(&b"img-early"[..]));

    let single = monitor.pass_images(&pass, "cam2").await.unwrap();
    assert_eq!(single.before, single.after);
    assert!(single.before.is_some());

    let files: Vec<_> = monitor
        .pass_files(&pass)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(files, ["img-early", "only-cam2", "img-late", "summary"]);
}

#[test]
fn monitor_requires_a_part_id() {
    let store = Arc::new(InMemoryCaptureStore::new());
    let device = Arc::new(GeneratingDevice {
        store: store.clone(),
        delay: Duration::ZERO,
        saves: AtomicUsize::new(0),
    });
    assert!(Monitor::new(MonitorSettings::default(), store, device).is_err());
}

#[tokio::test(start_paused = true)]
async fn existing_video_behind_newer_passes_is_found() {
    let (monitor, store, _device) = monitor(Duration::from_secs(600));
    let pass = pass_p1();
    store.insert(
        PART,
        capture("old", "video_cam1_p1_Execute.mp4", at(21, 30), "video-store", "video"),
    );
    for n in 0..60 {
        let filename = format!("video_cam1_q{n}_Execute.mp4");
        let stamp = at(22, 30) + chrono::Duration::seconds(n);
        store.insert(PART, capture(&format!("newer-{n}"), &filename, stamp, "video-store", "video"));
    }
    let outcome: Arc<Mutex<Option<Completion>>> = Default::default();

    let sink = outcome.clone();
    monitor
        .requester
        .request(pass.step("Execute").unwrap(), move |completion| {
            *sink.lock().unwrap() = Some(completion)
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;
    match outcome.lock().unwrap().clone() {
        Some(Completion::Found(videos)) => assert_eq!(videos[0].id, "old"),
        other => panic!("expected the stored video, got {other:?}"),
    }
    assert_eq!(monitor.refresh_videos().await.unwrap().len(), 61);
}
