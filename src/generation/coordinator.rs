use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::correlation::{match_step_videos, ArtifactKey};
use crate::models::{CaptureRecord, Step};

use super::config::{PollingConfig, SubscriberPolicy};
use super::poll_worker::polling_loop;
use super::source::RecordSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Terminal state of a polling request, handed to every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The step's video showed up in the record view.
    Found(Vec<CaptureRecord>),
    /// The budget ran out first. Not an error; the caller decides what absence means.
    TimedOut,
}

pub type CompletionCallback = Box<dyn FnOnce(Completion) + Send + 'static>;

struct PollingRequest {
    step: Step,
    started_at: Instant,
    subscribers: Vec<CompletionCallback>,
}

struct PollerHandle {
    id: u64,
    cancel: CancellationToken,
}

struct CoordinatorState {
    active: HashMap<String, PollingRequest>,
    current_records: Arc<Vec<CaptureRecord>>,
    source: Arc<dyn RecordSource>,
    poller: Option<PollerHandle>,
    next_poller_id: u64,
}

/// Callbacks that became due while the state lock was held, run after it is released.
struct DueCompletions(Vec<(String, Vec<CompletionCallback>, Completion)>);

/// Deduplicating "ensure a video exists for this step" service.
///
/// One instance is built by the composition root and shared by cloning. All
/// pending requests are served by a single polling task that runs only while
/// at least one request is live.
#[derive(Clone)]
pub struct GenerationCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
    config: PollingConfig,
}

impl GenerationCoordinator {
    pub fn new(config: PollingConfig, source: Arc<dyn RecordSource>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CoordinatorState {
                active: HashMap::new(),
                current_records: Arc::new(Vec::new()),
                source,
                poller: None,
                next_poller_id: 0,
            })),
            config,
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Registers interest in the video of `step` and returns the request key.
    ///
    /// A live request for the same key keeps its start time; only the
    /// subscriber list changes, according to the configured policy.
    /// Must be called from within a tokio runtime.
    pub fn add_request<F>(&self, step: &Step, on_complete: F) -> String
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let key = ArtifactKey::for_step(step).request_key();
        let callback: CompletionCallback = Box::new(on_complete);

        let mut state = self.lock();
        match state.active.entry(key.clone()) {
            Entry::Occupied(mut existing) => {
                let subscribers = &mut existing.get_mut().subscribers;
                match self.config.subscriber_policy {
                    SubscriberPolicy::FanOut => subscribers.push(callback),
                    SubscriberPolicy::LastWins => *subscribers = vec![callback],
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(PollingRequest {
                    step: step.clone(),
                    started_at: Instant::now(),
                    subscribers: vec![callback],
                });
                log_info!("polling for {key}");
            }
        }
        self.ensure_polling(&mut state);
        key
    }

    /// Drops a request without notifying anyone. Returns whether it was live.
    pub fn remove_request(&self, key: &str) -> bool {
        let mut state = self.lock();
        let removed = state.active.remove(key).is_some();
        if state.active.is_empty() {
            stop_polling(&mut state);
        }
        removed
    }

    /// Replaces the record view observers have fetched themselves.
    pub fn update_current_records(&self, records: Vec<CaptureRecord>) {
        self.lock().current_records = Arc::new(records);
    }

    /// Swaps the refresh capability. The next tick uses the new source.
    pub fn set_source(&self, source: Arc<dyn RecordSource>) {
        self.lock().source = source;
    }

    /// Evaluates every live request against the current view right away.
    /// Returns how many requests reached a terminal state.
    pub fn force_check(&self) -> usize {
        let due = {
            let mut state = self.lock();
            let snapshot = state.current_records.clone();
            let due = collect_due(&mut state, &snapshot, &self.config, Instant::now());
            if state.active.is_empty() {
                stop_polling(&mut state);
            }
            due
        };
        due.deliver()
    }

    pub fn is_polling(&self) -> bool {
        self.lock().poller.is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().active.contains_key(key)
    }

    pub fn pending_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().active.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn ensure_polling(&self, state: &mut CoordinatorState) {
        if state.poller.is_some() || state.active.is_empty() {
            return;
        }
        let id = state.next_poller_id;
        state.next_poller_id += 1;
        let cancel = CancellationToken::new();
        state.poller = Some(PollerHandle {
            id,
            cancel: cancel.clone(),
        });
        tokio::spawn(polling_loop(self.clone(), id, cancel));
    }

    pub(super) fn source(&self) -> Arc<dyn RecordSource> {
        self.lock().source.clone()
    }

    /// Second half of a tick, after the refresh has finished.
    ///
    /// Returns `false` once this poller should exit: it was cancelled, or the
    /// live set drained and the poller slot was released.
    pub(super) fn finish_tick(
        &self,
        poller_id: u64,
        cancel: &CancellationToken,
        refreshed: Option<Vec<CaptureRecord>>,
    ) -> bool {
        let (due, keep_running) = {
            let mut state = self.lock();
            if cancel.is_cancelled() {
                return false;
            }
            if let Some(records) = refreshed {
                state.current_records = Arc::new(records);
            }
            let snapshot = state.current_records.clone();
            let due = collect_due(&mut state, &snapshot, &self.config, Instant::now());

            let keep_running = !state.active.is_empty();
            if !keep_running && state.poller.as_ref().map(|p| p.id) == Some(poller_id) {
                state.poller = None;
            }
            (due, keep_running)
        };
        due.deliver();
        keep_running
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn stop_polling(state: &mut CoordinatorState) {
    if let Some(poller) = state.poller.take() {
        poller.cancel.cancel();
    }
}

fn collect_due(
    state: &mut CoordinatorState,
    records: &[CaptureRecord],
    config: &PollingConfig,
    now: Instant,
) -> DueCompletions {
    let max_duration = config.max_duration();
    let mut outcomes = Vec::new();
    for (key, request) in &state.active {
        if now.duration_since(request.started_at) >= max_duration {
            outcomes.push((key.clone(), Completion::TimedOut));
            continue;
        }
        let found = match_step_videos(&request.step, records);
        if !found.is_empty() {
            outcomes.push((key.clone(), Completion::Found(found.into_iter().cloned().collect())));
        }
    }

    let mut due = Vec::with_capacity(outcomes.len());
    for (key, completion) in outcomes {
        if let Some(request) = state.active.remove(&key) {
            due.push((key, request.subscribers, completion));
        }
    }
    DueCompletions(due)
}

impl DueCompletions {
    fn deliver(self) -> usize {
        let count = self.0.len();
        for (key, subscribers, completion) in self.0 {
            match &completion {
                Completion::Found(records) => log_info!("{key} completed with {} video(s)", records.len()),
                Completion::TimedOut => log_info!("{key} timed out without a video"),
            }
            for callback in subscribers {
                let outcome = completion.clone();
                if catch_unwind(AssertUnwindSafe(move || callback(outcome))).is_err() {
                    log_error!("completion callback for {key} panicked");
                }
            }
        }
        count
    }
}
