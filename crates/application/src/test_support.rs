//! Shared fakes for service tests

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::{Adjustment, ConversionRequest, RunId, WorkItem, WorkItemId};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::error::ApplicationError;
use crate::ports::{
    CheckpointPort, CheckpointState, ProgressEvent, ProgressSink, SpeechSynthesisPort,
};
use crate::services::catalog::{CatalogConfig, FileCatalog};
use crate::services::conversion::{ConversionClient, ConversionSettings};

pub const MIN_OUTPUT_BYTES: u64 = 1024;

/// Scripted reply of the fake speech service
#[derive(Debug, Clone)]
pub enum FakeReply {
    Audio(usize),
    Error(&'static str),
    Panic,
}

/// Speech service answering from per-text scripts, 2 KiB of audio by default
#[derive(Debug, Default)]
pub struct FakeSpeech {
    scripts: Mutex<HashMap<String, VecDeque<FakeReply>>>,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, text: &str, replies: Vec<FakeReply>) -> Self {
        self.scripts
            .lock()
            .insert(text.to_string(), replies.into_iter().collect());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self, text: &str) -> u32 {
        self.calls.lock().get(text).copied().unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesisPort for FakeSpeech {
    async fn synthesize(&self, request: &ConversionRequest) -> Result<Vec<u8>, ApplicationError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .entry(request.text().to_string())
            .or_insert(0) += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .scripts
            .lock()
            .get_mut(request.text())
            .and_then(VecDeque::pop_front)
            .unwrap_or(FakeReply::Audio(2048));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            FakeReply::Audio(len) => Ok(vec![0u8; len]),
            FakeReply::Error(msg) => Err(ApplicationError::ExternalService(msg.to_string())),
            FakeReply::Panic => panic!("fake speech panic"),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// In-memory checkpoint store
#[derive(Debug, Default)]
pub struct MemoryCheckpoint {
    state: Mutex<Option<CheckpointState>>,
    released: AtomicBool,
}

impl MemoryCheckpoint {
    /// No checkpoint present
    pub fn empty() -> Self {
        Self::default()
    }

    /// Checkpoint of an active run
    pub fn begun() -> Self {
        let store = Self::default();
        *store.state.lock() = Some(CheckpointState::new(RunId::new()));
        store
    }

    /// Checkpoint left behind by an unfinished run
    pub fn unfinished(completed: &[&str]) -> Self {
        let store = Self::begun();
        if let Some(state) = store.state.lock().as_mut() {
            state.completed = completed
                .iter()
                .map(|id| WorkItemId::new(*id).unwrap())
                .collect();
        }
        store
    }

    pub fn exists(&self) -> bool {
        self.state.lock().is_some()
    }

    pub fn was_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn completed_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .as_ref()
            .map(|state| state.completed.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CheckpointPort for MemoryCheckpoint {
    async fn load(&self) -> Result<Option<CheckpointState>, ApplicationError> {
        Ok(self.state.lock().clone())
    }

    async fn begin(&self, run_id: RunId) -> Result<CheckpointState, ApplicationError> {
        let mut state = self.state.lock();
        Ok(state
            .get_or_insert_with(|| CheckpointState::new(run_id))
            .clone())
    }

    async fn record_completed(&self, id: &WorkItemId) -> Result<(), ApplicationError> {
        self.state
            .lock()
            .as_mut()
            .map(|state| {
                state.completed.insert(id.clone());
            })
            .ok_or_else(|| ApplicationError::Checkpoint("no active checkpoint".to_string()))
    }

    async fn release(&self) -> Result<(), ApplicationError> {
        self.state.lock().take();
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Progress sink remembering every event
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }
}

impl ProgressSink for CollectingSink {
    fn handle(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Temporary input and output directories with one text file per id
#[derive(Debug)]
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Source text of each item equals its id
    pub fn with_items(ids: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        for id in ids {
            std::fs::write(dir.path().join("in").join(format!("{id}.txt")), id).unwrap();
        }
        Self { dir }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.dir.path().join("in")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn output(&self, id: &str) -> PathBuf {
        self.output_dir().join(format!("{id}.mp3"))
    }

    pub fn write_output(&self, id: &str, len: usize) {
        std::fs::write(self.output(id), vec![0u8; len]).unwrap();
    }

    pub fn catalog(&self) -> FileCatalog {
        FileCatalog::new(CatalogConfig {
            input_dir: self.input_dir(),
            output_dir: self.output_dir(),
            text_extension: "txt".to_string(),
            audio_extension: "mp3".to_string(),
        })
    }

    /// Items in natural order, all pending
    pub fn items(&self) -> Vec<WorkItem> {
        let mut names: Vec<PathBuf> = std::fs::read_dir(self.input_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        names.sort_by(|a, b| {
            domain::natural_cmp(
                a.file_name().unwrap().to_str().unwrap(),
                b.file_name().unwrap().to_str().unwrap(),
            )
        });
        names
            .into_iter()
            .map(|path| WorkItem::new(path, &self.output_dir(), "mp3").unwrap())
            .collect()
    }

    pub fn settings() -> ConversionSettings {
        ConversionSettings {
            voice: "zh-CN-XiaoxiaoNeural".to_string(),
            rate: Adjustment::NEUTRAL,
            volume: Adjustment::NEUTRAL,
            min_output_bytes: MIN_OUTPUT_BYTES,
        }
    }

    pub fn client(&self, speech: Arc<dyn SpeechSynthesisPort>) -> ConversionClient {
        ConversionClient::new(speech, Self::settings())
    }

    pub fn completed_set(ids: &[&str]) -> BTreeSet<WorkItemId> {
        ids.iter().map(|id| WorkItemId::new(*id).unwrap()).collect()
    }
}
