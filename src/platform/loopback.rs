//! Deterministic in-memory platform adapter
//!
//! Stands in for a real speech/recording runtime during local development
//! and in tests: recognition events are scripted, recorder chunks are
//! configured byte patterns, analyser frames are fixed. Every component
//! records enough bookkeeping (acquire counts, stop counts, chosen formats)
//! for tests to assert resource lifecycles.

use super::{
    AudioInputDevice, AudioSink, ChunkRecorder, ChunkRecorderFactory, LevelAnalyser, MediaDevices,
    MediaStreamHandle, PermissionState, PlaybackError, PlaybackHandle, RecognitionEngine,
    RecognitionEvent, RecorderEvent, RecorderInitError, RecordingFormat, SpeechSynthesizer,
};
use crate::capture::CaptureError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================================
// Media stream + devices
// ============================================================================

struct StreamInner {
    id: String,
    active: AtomicBool,
    stop_count: AtomicUsize,
}

/// Cheaply cloneable stream handle; clones share the same track state
#[derive(Clone)]
pub struct LoopbackStream(Arc<StreamInner>);

impl LoopbackStream {
    fn new(id: String) -> Self {
        Self(Arc::new(StreamInner {
            id,
            active: AtomicBool::new(true),
            stop_count: AtomicUsize::new(0),
        }))
    }

    /// How many times the underlying track was actually stopped
    pub fn stop_count(&self) -> usize {
        self.0.stop_count.load(Ordering::SeqCst)
    }
}

impl MediaStreamHandle for LoopbackStream {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn stop_tracks(&self) {
        // Stopping an already-stopped track is a no-op
        if self.0.active.swap(false, Ordering::SeqCst) {
            self.0.stop_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.0.active.load(Ordering::SeqCst)
    }
}

pub struct LoopbackDevices {
    devices: Mutex<Vec<AudioInputDevice>>,
    permission: Mutex<Option<PermissionState>>,
    fail_next: Mutex<Option<CaptureError>>,
    last: Mutex<Option<LoopbackStream>>,
    acquires: AtomicUsize,
}

impl LoopbackDevices {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(vec![AudioInputDevice {
                id: "loopback-0".to_string(),
                label: "Loopback Microphone".to_string(),
            }]),
            permission: Mutex::new(Some(PermissionState::Granted)),
            fail_next: Mutex::new(None),
            last: Mutex::new(None),
            acquires: AtomicUsize::new(0),
        }
    }

    pub fn set_devices(&self, devices: Vec<AudioInputDevice>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn set_permission(&self, state: Option<PermissionState>) {
        *self.permission.lock().unwrap() = state;
    }

    /// Make the next `acquire` fail with the given error
    pub fn fail_next_acquire(&self, err: CaptureError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    /// Handle to the most recently acquired stream (shared track state)
    pub fn last_stream(&self) -> Option<LoopbackStream> {
        self.last.lock().unwrap().clone()
    }

    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MediaDevices for LoopbackDevices {
    async fn acquire(
        &self,
        preferred: Option<&str>,
    ) -> Result<Box<dyn MediaStreamHandle>, CaptureError> {
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }

        // Preference, not a constraint: unknown ids fall back to the default
        let known: Vec<AudioInputDevice> = self.devices.lock().unwrap().clone();
        let id = preferred
            .filter(|p| known.iter().any(|d| d.id == *p))
            .unwrap_or("loopback-0");

        let stream = LoopbackStream::new(format!("stream-{}", id));
        *self.last.lock().unwrap() = Some(stream.clone());
        self.acquires.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(stream))
    }

    async fn enumerate(&self) -> Result<Vec<AudioInputDevice>, CaptureError> {
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn permission_state(&self) -> Option<PermissionState> {
        *self.permission.lock().unwrap()
    }
}

// ============================================================================
// Scripted recognition engine
// ============================================================================

/// Recognition engine driven by a script: each `start` pops the next run of
/// events, plays it back, then ends (channel close), mimicking engines that
/// silently stop after a timeout.
pub struct ScriptedRecognition {
    script: Mutex<VecDeque<Vec<RecognitionEvent>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedRecognition {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Queue one engine run (the events delivered before the engine ends)
    pub fn push_run(&self, events: Vec<RecognitionEvent>) {
        self.script.lock().unwrap().push_back(events);
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedRecognition {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RecognitionEngine for ScriptedRecognition {
    async fn start(&self, _lang: &str) -> Result<mpsc::Receiver<RecognitionEvent>, CaptureError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let run = self.script.lock().unwrap().pop_front().unwrap_or_default();

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let _ = tx.send(RecognitionEvent::Started).await;
            for event in run {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            // Dropping tx closes the channel: the engine has ended
        });

        Ok(rx)
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Chunked recorder
// ============================================================================

pub struct LoopbackRecorderFactory {
    supported: Mutex<Vec<RecordingFormat>>,
    initial_chunks: Mutex<Vec<Vec<u8>>>,
    flush_chunk: Mutex<Option<Vec<u8>>>,
    fail_create: Mutex<Option<String>>,
    last_format: Mutex<Option<Option<RecordingFormat>>>,
    created: AtomicUsize,
}

impl LoopbackRecorderFactory {
    pub fn new() -> Self {
        Self {
            supported: Mutex::new(vec![RecordingFormat::WebmOpus, RecordingFormat::Pcm]),
            initial_chunks: Mutex::new(vec![vec![0u8; 2048]]),
            flush_chunk: Mutex::new(None),
            fail_create: Mutex::new(None),
            last_format: Mutex::new(None),
            created: AtomicUsize::new(0),
        }
    }

    pub fn set_supported(&self, formats: Vec<RecordingFormat>) {
        *self.supported.lock().unwrap() = formats;
    }

    /// Data chunks delivered as soon as recording starts
    pub fn set_chunks(&self, chunks: Vec<Vec<u8>>) {
        *self.initial_chunks.lock().unwrap() = chunks;
    }

    /// Chunk delivered only in response to a flush request
    pub fn set_flush_chunk(&self, chunk: Option<Vec<u8>>) {
        *self.flush_chunk.lock().unwrap() = chunk;
    }

    pub fn fail_creation(&self, reason: &str) {
        *self.fail_create.lock().unwrap() = Some(reason.to_string());
    }

    /// Format requested by the most recent `create` call
    pub fn last_format(&self) -> Option<Option<RecordingFormat>> {
        *self.last_format.lock().unwrap()
    }

    pub fn create_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackRecorderFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChunkRecorderFactory for LoopbackRecorderFactory {
    fn is_format_supported(&self, format: RecordingFormat) -> bool {
        self.supported.lock().unwrap().contains(&format)
    }

    async fn create(
        &self,
        _stream: &dyn MediaStreamHandle,
        format: Option<RecordingFormat>,
        _timeslice_ms: u64,
    ) -> Result<(Box<dyn ChunkRecorder>, mpsc::Receiver<RecorderEvent>), RecorderInitError> {
        if let Some(reason) = self.fail_create.lock().unwrap().clone() {
            return Err(RecorderInitError(reason));
        }

        *self.last_format.lock().unwrap() = Some(format);
        self.created.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(32);

        let initial = self.initial_chunks.lock().unwrap().clone();
        let initial_tx = tx.clone();
        tokio::spawn(async move {
            for chunk in initial {
                if initial_tx.send(RecorderEvent::Data(chunk)).await.is_err() {
                    break;
                }
            }
        });

        let recorder = LoopbackRecorder {
            tx,
            flush_chunk: self.flush_chunk.lock().unwrap().clone(),
            stopped: AtomicBool::new(false),
        };

        Ok((Box::new(recorder), rx))
    }
}

struct LoopbackRecorder {
    tx: mpsc::Sender<RecorderEvent>,
    flush_chunk: Option<Vec<u8>>,
    stopped: AtomicBool,
}

#[async_trait::async_trait]
impl ChunkRecorder for LoopbackRecorder {
    async fn request_flush(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        if let Some(chunk) = self.flush_chunk.clone() {
            let _ = self.tx.send(RecorderEvent::Data(chunk)).await;
        }
    }

    async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(RecorderEvent::Stopped).await;
    }
}

// ============================================================================
// Level analyser
// ============================================================================

pub struct LoopbackAnalyser {
    frames: Mutex<Vec<Vec<u8>>>,
    stops: AtomicUsize,
}

impl LoopbackAnalyser {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn set_frames(&self, frames: Vec<Vec<u8>>) {
        *self.frames.lock().unwrap() = frames;
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LevelAnalyser for LoopbackAnalyser {
    async fn start(
        &self,
        _stream: &dyn MediaStreamHandle,
    ) -> Result<mpsc::Receiver<Vec<u8>>, CaptureError> {
        let frames = self.frames.lock().unwrap().clone();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            for frame in frames {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Playback
// ============================================================================

/// Playback handle whose active flag is shared with the creating backend so
/// tests can observe teardown.
pub struct LoopbackHandle {
    active: Arc<AtomicBool>,
}

impl LoopbackHandle {
    fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(true));
        (
            Self {
                active: Arc::clone(&flag),
            },
            flag,
        )
    }
}

#[async_trait::async_trait]
impl PlaybackHandle for LoopbackHandle {
    async fn pause(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    async fn resume(&mut self) {
        self.active.store(true, Ordering::SeqCst);
    }

    async fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct LoopbackSynth {
    supported: bool,
    spoken: Mutex<Vec<String>>,
    handles: Mutex<Vec<Arc<AtomicBool>>>,
}

impl LoopbackSynth {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            spoken: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// How many previously issued handles are still active
    pub fn active_count(&self) -> usize {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for LoopbackSynth {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn speak(&self, text: &str) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        if !self.supported {
            return Err(PlaybackError::Unsupported);
        }
        self.spoken.lock().unwrap().push(text.to_string());
        let (handle, flag) = LoopbackHandle::new();
        self.handles.lock().unwrap().push(flag);
        Ok(Box::new(handle))
    }
}

pub struct LoopbackSink {
    played: Mutex<Vec<usize>>,
    handles: Mutex<Vec<Arc<AtomicBool>>>,
}

impl LoopbackSink {
    pub fn new() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Byte sizes of the buffers handed to the sink
    pub fn played_sizes(&self) -> Vec<usize> {
        self.played.lock().unwrap().clone()
    }

    pub fn active_count(&self) -> usize {
        self.handles
            .lock()
            .unwrap()
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }
}

impl Default for LoopbackSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AudioSink for LoopbackSink {
    async fn play(&self, audio: Vec<u8>) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        self.played.lock().unwrap().push(audio.len());
        let (handle, flag) = LoopbackHandle::new();
        self.handles.lock().unwrap().push(flag);
        Ok(Box::new(handle))
    }
}
