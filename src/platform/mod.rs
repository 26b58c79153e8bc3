//! Platform capability ports
//!
//! The orchestrator never talks to a concrete speech/recording runtime
//! directly. Every platform surface (microphone acquisition, continuous
//! recognition, chunked recording, audio analysis, synthesis playback) is a
//! trait implemented by an injected adapter, so the core logic stays free of
//! platform-presence branching.

pub mod loopback;

use crate::capture::CaptureError;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capability snapshot probed once at startup and consumed by the
/// transcription strategy selector.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Continuous incremental speech-to-text is available
    pub has_continuous_recognition: bool,
    /// Buffered chunked recording is available
    pub has_chunked_recording: bool,
    /// Engine family, used by the recording-format decision table
    pub engine_class: EngineClass,
    /// Container formats the chunked recorder can produce
    pub supported_formats: Vec<RecordingFormat>,
}

/// Engine family classification for format preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineClass {
    /// iOS/Safari-class engines (prefer the mp4/aac family)
    AppleWebKit,
    Other,
}

/// Container format for buffered recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingFormat {
    Mp4Aac,
    WebmOpus,
    /// Raw 16-bit PCM (16kHz mono); wrapped into WAV before submission
    Pcm,
}

impl RecordingFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            RecordingFormat::Mp4Aac => "audio/mp4",
            RecordingFormat::WebmOpus => "audio/webm",
            RecordingFormat::Pcm => "audio/wav",
        }
    }
}

/// An available audio-input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInputDevice {
    pub id: String,
    pub label: String,
}

/// Microphone permission state, where the platform exposes one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

/// Media-stream acquisition and device enumeration
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request microphone access. `preferred` is a device-id *preference*,
    /// not a hard constraint; adapters fall back to the default device when
    /// the exact id is unavailable.
    async fn acquire(&self, preferred: Option<&str>)
        -> Result<Box<dyn MediaStreamHandle>, CaptureError>;

    /// List available audio-input devices
    async fn enumerate(&self) -> Result<Vec<AudioInputDevice>, CaptureError>;

    /// Permission-state probe; `None` when the platform has no such API
    async fn permission_state(&self) -> Option<PermissionState>;
}

/// An acquired microphone stream. Stopping tracks must be safe to call more
/// than once.
pub trait MediaStreamHandle: Send + Sync {
    fn id(&self) -> &str;
    fn stop_tracks(&self);
    fn is_active(&self) -> bool;
}

/// Event emitted by a continuous recognition engine. Engine termination is
/// signalled by the event channel closing.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    Started,
    /// Incremental result: a finalized chunk (possibly empty) plus the
    /// current interim text, which replaces any previous interim text
    Result { finalized: String, interim: String },
    Error(RecognitionErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Transient; swallowed, the engine restarts
    NoSpeech,
    /// Transient; swallowed
    Aborted,
    /// Terminal: permission denied
    NotAllowed,
    /// Terminal: microphone could not be started
    AudioCapture,
    /// Terminal: blocked by device/enterprise policy
    ServiceNotAllowed,
    /// Surfaced but non-terminal
    Network,
}

/// Continuous on-device speech recognition. Each `start` yields a fresh
/// event stream; some engines silently stop after a timeout, so callers
/// restart while the user still intends to record.
#[async_trait::async_trait]
pub trait RecognitionEngine: Send + Sync {
    async fn start(&self, lang: &str) -> Result<mpsc::Receiver<RecognitionEvent>, CaptureError>;
    async fn stop(&self);
}

/// Event emitted by a chunked recorder
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    Data(Vec<u8>),
    Stopped,
    Error(String),
}

/// Buffered recording unavailable at construction time. Triggers the
/// permanent strategy fallback to on-device recognition.
#[derive(Debug, Clone, thiserror::Error)]
#[error("chunked recorder init failed: {0}")]
pub struct RecorderInitError(pub String);

/// A running chunked recorder
#[async_trait::async_trait]
pub trait ChunkRecorder: Send + Sync {
    /// Ask the recorder to flush buffered data as a `Data` event
    async fn request_flush(&self);
    /// Stop recording; the recorder emits any final data then `Stopped`
    async fn stop(&self);
}

/// Probes format support and constructs recorders over an acquired stream
#[async_trait::async_trait]
pub trait ChunkRecorderFactory: Send + Sync {
    fn is_format_supported(&self, format: RecordingFormat) -> bool;

    /// `format: None` records in the engine's default format (raw PCM for
    /// the loopback adapter).
    async fn create(
        &self,
        stream: &dyn MediaStreamHandle,
        format: Option<RecordingFormat>,
        timeslice_ms: u64,
    ) -> Result<(Box<dyn ChunkRecorder>, mpsc::Receiver<RecorderEvent>), RecorderInitError>;
}

/// Frequency-domain audio analysis for the level meter. Emits one byte-bin
/// frame per analysis tick.
#[async_trait::async_trait]
pub trait LevelAnalyser: Send + Sync {
    async fn start(
        &self,
        stream: &dyn MediaStreamHandle,
    ) -> Result<mpsc::Receiver<Vec<u8>>, CaptureError>;

    /// Must disconnect the analysis graph and stop the tick loop; leaking
    /// either drains battery on mobile.
    async fn stop(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("speech playback is not supported on this platform")]
    Unsupported,
    #[error("playback failed: {0}")]
    Failed(String),
}

/// Control over one active playback. At most one handle is audible per
/// player; starting a new playback tears the previous handle down first.
#[async_trait::async_trait]
pub trait PlaybackHandle: Send + Sync {
    async fn pause(&mut self);
    async fn resume(&mut self);
    async fn stop(&mut self);
    fn is_active(&self) -> bool;
}

/// On-device speech synthesis
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn is_supported(&self) -> bool;
    async fn speak(&self, text: &str) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

/// Plays a remote-synthesized audio buffer (e.g. MPEG bytes)
#[async_trait::async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, audio: Vec<u8>) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

/// Bundle of platform adapters injected into the orchestrator
#[derive(Clone)]
pub struct Platform {
    pub capabilities: Capabilities,
    pub devices: Arc<dyn MediaDevices>,
    pub recognition: Arc<dyn RecognitionEngine>,
    pub recorder_factory: Arc<dyn ChunkRecorderFactory>,
    pub analyser: Arc<dyn LevelAnalyser>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub sink: Arc<dyn AudioSink>,
}

impl Platform {
    /// Deterministic in-memory platform for local runs and tests
    pub fn loopback() -> Self {
        use loopback::*;

        Self {
            capabilities: Capabilities {
                has_continuous_recognition: true,
                has_chunked_recording: true,
                engine_class: EngineClass::Other,
                supported_formats: vec![RecordingFormat::WebmOpus, RecordingFormat::Pcm],
            },
            devices: Arc::new(LoopbackDevices::new()),
            recognition: Arc::new(ScriptedRecognition::new()),
            recorder_factory: Arc::new(LoopbackRecorderFactory::new()),
            analyser: Arc::new(LoopbackAnalyser::new()),
            synthesizer: Arc::new(LoopbackSynth::new(true)),
            sink: Arc::new(LoopbackSink::new()),
        }
    }
}
