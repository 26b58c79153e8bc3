use crate::api::ApiClient;
use crate::platform::{AudioSink, PlaybackError, PlaybackHandle, SpeechSynthesizer};
use std::sync::Arc;

/// A playback source. One backend is active per deployment variant; it is
/// not switched mid-session.
#[async_trait::async_trait]
pub trait PlaybackBackend: Send + Sync {
    fn is_supported(&self) -> bool;
    async fn begin(&self, text: &str) -> Result<Box<dyn PlaybackHandle>, PlaybackError>;
}

/// On-device synthesis: immediate and free
pub struct OnDeviceSpeechBackend {
    synth: Arc<dyn SpeechSynthesizer>,
}

impl OnDeviceSpeechBackend {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synth }
    }
}

#[async_trait::async_trait]
impl PlaybackBackend for OnDeviceSpeechBackend {
    fn is_supported(&self) -> bool {
        self.synth.is_supported()
    }

    async fn begin(&self, text: &str) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        self.synth.speak(text).await
    }
}

/// Remote-synthesized speech: fetch an audio buffer from the TTS endpoint
/// and hand it to the audio sink. Higher quality, costs a request.
pub struct RemoteTtsBackend {
    api: Arc<ApiClient>,
    sink: Arc<dyn AudioSink>,
}

impl RemoteTtsBackend {
    pub fn new(api: Arc<ApiClient>, sink: Arc<dyn AudioSink>) -> Self {
        Self { api, sink }
    }
}

#[async_trait::async_trait]
impl PlaybackBackend for RemoteTtsBackend {
    fn is_supported(&self) -> bool {
        true
    }

    async fn begin(&self, text: &str) -> Result<Box<dyn PlaybackHandle>, PlaybackError> {
        let audio = self
            .api
            .synthesize(text)
            .await
            .map_err(|e| PlaybackError::Failed(e.to_string()))?;

        self.sink.play(audio).await
    }
}
