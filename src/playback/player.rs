use super::backend::PlaybackBackend;
use super::segment::{split_sentences, tail_from};
use crate::platform::PlaybackHandle;
use std::sync::Arc;
use tracing::{debug, warn};

/// Speech playback controller.
///
/// Holds at most one active playback handle; starting a new `play` tears
/// the previous one down first (cancel and release), so two overlapping
/// audible streams are impossible. Platform failures are logged and
/// swallowed — playback never throws into the UI layer.
pub struct Player {
    backend: Arc<dyn PlaybackBackend>,
    active: Option<Box<dyn PlaybackHandle>>,
    segments: Vec<String>,
    position: usize,
}

impl Player {
    pub fn new(backend: Arc<dyn PlaybackBackend>) -> Self {
        Self {
            backend,
            active: None,
            segments: Vec::new(),
            position: 0,
        }
    }

    pub async fn play(&mut self, text: &str) {
        self.teardown().await;

        if !self.backend.is_supported() {
            warn!("speech playback unsupported; skipping");
            return;
        }

        self.segments = split_sentences(text);
        self.position = 0;
        self.start_from(0).await;
    }

    /// Play from the chosen sentence through the end of the text. The index
    /// is clamped to the valid range.
    pub async fn seek_to_segment(&mut self, index: usize) {
        if self.segments.is_empty() {
            return;
        }

        self.teardown().await;
        let clamped = index.min(self.segments.len() - 1);
        self.start_from(clamped).await;
    }

    pub async fn pause(&mut self) {
        if let Some(handle) = &mut self.active {
            handle.pause().await;
        }
    }

    pub async fn resume(&mut self) {
        if let Some(handle) = &mut self.active {
            handle.resume().await;
        }
    }

    pub async fn stop(&mut self) {
        self.teardown().await;
    }

    pub fn is_playing(&self) -> bool {
        self.active.as_ref().is_some_and(|h| h.is_active())
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    async fn start_from(&mut self, index: usize) {
        let body = tail_from(&self.segments, index);
        if body.is_empty() {
            return;
        }

        match self.backend.begin(&body).await {
            Ok(handle) => {
                debug!("playback started from segment {}", index);
                self.active = Some(handle);
                self.position = index;
            }
            Err(e) => {
                // Degrade gracefully; the reply text is already on screen
                warn!("playback failed: {}", e);
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut handle) = self.active.take() {
            handle.stop().await;
        }
    }
}
