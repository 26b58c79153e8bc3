use super::TranscribeError;
use crate::config::CaptureTuning;
use crate::platform::{
    Capabilities, ChunkRecorder, ChunkRecorderFactory, EngineClass, MediaStreamHandle,
    RecorderEvent, RecorderInitError, RecordingFormat,
};
use base64::Engine;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A finished buffered recording, validated and ready for submission
#[derive(Debug, Clone)]
pub struct RecordedUtterance {
    pub audio_base64: String,
    pub duration_seconds: f64,
    pub format: Option<RecordingFormat>,
}

/// Recording-format decision table. Probed in a fixed preference order:
/// Apple/WebKit-class engines get the mp4/aac family, everything else
/// webm/opus, and when neither is supported the recorder runs in its
/// default format (raw PCM here, WAV-wrapped before submission).
pub fn pick_format(
    capabilities: &Capabilities,
    factory: &dyn ChunkRecorderFactory,
) -> Option<RecordingFormat> {
    if capabilities.engine_class == EngineClass::AppleWebKit
        && factory.is_format_supported(RecordingFormat::Mp4Aac)
    {
        return Some(RecordingFormat::Mp4Aac);
    }
    if factory.is_format_supported(RecordingFormat::WebmOpus) {
        return Some(RecordingFormat::WebmOpus);
    }
    None
}

/// One buffered capture for remote transcription.
///
/// Chunks are collected for the lifetime of the capture and concatenated
/// into a single payload on `finish`. Stopping is a two-phase, best-effort
/// protocol: request a final flush, wait a short fixed delay, then force
/// stop, because some recorders only deliver the last chunk asynchronously
/// after a flush request.
pub struct RemoteCapture {
    recorder: Box<dyn ChunkRecorder>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    collector: Option<JoinHandle<()>>,
    format: Option<RecordingFormat>,
    started_at: tokio::time::Instant,
    tuning: CaptureTuning,
}

impl RemoteCapture {
    /// Construct and start recording. A construction failure here means
    /// buffered recording is unusable and the caller falls back permanently
    /// to on-device recognition.
    pub async fn start(
        factory: &dyn ChunkRecorderFactory,
        stream: &dyn MediaStreamHandle,
        capabilities: &Capabilities,
        tuning: &CaptureTuning,
    ) -> Result<Self, RecorderInitError> {
        let format = pick_format(capabilities, factory);
        debug!("buffered recording format: {:?}", format);

        let (recorder, events) = factory.create(stream, format, tuning.timeslice_ms).await?;

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let collector = Some(spawn_collector(events, Arc::clone(&chunks)));

        Ok(Self {
            recorder,
            chunks,
            collector,
            format,
            started_at: tokio::time::Instant::now(),
            tuning: tuning.clone(),
        })
    }

    /// Seconds elapsed since recording started
    pub fn elapsed_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Stop recording and assemble the payload. Rejects client-side, before
    /// any network call, when the capture is certain to fail server-side
    /// (too short or too small).
    pub async fn finish(mut self) -> Result<RecordedUtterance, TranscribeError> {
        let duration_seconds = self.elapsed_seconds();

        // Two-phase stop: flush, wait for the async final chunk, force stop
        self.recorder.request_flush().await;
        tokio::time::sleep(Duration::from_millis(self.tuning.stop_flush_delay_ms)).await;
        self.recorder.stop().await;

        if let Some(collector) = self.collector.take() {
            let _ = collector.await;
        }

        let payload: Vec<u8> = {
            let chunks = self.chunks.lock().unwrap();
            chunks.iter().flat_map(|c| c.iter().copied()).collect()
        };

        info!(
            "buffered capture finished: {} bytes, {:.2}s, {}",
            payload.len(),
            duration_seconds,
            self.format.map_or("audio/wav", |f| f.mime_type())
        );

        if duration_seconds < self.tuning.min_utterance_secs {
            return Err(TranscribeError::TooShort {
                secs: duration_seconds,
                min: self.tuning.min_utterance_secs,
            });
        }
        if payload.len() < self.tuning.min_payload_bytes {
            return Err(TranscribeError::TooSmall {
                bytes: payload.len(),
                min: self.tuning.min_payload_bytes,
            });
        }

        // Raw PCM (no explicit container) is wrapped into WAV so the
        // transcription service receives a self-describing payload
        let payload = match self.format {
            None | Some(RecordingFormat::Pcm) => wrap_wav(&payload)?,
            Some(_) => payload,
        };

        Ok(RecordedUtterance {
            audio_base64: base64::engine::general_purpose::STANDARD.encode(&payload),
            duration_seconds,
            format: self.format,
        })
    }

    /// Stop recording and discard everything (teardown path)
    pub async fn abort(mut self) {
        self.recorder.stop().await;
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
    }
}

impl Drop for RemoteCapture {
    fn drop(&mut self) {
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
    }
}

fn spawn_collector(
    mut events: mpsc::Receiver<RecorderEvent>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RecorderEvent::Data(data) => {
                    if !data.is_empty() {
                        chunks.lock().unwrap().push(data);
                    }
                }
                RecorderEvent::Stopped => break,
                RecorderEvent::Error(e) => {
                    warn!("recorder error: {}", e);
                    break;
                }
            }
        }
    })
}

/// Wrap raw 16kHz mono i16 PCM into a WAV container
fn wrap_wav(pcm: &[u8]) -> Result<Vec<u8>, TranscribeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| TranscribeError::Encode(e.to_string()))?;
        for sample in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(|e| TranscribeError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| TranscribeError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
