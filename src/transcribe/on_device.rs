use super::buffer::TranscriptBuffer;
use crate::capture::CaptureError;
use crate::platform::{RecognitionEngine, RecognitionErrorKind, RecognitionEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Teardown must not leave the driver (or its restart timer) running
impl Drop for OnDeviceSession {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Event surfaced to the owner of an on-device capture
#[derive(Debug, Clone)]
pub enum OnDeviceEvent {
    /// Buffer snapshot after an incremental recognition update
    Update { finalized: String, interim: String },
    /// Terminal failure; the session has stopped itself
    Failed(CaptureError),
}

/// Continuous on-device recognition session.
///
/// Some engines silently stop after a timeout, so the driver restarts the
/// engine after a short fixed delay for as long as the user still intends
/// to record. Transient errors (no speech, aborted) are swallowed; terminal
/// errors stop the session and are reported, never retried.
pub struct OnDeviceSession {
    engine: Arc<dyn RecognitionEngine>,
    lang: String,
    restart_delay: Duration,
    intent: Arc<AtomicBool>,
    buffer: Arc<Mutex<TranscriptBuffer>>,
    task: Option<JoinHandle<()>>,
}

impl OnDeviceSession {
    pub fn new(engine: Arc<dyn RecognitionEngine>, lang: &str, restart_delay: Duration) -> Self {
        Self {
            engine,
            lang: lang.to_string(),
            restart_delay,
            intent: Arc::new(AtomicBool::new(false)),
            buffer: Arc::new(Mutex::new(TranscriptBuffer::new())),
            task: None,
        }
    }

    /// Begin recognizing. Returns the update stream; events keep flowing
    /// across engine restarts until `stop` or a terminal failure.
    pub fn start(&mut self) -> mpsc::Receiver<OnDeviceEvent> {
        let (tx, rx) = mpsc::channel(64);

        self.intent.store(true, Ordering::SeqCst);

        let engine = Arc::clone(&self.engine);
        let lang = self.lang.clone();
        let restart_delay = self.restart_delay;
        let intent = Arc::clone(&self.intent);
        let buffer = Arc::clone(&self.buffer);

        self.task = Some(tokio::spawn(async move {
            Self::drive(engine, lang, restart_delay, intent, buffer, tx).await;
        }));

        rx
    }

    /// Stop recognizing and take the accumulated transcript. Any pending
    /// restart is abandoned; the interim segment is discarded.
    pub async fn stop(&mut self) -> TranscriptBuffer {
        self.intent.store(false, Ordering::SeqCst);
        self.engine.stop().await;

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }

        let mut buffer = self.buffer.lock().await;
        buffer.set_interim("");
        buffer.clone()
    }

    pub fn is_running(&self) -> bool {
        self.intent.load(Ordering::SeqCst)
    }

    fn abort(&mut self) {
        self.intent.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    async fn drive(
        engine: Arc<dyn RecognitionEngine>,
        lang: String,
        restart_delay: Duration,
        intent: Arc<AtomicBool>,
        buffer: Arc<Mutex<TranscriptBuffer>>,
        tx: mpsc::Sender<OnDeviceEvent>,
    ) {
        while intent.load(Ordering::SeqCst) {
            let mut events = match engine.start(&lang).await {
                Ok(events) => events,
                Err(e) => {
                    intent.store(false, Ordering::SeqCst);
                    let _ = tx.send(OnDeviceEvent::Failed(e)).await;
                    return;
                }
            };

            // One engine run; ends when the event channel closes
            while let Some(event) = events.recv().await {
                match event {
                    RecognitionEvent::Started => {
                        debug!("recognition engine started");
                    }
                    RecognitionEvent::Result { finalized, interim } => {
                        let mut buf = buffer.lock().await;
                        if !finalized.is_empty() {
                            buf.append_chunk(&finalized);
                        }
                        buf.set_interim(&interim);
                        let update = OnDeviceEvent::Update {
                            finalized: buf.finalized().to_string(),
                            interim: buf.interim().to_string(),
                        };
                        drop(buf);
                        let _ = tx.send(update).await;
                    }
                    RecognitionEvent::Error(kind) => match kind {
                        // Transient; the run ends and we restart
                        RecognitionErrorKind::NoSpeech | RecognitionErrorKind::Aborted => {}
                        RecognitionErrorKind::Network => {
                            warn!("recognition network error; continuing");
                        }
                        RecognitionErrorKind::NotAllowed => {
                            intent.store(false, Ordering::SeqCst);
                            let _ = tx
                                .send(OnDeviceEvent::Failed(CaptureError::PermissionDenied {
                                    blocked: false,
                                }))
                                .await;
                            return;
                        }
                        RecognitionErrorKind::AudioCapture => {
                            intent.store(false, Ordering::SeqCst);
                            let _ = tx.send(OnDeviceEvent::Failed(CaptureError::DeviceBusy)).await;
                            return;
                        }
                        RecognitionErrorKind::ServiceNotAllowed => {
                            intent.store(false, Ordering::SeqCst);
                            let _ = tx
                                .send(OnDeviceEvent::Failed(CaptureError::Unknown(
                                    "speech recognition blocked by policy".to_string(),
                                )))
                                .await;
                            return;
                        }
                    },
                }
            }

            if !intent.load(Ordering::SeqCst) {
                break;
            }

            // Unexpected engine end while the user still wants to record:
            // restart after a short fixed delay to avoid restart storms.
            debug!("recognition engine ended unexpectedly; restarting");
            tokio::time::sleep(restart_delay).await;
        }
    }
}
