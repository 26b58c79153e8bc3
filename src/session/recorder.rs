use super::{SessionConfig, SessionStats};
use crate::api::{ApiClient, ApiError, TranscriptionOutcome};
use crate::capture::CaptureController;
use crate::level::{LevelMonitor, LevelReading};
use crate::platform::Platform;
use crate::transcribe::{
    CaptureState, CaptureStateMachine, DowngradeReason, OnDeviceEvent, OnDeviceSession,
    RemoteCapture, Strategy, StrategySelector,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The capture driver currently running, one per active recording
enum ActiveCapture {
    OnDevice(OnDeviceSession),
    Remote(RemoteCapture),
}

/// Transcription transport seam; the production implementation is `ApiClient`
#[async_trait::async_trait]
pub trait TranscribeApi: Send + Sync {
    async fn transcribe(
        &self,
        audio_base64: &str,
        session_id: &str,
        duration_seconds: f64,
    ) -> Result<TranscriptionOutcome, ApiError>;

    async fn submit_transcript(
        &self,
        session_id: &str,
        transcript: &str,
        duration_seconds: f64,
    ) -> Result<(), ApiError>;
}

#[async_trait::async_trait]
impl TranscribeApi for ApiClient {
    async fn transcribe(
        &self,
        audio_base64: &str,
        session_id: &str,
        duration_seconds: f64,
    ) -> Result<TranscriptionOutcome, ApiError> {
        ApiClient::transcribe(self, audio_base64, session_id, duration_seconds).await
    }

    async fn submit_transcript(
        &self,
        session_id: &str,
        transcript: &str,
        duration_seconds: f64,
    ) -> Result<(), ApiError> {
        ApiClient::submit_transcript(self, session_id, transcript, duration_seconds).await
    }
}

/// Orchestrates one microphone session end to end: stream acquisition,
/// level metering, strategy selection, the active transcription driver,
/// and teardown into a finalized transcript.
///
/// All mutation goes through the state machine; concurrent `start` calls
/// observe a non-restartable state and become no-ops instead of spawning
/// overlapping captures.
pub struct RecorderSession {
    config: SessionConfig,
    platform: Platform,
    api: Arc<dyn TranscribeApi>,
    state: Arc<Mutex<CaptureStateMachine>>,
    controller: Arc<Mutex<CaptureController>>,
    level: Arc<Mutex<LevelMonitor>>,
    selector: Arc<Mutex<StrategySelector>>,
    active: Arc<Mutex<Option<ActiveCapture>>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    finished_duration: Mutex<Option<f64>>,
    transcript: Arc<Mutex<String>>,
    status: Arc<Mutex<String>>,
    updates_task: Mutex<Option<JoinHandle<()>>>,
    last_strategy: Mutex<Option<Strategy>>,
}

impl RecorderSession {
    pub fn new(config: SessionConfig, platform: Platform, api: Arc<dyn TranscribeApi>) -> Self {
        let controller = CaptureController::new(Arc::clone(&platform.devices));
        let level = LevelMonitor::new(Arc::clone(&platform.analyser), config.level.clone());
        let selector = StrategySelector::new(platform.capabilities.clone());

        Self {
            config,
            platform,
            api,
            state: Arc::new(Mutex::new(CaptureStateMachine::new())),
            controller: Arc::new(Mutex::new(controller)),
            level: Arc::new(Mutex::new(level)),
            selector: Arc::new(Mutex::new(selector)),
            active: Arc::new(Mutex::new(None)),
            started_at: Mutex::new(None),
            finished_duration: Mutex::new(None),
            transcript: Arc::new(Mutex::new(String::new())),
            status: Arc::new(Mutex::new(String::new())),
            updates_task: Mutex::new(None),
            last_strategy: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Begin a capture. A no-op while a capture is already in flight; a
    /// terminal previous capture is reset and replaced.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            match state.state() {
                CaptureState::Idle => {}
                s if s.is_terminal() => state.reset(),
                s => {
                    warn!("start ignored: capture already in state {:?}", s);
                    return Ok(());
                }
            }
            state.transition(CaptureState::Acquiring)?;
        }

        self.transcript.lock().await.clear();
        self.status.lock().await.clear();
        *self.finished_duration.lock().await = None;

        info!("starting capture session {}", self.config.session_id);

        // The controller guard must not be held into `fail`, which locks the
        // controller again for release
        let acquired = self
            .controller
            .lock()
            .await
            .acquire(self.config.preferred_device.as_deref())
            .await;
        if let Err(e) = acquired {
            error!("microphone acquisition failed: {}", e);
            *self.status.lock().await = e.status_message();
            self.fail().await;
            return Err(e.into());
        }
        let stream = self
            .controller
            .lock()
            .await
            .stream()
            .context("stream missing after acquisition")?;

        // The meter is independent of the transcription strategy; a meter
        // failure degrades the UI, not the capture
        if let Err(e) = self.level.lock().await.start(&*stream).await {
            warn!("level monitor unavailable: {}", e);
        }

        let strategy = self
            .selector
            .lock()
            .await
            .select(Some(self.config.session_id.as_str()));
        *self.last_strategy.lock().await = Some(strategy);
        info!("capture strategy: {:?}", strategy);

        match strategy {
            Strategy::RemoteTranscription => {
                let started = RemoteCapture::start(
                    &*self.platform.recorder_factory,
                    &*stream,
                    &self.platform.capabilities,
                    &self.config.tuning,
                )
                .await;

                match started {
                    Ok(capture) => {
                        *self.active.lock().await = Some(ActiveCapture::Remote(capture));
                    }
                    Err(e) => {
                        warn!("buffered recording unavailable: {}", e);
                        let mut selector = self.selector.lock().await;
                        selector.downgrade(DowngradeReason::RecorderInitFailed);
                        if let Some(notice) = selector.take_notice() {
                            *self.status.lock().await = notice;
                        }
                        drop(selector);
                        // Same capture continues on the fallback strategy
                        *self.last_strategy.lock().await = Some(Strategy::OnDeviceRecognition);
                        self.start_on_device().await;
                    }
                }
            }
            Strategy::OnDeviceRecognition => {
                self.start_on_device().await;
            }
        }

        // The recognition driver may fail terminally before the capture goes
        // live; its failure handler has already torn everything down
        let mut state = self.state.lock().await;
        if state.state().is_terminal() {
            drop(state);
            let status = self.status.lock().await.clone();
            anyhow::bail!("capture failed during startup: {}", status);
        }
        state.transition(CaptureState::Active)?;
        drop(state);

        *self.started_at.lock().await = Some(Utc::now());
        Ok(())
    }

    async fn start_on_device(&self) {
        let mut session = OnDeviceSession::new(
            Arc::clone(&self.platform.recognition),
            &self.config.tuning.lang,
            Duration::from_millis(self.config.tuning.restart_delay_ms),
        );
        let mut events = session.start();
        *self.active.lock().await = Some(ActiveCapture::OnDevice(session));

        let state = Arc::clone(&self.state);
        let status = Arc::clone(&self.status);
        let transcript = Arc::clone(&self.transcript);
        let level = Arc::clone(&self.level);
        let controller = Arc::clone(&self.controller);
        let active = Arc::clone(&self.active);

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    OnDeviceEvent::Update { finalized, interim } => {
                        let mut live = transcript.lock().await;
                        live.clear();
                        live.push_str(finalized.trim_end());
                        if !interim.trim().is_empty() {
                            if !live.is_empty() {
                                live.push(' ');
                            }
                            live.push_str(interim.trim());
                        }
                    }
                    OnDeviceEvent::Failed(e) => {
                        error!("on-device recognition failed: {}", e);
                        *status.lock().await = e.status_message();

                        // A terminal failure releases the mic and the meter
                        // just like an explicit stop; the state goes terminal
                        // only after teardown so nothing stays hot
                        level.lock().await.stop().await;
                        let taken = active.lock().await.take();
                        if let Some(ActiveCapture::OnDevice(mut session)) = taken {
                            let _ = session.stop().await;
                        }
                        controller.lock().await.release();

                        let mut state = state.lock().await;
                        if !state.state().is_terminal() {
                            let _ = state.transition(CaptureState::Failed);
                        }
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.updates_task.lock().await.replace(task) {
            previous.abort();
        }
    }

    /// Stop the capture and resolve the final transcript. For buffered
    /// recordings this submits the payload to the backend; for on-device
    /// recognition it drains the accumulated buffer.
    pub async fn stop(&self) -> Result<SessionStats> {
        {
            let mut state = self.state.lock().await;
            if state.state() != CaptureState::Active {
                warn!("stop ignored: capture in state {:?}", state.state());
                drop(state);
                return Ok(self.stats().await);
            }
            state.transition(CaptureState::Stopping)?;
        }

        self.level.lock().await.stop().await;

        let active = self.active.lock().await.take();
        match active {
            Some(ActiveCapture::OnDevice(mut session)) => {
                let buffer = session.stop().await;
                *self.transcript.lock().await = buffer.full_text();
                self.record_duration().await;
                // The drain task may have failed the capture mid-stop
                let mut state = self.state.lock().await;
                if state.state() == CaptureState::Stopping {
                    state.transition(CaptureState::Complete)?;
                }
            }
            Some(ActiveCapture::Remote(capture)) => {
                self.state
                    .lock()
                    .await
                    .transition(CaptureState::Transcribing)?;

                match capture.finish().await {
                    Ok(utterance) => {
                        *self.finished_duration.lock().await = Some(utterance.duration_seconds);
                        self.submit_recording(utterance).await?;
                    }
                    Err(e) => {
                        warn!("recording rejected: {}", e);
                        *self.status.lock().await = e.to_string();
                        self.record_duration().await;
                        self.state.lock().await.transition(CaptureState::Failed)?;
                    }
                }
            }
            None => {
                self.record_duration().await;
                let mut state = self.state.lock().await;
                if state.state() == CaptureState::Stopping {
                    state.transition(CaptureState::Complete)?;
                }
            }
        }

        if let Some(task) = self.updates_task.lock().await.take() {
            task.abort();
        }
        self.controller.lock().await.release();

        Ok(self.stats().await)
    }

    async fn submit_recording(&self, utterance: crate::transcribe::RecordedUtterance) -> Result<()> {
        let outcome = self
            .api
            .transcribe(
                &utterance.audio_base64,
                &self.config.session_id,
                utterance.duration_seconds,
            )
            .await;

        match outcome {
            Ok(outcome) => {
                *self.transcript.lock().await = outcome.transcript.trim().to_string();
                self.selector
                    .lock()
                    .await
                    .record_quota(outcome.remaining_minutes);
                self.state.lock().await.transition(CaptureState::Complete)?;
            }
            Err(e) => {
                error!("transcription submission failed: {}", e);
                let mut selector = self.selector.lock().await;
                selector.record_submission_failure(&e);
                let status = selector.take_notice().unwrap_or_else(|| e.to_string());
                drop(selector);
                *self.status.lock().await = status;
                self.state.lock().await.transition(CaptureState::Failed)?;
            }
        }
        Ok(())
    }

    /// Tear everything down and mark the capture failed
    async fn fail(&self) {
        self.level.lock().await.stop().await;
        if let Some(task) = self.updates_task.lock().await.take() {
            task.abort();
        }
        let taken = self.active.lock().await.take();
        if let Some(active) = taken {
            match active {
                ActiveCapture::OnDevice(mut session) => {
                    let _ = session.stop().await;
                }
                ActiveCapture::Remote(capture) => capture.abort().await,
            }
        }
        self.controller.lock().await.release();

        let mut state = self.state.lock().await;
        if !state.state().is_terminal() {
            let _ = state.transition(CaptureState::Failed);
        }
    }

    async fn record_duration(&self) {
        let started_at = *self.started_at.lock().await;
        if let Some(started) = started_at {
            let millis = (Utc::now() - started).num_milliseconds().max(0);
            *self.finished_duration.lock().await = Some(millis as f64 / 1000.0);
        }
    }

    /// The transcript as currently known: the live preview while recording
    /// on-device, the finalized text once complete.
    pub async fn transcript(&self) -> String {
        self.transcript.lock().await.clone()
    }

    pub async fn state(&self) -> CaptureState {
        self.state.lock().await.state()
    }

    pub async fn subscribe_level(&self) -> watch::Receiver<LevelReading> {
        self.level.lock().await.subscribe()
    }

    pub async fn stats(&self) -> SessionStats {
        let state = self.state.lock().await.state();
        let started_at = *self.started_at.lock().await;

        let duration_seconds = match *self.finished_duration.lock().await {
            Some(frozen) => Some(frozen),
            None => started_at
                .filter(|_| state == CaptureState::Active)
                .map(|started| (Utc::now() - started).num_milliseconds().max(0) as f64 / 1000.0),
        };

        let reading = self.level.lock().await.reading();
        let selector = self.selector.lock().await;

        SessionStats {
            session_id: self.config.session_id.clone(),
            state,
            strategy: *self.last_strategy.lock().await,
            started_at,
            duration_seconds,
            level: reading.level,
            low_signal: reading.low_signal,
            remaining_minutes: selector.remaining_minutes(),
            status: self.status.lock().await.clone(),
        }
    }

    /// Hand the finished transcript to the backend session endpoint
    pub async fn submit(&self) -> Result<()> {
        let transcript = self.transcript.lock().await.clone();
        let duration = self.finished_duration.lock().await.unwrap_or(0.0);
        self.api
            .submit_transcript(&self.config.session_id, &transcript, duration)
            .await?;
        Ok(())
    }
}
