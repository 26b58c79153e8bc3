//! Live level monitor
//!
//! Consumes frequency-bin frames from the analyser port, publishes a scaled
//! amplitude in [0, 100] plus a hysteretic low-signal flag through a watch
//! channel. Runs independently of which transcription strategy is active and
//! is started/stopped explicitly by capture lifecycle events.

use crate::capture::CaptureError;
use crate::config::LevelTuning;
use crate::platform::{LevelAnalyser, MediaStreamHandle};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// One published meter reading
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelReading {
    /// Scaled amplitude in [0, 100]
    pub level: f32,
    /// Low-signal warning (asserted/cleared with hysteresis, never flickers
    /// at a single threshold)
    pub low_signal: bool,
}

/// Two-threshold low-signal detector: asserts below `low`, clears only above
/// `high`. Levels in between keep the previous state.
#[derive(Debug, Clone)]
pub struct Hysteresis {
    low: f32,
    high: f32,
    low_signal: bool,
}

impl Hysteresis {
    pub fn new(low: f32, high: f32) -> Self {
        Self {
            low,
            high,
            low_signal: false,
        }
    }

    pub fn update(&mut self, level: f32) -> bool {
        if level < self.low {
            self.low_signal = true;
        } else if level > self.high {
            self.low_signal = false;
        }
        self.low_signal
    }
}

/// Average the frequency bins and scale for UI legibility
pub fn scale_frame(frame: &[u8], gain: f32) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: u32 = frame.iter().map(|&b| b as u32).sum();
    let average = sum as f32 / frame.len() as f32;
    (average * gain).clamp(0.0, 100.0)
}

pub struct LevelMonitor {
    analyser: Arc<dyn LevelAnalyser>,
    tuning: LevelTuning,
    tx: watch::Sender<LevelReading>,
    task: Option<JoinHandle<()>>,
}

impl LevelMonitor {
    pub fn new(analyser: Arc<dyn LevelAnalyser>, tuning: LevelTuning) -> Self {
        let (tx, _) = watch::channel(LevelReading::default());
        Self {
            analyser,
            tuning,
            tx,
            task: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LevelReading> {
        self.tx.subscribe()
    }

    pub fn reading(&self) -> LevelReading {
        *self.tx.borrow()
    }

    pub async fn start(&mut self, stream: &dyn MediaStreamHandle) -> Result<(), CaptureError> {
        // One analysis graph at a time
        self.stop().await;

        let mut frames = self.analyser.start(stream).await?;
        let tx = self.tx.clone();
        let gain = self.tuning.gain;
        let mut hysteresis = Hysteresis::new(self.tuning.low_threshold, self.tuning.high_threshold);

        self.task = Some(tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let level = scale_frame(&frame, gain);
                let low_signal = hysteresis.update(level);
                let _ = tx.send(LevelReading { level, low_signal });
            }
        }));

        debug!("level monitor started");
        Ok(())
    }

    /// Tear the whole analysis pipeline down: cancel the frame loop, stop
    /// the analyser graph, zero the published level. Leaking any of these
    /// drains battery on mobile, so this is a correctness requirement.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.analyser.stop().await;
            let _ = self.tx.send(LevelReading::default());
            debug!("level monitor stopped");
        }
    }
}

impl Drop for LevelMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // `stop` is async; disconnect the analyser graph from a task
            // when a runtime is still around
            let analyser = Arc::clone(&self.analyser);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { analyser.stop().await });
            }
        }
    }
}
