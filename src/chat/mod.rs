//! Conversational turn pipeline, silence-triggered auto-submit, and the
//! voice-chat glue that wires recognition updates into both.

mod pipeline;
mod silence;

pub use pipeline::{ChatApi, ChatPipeline, FALLBACK_REPLY};
pub use silence::SilenceTimer;

use crate::transcribe::TranscriptBuffer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation; immutable once appended to the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat-variant orchestration: accumulates incremental recognition text and
/// auto-dispatches it as one conversational turn after a fixed quiet
/// interval. The pending submit is deferred by every activity tick and
/// cancelled on explicit stop or teardown — a stray submit after the user
/// has moved on is a bug.
pub struct VoiceChat {
    pipeline: Arc<Mutex<ChatPipeline>>,
    buffer: Arc<Mutex<TranscriptBuffer>>,
    timer: SilenceTimer,
    submit_task: JoinHandle<()>,
}

impl VoiceChat {
    pub fn new(pipeline: ChatPipeline, quiet_window: Duration) -> Self {
        let pipeline = Arc::new(Mutex::new(pipeline));
        let buffer = Arc::new(Mutex::new(TranscriptBuffer::new()));
        let (timer, fired) = SilenceTimer::new(quiet_window);

        let submit_task = tokio::spawn(Self::submit_loop(
            fired,
            Arc::clone(&pipeline),
            Arc::clone(&buffer),
        ));

        Self {
            pipeline,
            buffer,
            timer,
            submit_task,
        }
    }

    /// Feed one incremental recognition update (final or interim). Every
    /// update resets the silence window.
    pub async fn on_update(&self, finalized: &str, interim: &str) {
        {
            let mut buffer = self.buffer.lock().await;
            buffer.merge_finalized(finalized);
            buffer.set_interim(interim);
        }
        self.timer.poke();
    }

    pub fn pipeline(&self) -> Arc<Mutex<ChatPipeline>> {
        Arc::clone(&self.pipeline)
    }

    /// Explicit stop: cancel any pending auto-submit and clear the buffer
    pub async fn stop(&self) {
        self.timer.cancel();
        self.buffer.lock().await.clear();
    }

    async fn submit_loop(
        mut fired: mpsc::Receiver<()>,
        pipeline: Arc<Mutex<ChatPipeline>>,
        buffer: Arc<Mutex<TranscriptBuffer>>,
    ) {
        while fired.recv().await.is_some() {
            // Quiet window elapsed: treat finalized + interim as complete
            let text = {
                let mut buffer = buffer.lock().await;
                let text = buffer.full_text();
                buffer.clear();
                text
            };

            if text.trim().is_empty() {
                continue;
            }

            debug!("silence window elapsed; auto-submitting turn");
            pipeline.lock().await.send(&text).await;
        }
    }
}

impl Drop for VoiceChat {
    fn drop(&mut self) {
        self.timer.cancel();
        self.submit_task.abort();
    }
}
