use super::ConversationTurn;
use crate::api::{ApiClient, ApiError};
use crate::playback::Player;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Fixed assistant reply substituted when the chat endpoint fails; the
/// conversation is never left in a pending state.
pub const FALLBACK_REPLY: &str =
    "Sorry, something went wrong on my end. Could you say that again?";

/// Chat transport seam; the production implementation is `ApiClient`
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ApiError>;
}

#[async_trait::async_trait]
impl ChatApi for ApiClient {
    async fn send_message(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ApiError> {
        ApiClient::send_message(self, message, history).await
    }
}

/// One conversation: ordered immutable history, a typing indicator, and an
/// optional voice-mode playback hook.
pub struct ChatPipeline {
    api: Arc<dyn ChatApi>,
    history: Vec<ConversationTurn>,
    typing: bool,
    voice_mode: bool,
    player: Option<Arc<Mutex<Player>>>,
}

impl ChatPipeline {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            history: Vec::new(),
            typing: false,
            voice_mode: false,
            player: None,
        }
    }

    pub fn with_player(mut self, player: Arc<Mutex<Player>>) -> Self {
        self.player = Some(player);
        self
    }

    /// Send one user turn. The user turn is appended optimistically before
    /// the network call; the typing indicator is cleared on every path; on
    /// failure the fixed fallback reply is appended in place of the real
    /// one. Returns the assistant reply that was appended, or `None` when
    /// the input was ignored (empty, or a send already in flight).
    pub async fn send(&mut self, text: &str) -> Option<String> {
        let message = text.trim().to_string();
        if message.is_empty() || self.typing {
            return None;
        }

        // Full ordered history *before* this turn goes out as context
        let history = self.history.clone();

        self.history.push(ConversationTurn::user(&message));
        self.typing = true;

        let result = self.api.send_message(&message, &history).await;

        // Cleared regardless of outcome
        self.typing = false;

        let (reply, ok) = match result {
            Ok(reply) => (reply, true),
            Err(e) => {
                warn!("chat request failed: {}", e);
                (FALLBACK_REPLY.to_string(), false)
            }
        };

        self.history.push(ConversationTurn::assistant(&reply));

        // Playback fires only after the reply is appended, keeping the
        // transcript and audio consistent
        if ok && self.voice_mode {
            if let Some(player) = &self.player {
                debug!("voice mode on; playing reply");
                player.lock().await.play(&reply).await;
            }
        }

        Some(reply)
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn set_voice_mode(&mut self, enabled: bool) {
        self.voice_mode = enabled;
    }

    pub fn voice_mode(&self) -> bool {
        self.voice_mode
    }
}
