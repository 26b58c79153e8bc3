use crate::api::ApiClient;
use crate::capture::DeviceInventory;
use crate::chat::{ChatPipeline, VoiceChat};
use crate::config::Config;
use crate::platform::Platform;
use crate::playback::{OnDeviceSpeechBackend, Player, RemoteTtsBackend};
use crate::session::RecorderSession;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Capture sessions (session_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<RecorderSession>>>>,
    pub platform: Platform,
    pub api: Arc<ApiClient>,
    pub config: Config,
    pub inventory: Arc<Mutex<DeviceInventory>>,
    /// Shared conversation pipeline (owned by `voice`)
    pub chat: Arc<Mutex<ChatPipeline>>,
    /// Silence-triggered auto-submit over the conversation pipeline
    pub voice: Arc<VoiceChat>,
    pub player: Arc<Mutex<Player>>,
}

impl AppState {
    pub fn new(config: Config, platform: Platform, api: Arc<ApiClient>) -> Self {
        // Playback backend is fixed per deployment: remote TTS when the
        // backend is authenticated, on-device synthesis otherwise
        let player = if config.api.auth_token.is_some() {
            Player::new(Arc::new(RemoteTtsBackend::new(
                Arc::clone(&api),
                Arc::clone(&platform.sink),
            )))
        } else {
            Player::new(Arc::new(OnDeviceSpeechBackend::new(Arc::clone(
                &platform.synthesizer,
            ))))
        };
        let player = Arc::new(Mutex::new(player));

        let pipeline = ChatPipeline::new(api.clone()).with_player(Arc::clone(&player));
        let voice = Arc::new(VoiceChat::new(
            pipeline,
            Duration::from_millis(config.capture.silence_window_ms),
        ));
        let chat = voice.pipeline();

        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            platform,
            api,
            config,
            inventory: Arc::new(Mutex::new(DeviceInventory::new())),
            chat,
            voice,
            player,
        }
    }
}
