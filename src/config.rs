use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub capture: CaptureTuning,
    #[serde(default)]
    pub level: LevelTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the DeepSpeak backend (chat, transcription, TTS)
    pub base_url: String,
    /// Optional bearer token for authenticated endpoints
    pub auth_token: Option<String>,
}

/// Capture and transcription tuning values.
///
/// The timing constants are empirically tuned in the product; they are
/// configuration, not derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureTuning {
    /// Quiet interval after which buffered speech is auto-submitted
    #[serde(default = "default_silence_window_ms")]
    pub silence_window_ms: u64,
    /// Delay before restarting the on-device engine after an unexpected stop
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Wait between the final flush request and the forced recorder stop
    #[serde(default = "default_stop_flush_delay_ms")]
    pub stop_flush_delay_ms: u64,
    /// Recorder timeslice (how often data chunks are delivered)
    #[serde(default = "default_timeslice_ms")]
    pub timeslice_ms: u64,
    /// Recordings shorter than this are rejected before any network call
    #[serde(default = "default_min_utterance_secs")]
    pub min_utterance_secs: f64,
    /// Payloads smaller than this are rejected before any network call
    #[serde(default = "default_min_payload_bytes")]
    pub min_payload_bytes: usize,
    /// Recognition language tag
    #[serde(default = "default_lang")]
    pub lang: String,
}

/// Level meter tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelTuning {
    /// Gain applied to the raw bin average for UI legibility
    #[serde(default = "default_level_gain")]
    pub gain: f32,
    /// Low-signal warning asserts below this level
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f32,
    /// Low-signal warning clears only above this level (hysteresis)
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,
}

fn default_silence_window_ms() -> u64 {
    4300
}

fn default_restart_delay_ms() -> u64 {
    300
}

fn default_stop_flush_delay_ms() -> u64 {
    100
}

fn default_timeslice_ms() -> u64 {
    100
}

fn default_min_utterance_secs() -> f64 {
    0.5
}

fn default_min_payload_bytes() -> usize {
    1024
}

fn default_lang() -> String {
    "en-US".to_string()
}

fn default_level_gain() -> f32 {
    1.5
}

fn default_low_threshold() -> f32 {
    1.0
}

fn default_high_threshold() -> f32 {
    5.0
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "deepspeak-voice".to_string(),
            http: HttpConfig {
                bind: "127.0.0.1".to_string(),
                port: 8787,
            },
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            auth_token: None,
        }
    }
}

impl Default for CaptureTuning {
    fn default() -> Self {
        Self {
            silence_window_ms: default_silence_window_ms(),
            restart_delay_ms: default_restart_delay_ms(),
            stop_flush_delay_ms: default_stop_flush_delay_ms(),
            timeslice_ms: default_timeslice_ms(),
            min_utterance_secs: default_min_utterance_secs(),
            min_payload_bytes: default_min_payload_bytes(),
            lang: default_lang(),
        }
    }
}

impl Default for LevelTuning {
    fn default() -> Self {
        Self {
            gain: default_level_gain(),
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
