use crate::chat::ConversationTurn;
use crate::config::ApiConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    /// The backend signalled the transcription quota as exhausted.
    /// Distinguishable from plain HTTP failures so the strategy selector
    /// can downgrade and zero the quota display.
    #[error("transcription quota exhausted")]
    QuotaExhausted,

    #[error("backend returned {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

/// Result of a remote transcription submission
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub transcript: String,
    pub remaining_minutes: Option<f64>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    history: &'a [ConversationTurn],
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeRequest<'a> {
    audio_base64: &'a str,
    session_id: &'a str,
    duration_seconds: f64,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    transcript: String,
    remaining_minutes: Option<f64>,
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    session_id: &'a str,
    transcript: &'a str,
    duration_seconds: f64,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// `POST /api/chat` — full ordered history goes out on every turn
    pub async fn send_message(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ApiError> {
        debug!("sending chat turn ({} history entries)", history.len());

        let response = self
            .post("/api/chat")
            .json(&ChatRequest { message, history })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let response = Self::check(response).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(body.response)
    }

    /// Submit a buffered recording for transcription
    pub async fn transcribe(
        &self,
        audio_base64: &str,
        session_id: &str,
        duration_seconds: f64,
    ) -> Result<TranscriptionOutcome, ApiError> {
        info!(
            "submitting recording for transcription ({} b64 chars, {:.2}s)",
            audio_base64.len(),
            duration_seconds
        );

        let response = self
            .post("/api/whisper/transcribe")
            .json(&TranscribeRequest {
                audio_base64,
                session_id,
                duration_seconds,
            })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let response = Self::check(response).await?;
        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(TranscriptionOutcome {
            transcript: body.transcript,
            remaining_minutes: body.remaining_minutes,
        })
    }

    /// Fetch a remote-synthesized audio buffer (MPEG bytes)
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError> {
        debug!("requesting TTS ({} chars)", text.chars().count());

        let response = self
            .post("/api/tts/speak")
            .json(&TtsRequest { text })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let response = Self::check(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    /// Opaque session-lifecycle call: submit a finished transcript
    pub async fn submit_transcript(
        &self,
        session_id: &str,
        transcript: &str,
        duration_seconds: f64,
    ) -> Result<(), ApiError> {
        let response = self
            .post("/api/session/submit")
            .json(&SubmitRequest {
                session_id,
                transcript,
                duration_seconds,
            })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = match response.json::<ErrorBody>().await {
            Ok(body) => body.detail,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };

        if status.as_u16() == 429 || detail.starts_with("quota_exhausted") {
            return Err(ApiError::QuotaExhausted);
        }

        Err(ApiError::Http {
            status: status.as_u16(),
            detail,
        })
    }
}
