// Integration tests for the conversational turn pipeline and the
// silence-triggered auto-submit. Timing tests run with the clock paused so
// the quiet window elapses deterministically.

use deepspeak_voice::api::ApiError;
use deepspeak_voice::chat::{
    ChatApi, ChatPipeline, ConversationTurn, Role, SilenceTimer, VoiceChat, FALLBACK_REPLY,
};
use deepspeak_voice::platform::loopback::LoopbackSynth;
use deepspeak_voice::playback::{OnDeviceSpeechBackend, Player};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;

/// Chat transport double: records sent messages, optionally fails
struct FakeChatApi {
    reply: String,
    fail: AtomicBool,
    sent: StdMutex<Vec<(String, usize)>>,
    calls: AtomicUsize,
}

impl FakeChatApi {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            fail: AtomicBool::new(false),
            sent: StdMutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn sent(&self) -> Vec<(String, usize)> {
        self.sent.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChatApi for FakeChatApi {
    async fn send_message(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap()
            .push((message.to_string(), history.len()));

        if self.fail.load(Ordering::SeqCst) {
            Err(ApiError::Network("connection reset".to_string()))
        } else {
            Ok(self.reply.clone())
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[tokio::test]
async fn test_pipeline_appends_user_then_assistant() {
    let api = FakeChatApi::new("Hi! How was your day?");
    let mut pipeline = ChatPipeline::new(api.clone());

    let reply = pipeline.send("hello").await;
    assert_eq!(reply.as_deref(), Some("Hi! How was your day?"));

    let history = pipeline.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].role, Role::Assistant);
    assert!(!pipeline.is_typing());
}

#[tokio::test]
async fn test_pipeline_sends_history_before_current_turn() {
    let api = FakeChatApi::new("ok");
    let mut pipeline = ChatPipeline::new(api.clone());

    pipeline.send("first").await;
    pipeline.send("second").await;

    let sent = api.sent();
    // The context for each turn is the history *before* that turn
    assert_eq!(sent[0], ("first".to_string(), 0));
    assert_eq!(sent[1], ("second".to_string(), 2));
}

#[tokio::test]
async fn test_pipeline_failure_appends_fallback_reply() {
    let api = FakeChatApi::new("unused");
    api.fail_requests(true);
    let mut pipeline = ChatPipeline::new(api.clone());

    let reply = pipeline.send("are you there?").await;
    assert_eq!(reply.as_deref(), Some(FALLBACK_REPLY));

    // The user's turn stays; exactly one fallback assistant turn follows
    let history = pipeline.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "are you there?");
    assert_eq!(history[1].content, FALLBACK_REPLY);
    assert!(!pipeline.is_typing(), "typing cleared on the failure path");
}

#[tokio::test]
async fn test_pipeline_ignores_empty_input() {
    let api = FakeChatApi::new("ok");
    let mut pipeline = ChatPipeline::new(api.clone());

    assert_eq!(pipeline.send("   ").await, None);
    assert!(pipeline.history().is_empty());
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn test_pipeline_voice_mode_plays_reply() {
    let api = FakeChatApi::new("Nice to hear that.");
    let synth = Arc::new(LoopbackSynth::new(true));
    let player = Arc::new(Mutex::new(Player::new(Arc::new(OnDeviceSpeechBackend::new(
        synth.clone(),
    )))));

    let mut pipeline =
        ChatPipeline::new(api.clone()).with_player(player.clone());
    pipeline.set_voice_mode(true);

    pipeline.send("hello").await;
    assert_eq!(synth.spoken(), vec!["Nice to hear that.".to_string()]);
}

#[tokio::test]
async fn test_pipeline_no_playback_without_voice_mode() {
    let api = FakeChatApi::new("Silent reply.");
    let synth = Arc::new(LoopbackSynth::new(true));
    let player = Arc::new(Mutex::new(Player::new(Arc::new(OnDeviceSpeechBackend::new(
        synth.clone(),
    )))));

    let mut pipeline =
        ChatPipeline::new(api.clone()).with_player(player.clone());

    pipeline.send("hello").await;
    assert!(synth.spoken().is_empty());
}

#[tokio::test]
async fn test_pipeline_no_playback_for_fallback_reply() {
    let api = FakeChatApi::new("unused");
    api.fail_requests(true);
    let synth = Arc::new(LoopbackSynth::new(true));
    let player = Arc::new(Mutex::new(Player::new(Arc::new(OnDeviceSpeechBackend::new(
        synth.clone(),
    )))));

    let mut pipeline =
        ChatPipeline::new(api.clone()).with_player(player.clone());
    pipeline.set_voice_mode(true);

    pipeline.send("hello").await;
    assert!(synth.spoken().is_empty(), "the canned apology is not spoken");
}

// ============================================================================
// Silence timer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_silence_timer_fires_after_quiet_window() {
    let (timer, mut fired) = SilenceTimer::new(Duration::from_millis(4300));

    let before = tokio::time::Instant::now();
    timer.poke();

    fired.recv().await.unwrap();
    assert_eq!(before.elapsed(), Duration::from_millis(4300));
}

#[tokio::test(start_paused = true)]
async fn test_silence_timer_pokes_defer_the_fire() {
    let (timer, mut fired) = SilenceTimer::new(Duration::from_millis(4300));

    let before = tokio::time::Instant::now();
    timer.poke();
    tokio::time::advance(Duration::from_millis(2000)).await;
    timer.poke();

    // The fire lands one full quiet window after the *last* activity
    fired.recv().await.unwrap();
    assert_eq!(before.elapsed(), Duration::from_millis(6300));
}

#[tokio::test(start_paused = true)]
async fn test_silence_timer_cancel_disarms() {
    let (timer, mut fired) = SilenceTimer::new(Duration::from_millis(4300));

    timer.poke();
    timer.cancel();
    assert!(!timer.is_armed());

    let outcome = tokio::time::timeout(Duration::from_secs(60), fired.recv()).await;
    assert!(outcome.is_err(), "no fire after cancel");
}

// ============================================================================
// Voice chat auto-submit
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_voice_chat_auto_submits_after_silence() {
    let api = FakeChatApi::new("Good point!");
    let pipeline = ChatPipeline::new(api.clone());
    let chat = VoiceChat::new(pipeline, Duration::from_millis(4300));

    chat.on_update("I think ", "").await;
    chat.on_update("I think the answer ", "is four").await;

    // Let the quiet window elapse
    tokio::time::sleep(Duration::from_millis(5000)).await;

    let sent = api.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "I think the answer is four");
}

#[tokio::test(start_paused = true)]
async fn test_auto_submit_timing_with_activity_bursts() {
    let api = FakeChatApi::new("ok");
    let pipeline = ChatPipeline::new(api.clone());
    let chat = VoiceChat::new(pipeline, Duration::from_millis(4300));

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    // Updates at t=0, t=1s, t=2s; each one re-arms the quiet window
    chat.on_update("I went ", "").await;
    tokio::time::advance(Duration::from_millis(1000)).await;
    chat.on_update("I went to ", "").await;
    tokio::time::advance(Duration::from_millis(1000)).await;
    chat.on_update("I went to the park ", "").await;

    // t=6.0s: still inside the window measured from the last update
    tokio::time::advance(Duration::from_millis(4000)).await;
    settle().await;
    assert_eq!(api.call_count(), 0);

    // A late update defers the submit by one full window again
    chat.on_update("I went to the park today ", "").await;
    tokio::time::advance(Duration::from_millis(4200)).await;
    settle().await;
    assert_eq!(api.call_count(), 0, "t=10.2s is still too early");

    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(api.call_count(), 1);
    assert_eq!(api.sent()[0].0, "I went to the park today");
}

#[tokio::test(start_paused = true)]
async fn test_voice_chat_stop_cancels_pending_submit() {
    let api = FakeChatApi::new("unused");
    let pipeline = ChatPipeline::new(api.clone());
    let chat = VoiceChat::new(pipeline, Duration::from_millis(4300));

    chat.on_update("don't send this", "").await;
    chat.stop().await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_voice_chat_skips_empty_buffer() {
    let api = FakeChatApi::new("unused");
    let pipeline = ChatPipeline::new(api.clone());
    let chat = VoiceChat::new(pipeline, Duration::from_millis(4300));

    // Activity with no recognized text arms the timer, but nothing is sent
    chat.on_update("", "").await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.call_count(), 0);
}
