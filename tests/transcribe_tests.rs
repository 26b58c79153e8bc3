// Integration tests for the transcription core: the capture state machine,
// transcript accumulation, strategy selection with permanent fallback, and
// both capture drivers against the loopback platform.

use deepspeak_voice::api::ApiError;
use deepspeak_voice::capture::CaptureError;
use deepspeak_voice::config::CaptureTuning;
use deepspeak_voice::platform::loopback::{
    LoopbackDevices, LoopbackRecorderFactory, ScriptedRecognition,
};
use deepspeak_voice::platform::{
    Capabilities, EngineClass, MediaDevices, RecognitionErrorKind, RecognitionEvent,
    RecordingFormat,
};
use deepspeak_voice::transcribe::{
    pick_format, CaptureState, CaptureStateMachine, DowngradeReason, OnDeviceEvent,
    OnDeviceSession, RemoteCapture, Strategy, StrategySelector, TranscribeError, TranscriptBuffer,
};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

fn capabilities(chunked: bool, engine_class: EngineClass) -> Capabilities {
    Capabilities {
        has_continuous_recognition: true,
        has_chunked_recording: chunked,
        engine_class,
        supported_formats: vec![RecordingFormat::WebmOpus, RecordingFormat::Pcm],
    }
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn test_state_machine_happy_path_remote() {
    let mut sm = CaptureStateMachine::new();
    assert_eq!(sm.state(), CaptureState::Idle);

    sm.transition(CaptureState::Acquiring).unwrap();
    sm.transition(CaptureState::Active).unwrap();
    sm.transition(CaptureState::Stopping).unwrap();
    sm.transition(CaptureState::Transcribing).unwrap();
    sm.transition(CaptureState::Complete).unwrap();

    assert!(sm.state().is_terminal());
}

#[test]
fn test_state_machine_happy_path_on_device() {
    // On-device recognition has no transcription phase; Stopping completes
    // directly
    let mut sm = CaptureStateMachine::new();
    sm.transition(CaptureState::Acquiring).unwrap();
    sm.transition(CaptureState::Active).unwrap();
    sm.transition(CaptureState::Stopping).unwrap();
    sm.transition(CaptureState::Complete).unwrap();
}

#[test]
fn test_state_machine_rejects_illegal_transitions() {
    let mut sm = CaptureStateMachine::new();

    let err = sm.transition(CaptureState::Active).unwrap_err();
    assert_eq!(err.from, CaptureState::Idle);
    assert_eq!(err.to, CaptureState::Active);

    // The rejected transition was not applied
    assert_eq!(sm.state(), CaptureState::Idle);

    sm.transition(CaptureState::Acquiring).unwrap();
    assert!(sm.transition(CaptureState::Complete).is_err());
    assert!(sm.transition(CaptureState::Stopping).is_err());
}

#[test]
fn test_state_machine_failed_from_any_non_terminal() {
    for path in [
        vec![],
        vec![CaptureState::Acquiring],
        vec![CaptureState::Acquiring, CaptureState::Active],
        vec![
            CaptureState::Acquiring,
            CaptureState::Active,
            CaptureState::Stopping,
        ],
        vec![
            CaptureState::Acquiring,
            CaptureState::Active,
            CaptureState::Stopping,
            CaptureState::Transcribing,
        ],
    ] {
        let mut sm = CaptureStateMachine::new();
        for state in path {
            sm.transition(state).unwrap();
        }
        sm.transition(CaptureState::Failed).unwrap();
    }
}

#[test]
fn test_states_serialize_snake_case() {
    // The status endpoint exposes these names to clients
    assert_eq!(
        serde_json::to_string(&CaptureState::Transcribing).unwrap(),
        "\"transcribing\""
    );
    assert_eq!(
        serde_json::to_string(&Strategy::OnDeviceRecognition).unwrap(),
        "\"on_device_recognition\""
    );
}

#[test]
fn test_state_machine_terminal_states_are_final() {
    let mut sm = CaptureStateMachine::new();
    sm.transition(CaptureState::Acquiring).unwrap();
    sm.transition(CaptureState::Failed).unwrap();

    assert!(sm.transition(CaptureState::Acquiring).is_err());
    assert!(sm.transition(CaptureState::Complete).is_err());

    sm.reset();
    assert_eq!(sm.state(), CaptureState::Idle);
    sm.transition(CaptureState::Acquiring).unwrap();
}

// ============================================================================
// Transcript buffer
// ============================================================================

#[test]
fn test_buffer_merge_is_idempotent() {
    let mut buffer = TranscriptBuffer::new();

    assert!(buffer.merge_finalized("hello world "));
    let before = buffer.clone();

    // The engine re-delivers the same finalized-so-far text
    assert!(!buffer.merge_finalized("hello world "));
    assert_eq!(buffer, before);
    assert_eq!(buffer.segments().len(), 1);
}

#[test]
fn test_buffer_merge_extracts_delta_segment() {
    let mut buffer = TranscriptBuffer::new();
    buffer.merge_finalized("hello ");
    buffer.merge_finalized("hello world ");

    assert_eq!(buffer.segments(), &["hello ", "world "]);
    assert_eq!(buffer.finalized(), "hello world ");
}

#[test]
fn test_buffer_append_chunk() {
    let mut buffer = TranscriptBuffer::new();
    assert!(buffer.append_chunk("hello"));
    assert!(buffer.append_chunk("world"));
    assert!(!buffer.append_chunk(""));

    assert_eq!(buffer.finalized(), "hello world ");
}

#[test]
fn test_buffer_interim_is_replaced_not_appended() {
    let mut buffer = TranscriptBuffer::new();
    buffer.append_chunk("confirmed");
    buffer.set_interim("maybe this");
    buffer.set_interim("maybe that");

    assert_eq!(buffer.interim(), "maybe that");
    assert_eq!(buffer.full_text(), "confirmed maybe that");
}

#[test]
fn test_buffer_full_text_without_interim() {
    let mut buffer = TranscriptBuffer::new();
    buffer.append_chunk("just this");
    assert_eq!(buffer.full_text(), "just this");
}

#[test]
fn test_buffer_clear() {
    let mut buffer = TranscriptBuffer::new();
    buffer.append_chunk("something");
    buffer.set_interim("pending");
    buffer.clear();

    assert!(buffer.is_empty());
    assert_eq!(buffer.full_text(), "");
}

// ============================================================================
// Strategy selector
// ============================================================================

#[test]
fn test_selector_prefers_remote_with_session() {
    let selector = StrategySelector::new(capabilities(true, EngineClass::Other));
    assert_eq!(
        selector.select(Some("session-1")),
        Strategy::RemoteTranscription
    );
}

#[test]
fn test_selector_requires_session_id() {
    let selector = StrategySelector::new(capabilities(true, EngineClass::Other));
    assert_eq!(selector.select(None), Strategy::OnDeviceRecognition);
}

#[test]
fn test_selector_requires_chunked_recording() {
    let selector = StrategySelector::new(capabilities(false, EngineClass::Other));
    assert_eq!(
        selector.select(Some("session-1")),
        Strategy::OnDeviceRecognition
    );
}

#[test]
fn test_downgrade_is_permanent() {
    let mut selector = StrategySelector::new(capabilities(true, EngineClass::Other));
    selector.downgrade(DowngradeReason::RecorderInitFailed);

    assert_eq!(
        selector.select(Some("session-1")),
        Strategy::OnDeviceRecognition
    );

    // A later reason does not overwrite the first
    selector.downgrade(DowngradeReason::QuotaExhausted);
    assert_eq!(
        selector.downgraded(),
        Some(DowngradeReason::RecorderInitFailed)
    );
}

#[test]
fn test_quota_zero_downgrades() {
    let mut selector = StrategySelector::new(capabilities(true, EngineClass::Other));

    selector.record_quota(Some(12.5));
    assert_eq!(selector.remaining_minutes(), Some(12.5));
    assert_eq!(selector.downgraded(), None);

    selector.record_quota(Some(0.0));
    assert_eq!(selector.downgraded(), Some(DowngradeReason::QuotaExhausted));
    assert_eq!(selector.remaining_minutes(), Some(0.0));
}

#[test]
fn test_quota_exhausted_error_downgrades_and_zeroes_display() {
    let mut selector = StrategySelector::new(capabilities(true, EngineClass::Other));
    selector.record_submission_failure(&ApiError::QuotaExhausted);

    assert_eq!(selector.downgraded(), Some(DowngradeReason::QuotaExhausted));
    assert_eq!(selector.remaining_minutes(), Some(0.0));
}

#[test]
fn test_network_failure_downgrades() {
    let mut selector = StrategySelector::new(capabilities(true, EngineClass::Other));
    selector.record_submission_failure(&ApiError::Network("connection refused".to_string()));

    assert_eq!(selector.downgraded(), Some(DowngradeReason::NetworkFailure));
}

#[test]
fn test_downgrade_notice_emitted_once() {
    let mut selector = StrategySelector::new(capabilities(true, EngineClass::Other));
    assert_eq!(selector.take_notice(), None);

    selector.downgrade(DowngradeReason::QuotaExhausted);
    assert!(selector.take_notice().is_some());
    assert_eq!(selector.take_notice(), None);
}

// ============================================================================
// Recording format decision table
// ============================================================================

#[test]
fn test_format_apple_prefers_mp4() {
    let factory = LoopbackRecorderFactory::new();
    factory.set_supported(vec![RecordingFormat::Mp4Aac, RecordingFormat::WebmOpus]);

    let caps = capabilities(true, EngineClass::AppleWebKit);
    assert_eq!(pick_format(&caps, &factory), Some(RecordingFormat::Mp4Aac));
}

#[test]
fn test_format_apple_without_mp4_uses_webm() {
    let factory = LoopbackRecorderFactory::new();
    factory.set_supported(vec![RecordingFormat::WebmOpus]);

    let caps = capabilities(true, EngineClass::AppleWebKit);
    assert_eq!(
        pick_format(&caps, &factory),
        Some(RecordingFormat::WebmOpus)
    );
}

#[test]
fn test_format_other_engine_ignores_mp4() {
    let factory = LoopbackRecorderFactory::new();
    factory.set_supported(vec![RecordingFormat::Mp4Aac, RecordingFormat::WebmOpus]);

    let caps = capabilities(true, EngineClass::Other);
    assert_eq!(
        pick_format(&caps, &factory),
        Some(RecordingFormat::WebmOpus)
    );
}

#[test]
fn test_format_nothing_supported_means_default() {
    let factory = LoopbackRecorderFactory::new();
    factory.set_supported(vec![]);

    let caps = capabilities(true, EngineClass::Other);
    assert_eq!(pick_format(&caps, &factory), None);
}

// ============================================================================
// On-device recognition driver
// ============================================================================

#[tokio::test]
async fn test_on_device_accumulates_across_restarts() {
    let engine = Arc::new(ScriptedRecognition::new());
    engine.push_run(vec![RecognitionEvent::Result {
        finalized: "hello".to_string(),
        interim: String::new(),
    }]);
    engine.push_run(vec![RecognitionEvent::Result {
        finalized: "world".to_string(),
        interim: String::new(),
    }]);

    let mut session = OnDeviceSession::new(
        engine.clone(),
        "en-US",
        Duration::from_millis(5),
    );
    let mut updates = session.start();

    // First run ends after one result; the driver restarts and the second
    // run's text lands in the same buffer
    let mut last_finalized = String::new();
    while let Some(event) = updates.recv().await {
        if let OnDeviceEvent::Update { finalized, .. } = event {
            last_finalized = finalized;
            if last_finalized.contains("world") {
                break;
            }
        }
    }

    let buffer = session.stop().await;
    assert_eq!(buffer.full_text(), "hello world");
    assert!(engine.start_count() >= 2, "engine was restarted");
}

#[tokio::test]
async fn test_on_device_transient_errors_are_swallowed() {
    let engine = Arc::new(ScriptedRecognition::new());
    engine.push_run(vec![RecognitionEvent::Error(RecognitionErrorKind::NoSpeech)]);
    engine.push_run(vec![RecognitionEvent::Result {
        finalized: "after retry".to_string(),
        interim: String::new(),
    }]);

    let mut session = OnDeviceSession::new(
        engine.clone(),
        "en-US",
        Duration::from_millis(5),
    );
    let mut updates = session.start();

    // The first event we see must be an update, never a failure
    match updates.recv().await.unwrap() {
        OnDeviceEvent::Update { finalized, .. } => assert!(finalized.contains("after retry")),
        OnDeviceEvent::Failed(e) => panic!("transient error surfaced as failure: {}", e),
    }

    session.stop().await;
}

#[tokio::test]
async fn test_on_device_permission_error_is_terminal() {
    let engine = Arc::new(ScriptedRecognition::new());
    engine.push_run(vec![RecognitionEvent::Error(
        RecognitionErrorKind::NotAllowed,
    )]);

    let mut session = OnDeviceSession::new(
        engine.clone(),
        "en-US",
        Duration::from_millis(5),
    );
    let mut updates = session.start();

    match updates.recv().await.unwrap() {
        OnDeviceEvent::Failed(CaptureError::PermissionDenied { blocked: false }) => {}
        other => panic!("expected permission failure, got {:?}", other),
    }

    // Terminal errors are never retried
    assert!(!session.is_running());
    assert_eq!(engine.start_count(), 1);
}

#[tokio::test]
async fn test_on_device_interim_discarded_on_stop() {
    let engine = Arc::new(ScriptedRecognition::new());
    engine.push_run(vec![RecognitionEvent::Result {
        finalized: "kept".to_string(),
        interim: "discarded".to_string(),
    }]);

    let mut session = OnDeviceSession::new(
        engine.clone(),
        "en-US",
        Duration::from_millis(5),
    );
    let mut updates = session.start();

    match updates.recv().await.unwrap() {
        OnDeviceEvent::Update { interim, .. } => assert_eq!(interim, "discarded"),
        other => panic!("expected update, got {:?}", other),
    }

    let buffer = session.stop().await;
    assert_eq!(buffer.full_text(), "kept");
}

// ============================================================================
// Remote (buffered) capture driver
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_remote_capture_rejects_short_recording() {
    let devices = LoopbackDevices::new();
    let stream = devices.acquire(None).await.unwrap();
    let factory = LoopbackRecorderFactory::new();
    let tuning = CaptureTuning::default();

    let capture = RemoteCapture::start(
        &factory,
        &*stream,
        &capabilities(true, EngineClass::Other),
        &tuning,
    )
    .await
    .unwrap();

    tokio::time::advance(Duration::from_millis(300)).await;

    // Rejected client-side before any network submission
    match capture.finish().await {
        Err(TranscribeError::TooShort { secs, min }) => {
            assert!(secs < min);
        }
        other => panic!("expected TooShort, got {:?}", other.map(|u| u.duration_seconds)),
    }
}

#[tokio::test(start_paused = true)]
async fn test_remote_capture_rejects_tiny_payload() {
    let devices = LoopbackDevices::new();
    let stream = devices.acquire(None).await.unwrap();
    let factory = LoopbackRecorderFactory::new();
    factory.set_chunks(vec![vec![0u8; 500]]);
    let tuning = CaptureTuning::default();

    let capture = RemoteCapture::start(
        &factory,
        &*stream,
        &capabilities(true, EngineClass::Other),
        &tuning,
    )
    .await
    .unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;

    match capture.finish().await {
        Err(TranscribeError::TooSmall { bytes, min }) => {
            assert_eq!(bytes, 500);
            assert_eq!(min, tuning.min_payload_bytes);
        }
        other => panic!("expected TooSmall, got {:?}", other.map(|u| u.duration_seconds)),
    }
}

#[tokio::test(start_paused = true)]
async fn test_remote_capture_collects_flush_chunk() {
    let devices = LoopbackDevices::new();
    let stream = devices.acquire(None).await.unwrap();
    let factory = LoopbackRecorderFactory::new();
    factory.set_chunks(vec![vec![1u8; 2048]]);
    factory.set_flush_chunk(Some(vec![2u8; 256]));
    let tuning = CaptureTuning::default();

    let capture = RemoteCapture::start(
        &factory,
        &*stream,
        &capabilities(true, EngineClass::Other),
        &tuning,
    )
    .await
    .unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;

    let utterance = capture.finish().await.unwrap();
    assert_eq!(utterance.format, Some(RecordingFormat::WebmOpus));
    assert!(utterance.duration_seconds >= 2.0);

    // Payload includes the late chunk delivered in response to the flush
    let payload = base64::engine::general_purpose::STANDARD
        .decode(&utterance.audio_base64)
        .unwrap();
    assert_eq!(payload.len(), 2048 + 256);
}

#[tokio::test(start_paused = true)]
async fn test_remote_capture_wraps_default_format_as_wav() {
    let devices = LoopbackDevices::new();
    let stream = devices.acquire(None).await.unwrap();
    let factory = LoopbackRecorderFactory::new();
    factory.set_supported(vec![]); // no container support; raw PCM default
    factory.set_chunks(vec![vec![0u8; 4096]]);
    let tuning = CaptureTuning::default();

    let capture = RemoteCapture::start(
        &factory,
        &*stream,
        &capabilities(true, EngineClass::Other),
        &tuning,
    )
    .await
    .unwrap();

    assert_eq!(factory.last_format(), Some(None));

    tokio::time::advance(Duration::from_secs(2)).await;

    let utterance = capture.finish().await.unwrap();
    assert_eq!(utterance.format, None);

    let payload = base64::engine::general_purpose::STANDARD
        .decode(&utterance.audio_base64)
        .unwrap();
    assert_eq!(&payload[..4], b"RIFF", "raw PCM is submitted as WAV");
}

#[tokio::test(start_paused = true)]
async fn test_remote_capture_requests_decided_format() {
    let devices = LoopbackDevices::new();
    let stream = devices.acquire(None).await.unwrap();
    let factory = LoopbackRecorderFactory::new();
    factory.set_supported(vec![RecordingFormat::Mp4Aac, RecordingFormat::WebmOpus]);
    let tuning = CaptureTuning::default();

    let capture = RemoteCapture::start(
        &factory,
        &*stream,
        &capabilities(true, EngineClass::AppleWebKit),
        &tuning,
    )
    .await
    .unwrap();

    assert_eq!(factory.last_format(), Some(Some(RecordingFormat::Mp4Aac)));
    capture.abort().await;
}
