// Integration tests for speech playback: sentence segmentation, the
// single-active-playback guarantee, and seek clamping.

use deepspeak_voice::platform::loopback::{LoopbackSink, LoopbackSynth};
use deepspeak_voice::platform::{AudioSink, PlaybackHandle};
use deepspeak_voice::playback::{split_sentences, tail_from, OnDeviceSpeechBackend, Player};
use std::sync::Arc;

// ============================================================================
// Segmentation
// ============================================================================

#[test]
fn test_split_on_sentence_punctuation() {
    let segments = split_sentences("Hello there. How are you? Great!");
    assert_eq!(segments, vec!["Hello there.", "How are you?", "Great!"]);
}

#[test]
fn test_split_keeps_unterminated_tail() {
    let segments = split_sentences("One done. still going");
    assert_eq!(segments, vec!["One done.", "still going"]);
}

#[test]
fn test_split_ignores_mid_token_periods() {
    // A period not followed by whitespace is not a boundary
    let segments = split_sentences("Version 1.5 is out. Try it!");
    assert_eq!(segments, vec!["Version 1.5 is out.", "Try it!"]);
}

#[test]
fn test_split_handles_cjk_punctuation() {
    let segments = split_sentences("你好。 元気ですか？ はい！");
    assert_eq!(segments, vec!["你好。", "元気ですか？", "はい！"]);
}

#[test]
fn test_split_empty_text() {
    assert!(split_sentences("").is_empty());
    assert!(split_sentences("   ").is_empty());
}

#[test]
fn test_tail_from_joins_remaining_segments() {
    let segments = vec![
        "First.".to_string(),
        "Second.".to_string(),
        "Third.".to_string(),
    ];

    assert_eq!(tail_from(&segments, 1), "Second. Third.");
    assert_eq!(tail_from(&segments, 0), "First. Second. Third.");
}

#[test]
fn test_tail_from_clamps_index() {
    let segments = vec!["Only one.".to_string()];
    assert_eq!(tail_from(&segments, 99), "Only one.");
    assert_eq!(tail_from(&[], 0), "");
}

// ============================================================================
// Player
// ============================================================================

fn player_with_synth(supported: bool) -> (Player, Arc<LoopbackSynth>) {
    let synth = Arc::new(LoopbackSynth::new(supported));
    let player = Player::new(Arc::new(OnDeviceSpeechBackend::new(
        synth.clone()
    )));
    (player, synth)
}

#[tokio::test]
async fn test_play_speaks_full_text() {
    let (mut player, synth) = player_with_synth(true);

    player.play("Hello there. How are you?").await;

    assert!(player.is_playing());
    assert_eq!(player.segment_count(), 2);
    assert_eq!(synth.spoken(), vec!["Hello there. How are you?".to_string()]);
}

#[tokio::test]
async fn test_at_most_one_active_playback() {
    let (mut player, synth) = player_with_synth(true);

    player.play("First reply.").await;
    player.play("Second reply.").await;

    // The first handle was torn down before the second started
    assert_eq!(synth.spoken().len(), 2);
    assert_eq!(synth.active_count(), 1);
}

#[tokio::test]
async fn test_seek_plays_tail_from_segment() {
    let (mut player, synth) = player_with_synth(true);

    player.play("One. Two. Three.").await;
    player.seek_to_segment(1).await;

    assert_eq!(player.position(), 1);
    assert_eq!(synth.spoken().last().unwrap(), "Two. Three.");
    assert_eq!(synth.active_count(), 1);
}

#[tokio::test]
async fn test_seek_clamps_past_the_end() {
    let (mut player, synth) = player_with_synth(true);

    player.play("One. Two. Three.").await;
    player.seek_to_segment(99).await;

    assert_eq!(player.position(), 2);
    assert_eq!(synth.spoken().last().unwrap(), "Three.");
}

#[tokio::test]
async fn test_seek_before_play_is_noop() {
    let (mut player, synth) = player_with_synth(true);

    player.seek_to_segment(3).await;
    assert!(synth.spoken().is_empty());
    assert!(!player.is_playing());
}

#[tokio::test]
async fn test_pause_resume_stop() {
    let (mut player, synth) = player_with_synth(true);

    player.play("Some reply.").await;
    assert!(player.is_playing());

    player.pause().await;
    assert!(!player.is_playing());

    player.resume().await;
    assert!(player.is_playing());

    player.stop().await;
    assert!(!player.is_playing());
    assert_eq!(synth.active_count(), 0);
}

#[tokio::test]
async fn test_unsupported_backend_is_silent_noop() {
    let (mut player, synth) = player_with_synth(false);

    // Never panics, never errors into the caller
    player.play("Nobody hears this.").await;

    assert!(!player.is_playing());
    assert!(synth.spoken().is_empty());
}

#[tokio::test]
async fn test_sink_handles_track_teardown() {
    let sink = LoopbackSink::new();

    let mut first = sink.play(vec![0u8; 1000]).await.unwrap();
    let _second = sink.play(vec![0u8; 2000]).await.unwrap();
    assert_eq!(sink.active_count(), 2);

    first.stop().await;
    assert_eq!(sink.active_count(), 1);
    assert_eq!(sink.played_sizes(), vec![1000, 2000]);
}
