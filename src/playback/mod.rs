//! Speech playback: sentence segmentation for seek controls and a player
//! that guarantees at most one audible stream at a time.

mod backend;
mod player;
mod segment;

pub use backend::{OnDeviceSpeechBackend, PlaybackBackend, RemoteTtsBackend};
pub use player::Player;
pub use segment::{split_sentences, tail_from};
