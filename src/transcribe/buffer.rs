/// Ordered finalized transcript segments plus one interim slot.
///
/// Finalized segments are immutable once appended. The interim segment is
/// replaced wholesale on every update, never appended to. Some engines
/// deliver duplicate/overlapping result bursts, so merging is idempotent:
/// the newly computed finalized-so-far string is compared against the
/// previous one and skipped when unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptBuffer {
    segments: Vec<String>,
    finalized: String,
    interim: String,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the engine's finalized-so-far text. Returns `false` (and leaves
    /// the buffer untouched) when it matches the previous merge.
    pub fn merge_finalized(&mut self, finalized_so_far: &str) -> bool {
        if finalized_so_far == self.finalized {
            return false;
        }

        let delta = finalized_so_far
            .strip_prefix(self.finalized.as_str())
            .unwrap_or(finalized_so_far)
            .to_string();
        if !delta.trim().is_empty() {
            self.segments.push(delta);
        }
        self.finalized = finalized_so_far.to_string();
        true
    }

    /// Append a newly finalized chunk (convenience over `merge_finalized`)
    pub fn append_chunk(&mut self, chunk: &str) -> bool {
        if chunk.is_empty() {
            return false;
        }
        let candidate = format!("{}{} ", self.finalized, chunk);
        self.merge_finalized(&candidate)
    }

    /// Replace the interim (unconfirmed) segment
    pub fn set_interim(&mut self, interim: &str) {
        self.interim = interim.to_string();
    }

    pub fn finalized(&self) -> &str {
        &self.finalized
    }

    pub fn interim(&self) -> &str {
        &self.interim
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Finalized text plus any still-interim tail
    pub fn full_text(&self) -> String {
        let mut text = self.finalized.trim_end().to_string();
        if !self.interim.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(self.interim.trim());
        }
        text
    }

    pub fn is_empty(&self) -> bool {
        self.finalized.trim().is_empty() && self.interim.trim().is_empty()
    }

    /// Cleared on submit or reset
    pub fn clear(&mut self) {
        self.segments.clear();
        self.finalized.clear();
        self.interim.clear();
    }
}
