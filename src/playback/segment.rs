/// Split body text into sentence-like units on sentence-ending punctuation
/// followed by whitespace (or end of text).
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        let terminal = matches!(c, '.' | '!' | '?' | '。' | '！' | '？');
        let boundary = terminal && chars.peek().map_or(true, |next| next.is_whitespace());

        if boundary {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            let segment = current.trim();
            if !segment.is_empty() {
                segments.push(segment.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        segments.push(tail.to_string());
    }

    segments
}

/// Text from the clamped segment index through the end of the body —
/// seeking plays the rest of the text, not just one unit, to preserve
/// natural flow.
pub fn tail_from(segments: &[String], index: usize) -> String {
    if segments.is_empty() {
        return String::new();
    }
    let clamped = index.min(segments.len() - 1);
    segments[clamped..].join(" ")
}
