/// Markers the recognizer emits for non-speech audio; stripped before text is
/// accumulated.
const NOISE_MARKERS: &[&str] = &[
    "[BLANK_AUDIO]",
    "[ Silence ]",
    "[silence]",
    "(silence)",
    "[inaudible]",
    "(inaudible)",
    "[Music]",
    "[music]",
    "(music)",
    "[SOUND]",
    "[NOISE]",
];

/// Accumulates recognized chunk text into a running transcript.
///
/// Chunk boundaries are non-overlapping, so only exact repeats get filtered:
/// a chunk whose cleaned text matches the immediately preceding chunk's text
/// after trimming and case-folding is dropped. Legitimately repeated speech
/// across a boundary is therefore also dropped; that is the recorder's
/// long-standing behavior and is preserved as-is.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    segments: Vec<String>,
    last_key: Option<String>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strip noise markers and collapse whitespace.
    pub fn clean(raw: &str) -> String {
        let mut text = raw.to_string();
        for marker in NOISE_MARKERS {
            text = text.replace(marker, " ");
        }

        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Clean `raw` and append it unless it is empty or duplicates the
    /// immediately preceding chunk's output. Returns true when the text was
    /// appended. The comparison key always tracks the latest chunk, so an
    /// empty chunk in between lets a repeat through.
    pub fn push(&mut self, raw: &str) -> bool {
        let cleaned = Self::clean(raw);
        let key = cleaned.trim().to_lowercase();
        let duplicate = !key.is_empty() && self.last_key.as_deref() == Some(key.as_str());
        self.last_key = Some(key);

        if cleaned.is_empty() || duplicate {
            return false;
        }

        self.segments.push(cleaned);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The full transcript, one chunk per line.
    pub fn text(&self) -> String {
        self.segments.join("\n")
    }
}
