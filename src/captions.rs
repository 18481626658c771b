//! Groups transcribed words into short on-screen caption cues.

use crate::transcript::{Segment, Word};
use std::collections::HashSet;

/// One caption interval. `start`/`end` come straight from its first and last word.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl CaptionCue {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Limits that force a cue break.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkLimits {
    pub max_words: usize,
    pub max_chars: usize,
    /// Silence (seconds) between two words above which a new cue starts.
    pub max_pause: f64,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_words: 3,
            max_chars: 20,
            max_pause: 0.8,
        }
    }
}

/// Words that never make it into captions, compared after trimming and lowercasing.
#[derive(Debug, Clone, Default)]
pub struct FillerFilter {
    words: HashSet<String>,
}

impl FillerFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words.into_iter().map(|w| normalize(w.as_ref())).collect(),
        }
    }

    pub fn is_filler(&self, text: &str) -> bool {
        !self.words.is_empty() && self.words.contains(&normalize(text))
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Splits every segment into cues. Indices run from 1 across all segments.
pub fn chunk_segments(segments: &[Segment], limits: &ChunkLimits, filter: &FillerFilter) -> Vec<CaptionCue> {
    let mut cues = Vec::new();
    for segment in segments {
        chunk_segment(segment, limits, filter, &mut cues);
    }
    cues
}

fn chunk_segment(words: &[Word], limits: &ChunkLimits, filter: &FillerFilter, cues: &mut Vec<CaptionCue>) {
    let mut buffer: Vec<&Word> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        if filter.is_filler(&word.text) {
            continue;
        }
        buffer.push(word);

        // The pause check looks at the next raw word, filtered or not.
        let next = words.get(i + 1);
        let word_limit = buffer.len() >= limits.max_words;
        let char_limit = join_raw(&buffer).chars().count() >= limits.max_chars;
        let pause = next.is_some_and(|n| n.start - word.end > limits.max_pause);
        let end_of_segment = next.is_none();

        if word_limit || char_limit || pause || end_of_segment {
            flush(&mut buffer, cues);
        }
    }

    // Words held back by a trailing filler still belong to this segment.
    flush(&mut buffer, cues);
}

fn flush(buffer: &mut Vec<&Word>, cues: &mut Vec<CaptionCue>) {
    let (Some(first), Some(last)) = (buffer.first(), buffer.last()) else {
        return;
    };
    let text = join(buffer);
    let text = text.trim();
    if !text.is_empty() {
        cues.push(CaptionCue {
            index: cues.len() + 1,
            start: first.start,
            end: last.end,
            text: text.to_string(),
        });
    }
    buffer.clear();
}

fn join(words: &[&Word]) -> String {
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// Leading spaces from the transcriber count towards the limit.
fn join_raw(words: &[&Word]) -> String {
    words
        .iter()
        .map(|w| w.raw.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
