//! Per-word `\k` timings for karaoke-style highlighting.

use crate::captions::CaptionCue;

/// Cues shorter than this are timed as if they lasted `FALLBACK_CUE_SECONDS`.
const MIN_CUE_SECONDS: f64 = 0.1;
const FALLBACK_CUE_SECONDS: f64 = 0.5;
/// Floor for a single word's highlight, in centiseconds.
pub const MIN_WORD_CENTIS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KaraokeSpan {
    pub text: String,
    pub centis: u32,
}

/// Splits the cue's duration evenly across its words.
///
/// Every word gets the same weight regardless of its length. Only the timing
/// math uses the fallback duration; the cue itself keeps its real bounds.
pub fn karaoke_spans(cue: &CaptionCue) -> Vec<KaraokeSpan> {
    let words: Vec<&str> = cue.text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut duration = cue.duration();
    if duration < MIN_CUE_SECONDS {
        duration = FALLBACK_CUE_SECONDS;
    }
    let per_word = duration / words.len() as f64;
    let centis = ((per_word * 100.0) as u32).max(MIN_WORD_CENTIS);

    words
        .into_iter()
        .map(|word| KaraokeSpan {
            text: word.to_string(),
            centis,
        })
        .collect()
}

/// Renders spans as `{\kN}word`, separated by single spaces.
pub fn karaoke_text(spans: &[KaraokeSpan]) -> String {
    let mut out = String::new();
    for (i, span) in spans.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{{\\k{}}}{}", span.centis, escape_braces(&span.text)));
    }
    out
}

// Literal braces in a word would otherwise open an override block.
fn escape_braces(word: &str) -> String {
    word.replace('{', "\\{").replace('}', "\\}")
}
