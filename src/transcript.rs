use crate::error::{MediaError, run_tool};
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// A single transcribed word with its position in the narration, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    /// The word exactly as the transcriber emitted it, leading space included.
    /// Caption length limits are measured on this form.
    pub raw: String,
    pub start: f64,
    pub end: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        let text = text.into();
        Self {
            raw: text.clone(),
            text,
            start,
            end,
        }
    }

    /// Keeps the transcriber's spacing in `raw` and a trimmed `text`.
    pub fn from_transcriber(raw: impl Into<String>, start: f64, end: f64) -> Self {
        let raw = raw.into();
        Self {
            text: raw.trim().to_string(),
            raw,
            start,
            end,
        }
    }
}

/// One contiguous utterance as reported by the transcriber.
pub type Segment = Vec<Word>;

/// Anything that can turn an audio file into word-timed segments.
pub trait TranscriptSource {
    fn transcribe(&self, audio: &Path) -> anyhow::Result<Vec<Segment>>;
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    words: Vec<WhisperWord>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
}

/// Parses whisper's JSON output (`--output_format json --word_timestamps True`).
pub fn parse_whisper_json(data: &str) -> anyhow::Result<Vec<Segment>> {
    let parsed: WhisperOutput = serde_json::from_str(data).context("invalid transcript JSON")?;
    let segments = parsed
        .segments
        .into_iter()
        .map(|seg| {
            seg.words
                .into_iter()
                .map(|w| Word::from_transcriber(w.word, w.start, w.end))
                .collect()
        })
        .collect();
    Ok(segments)
}

/// Reads a transcript that was saved to disk earlier.
pub struct JsonTranscript {
    pub path: PathBuf,
}

impl TranscriptSource for JsonTranscript {
    fn transcribe(&self, _audio: &Path) -> anyhow::Result<Vec<Segment>> {
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("reading transcript {}", self.path.display()))?;
        parse_whisper_json(&data)
    }
}

/// Runs the `whisper` command-line transcriber with word timestamps enabled.
#[derive(Debug, Clone)]
pub struct WhisperCli {
    pub binary: String,
    pub model: String,
    pub work_dir: PathBuf,
}

impl WhisperCli {
    fn output_path(&self, audio: &Path) -> PathBuf {
        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        self.work_dir.join(format!("{}.json", stem))
    }
}

impl TranscriptSource for WhisperCli {
    fn transcribe(&self, audio: &Path) -> anyhow::Result<Vec<Segment>> {
        info!("Transcribing {} with whisper model {}", audio.display(), self.model);
        fs::create_dir_all(&self.work_dir)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(audio)
            .args(["--model", self.model.as_str()])
            .args(["--word_timestamps", "True"])
            .args(["--output_format", "json"])
            .args(["--verbose", "False"])
            .arg("--output_dir")
            .arg(&self.work_dir);
        run_tool("whisper", &mut cmd)?;

        let out = self.output_path(audio);
        if !out.exists() {
            return Err(MediaError::MissingOutput {
                tool: "whisper",
                path: out,
            }
            .into());
        }
        let data = fs::read_to_string(&out)?;
        let segments = parse_whisper_json(&data)?;
        debug!(
            "Transcript has {} segments, {} words",
            segments.len(),
            segments.iter().map(Vec::len).sum::<usize>()
        );
        Ok(segments)
    }
}
