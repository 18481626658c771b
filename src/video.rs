use crate::ass::{SubtitleStyle, write_document};
use crate::captions::{CaptionCue, ChunkLimits, FillerFilter, chunk_segments};
use crate::compositor::Compositor;
use crate::transcript::TranscriptSource;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Caption settings shared by every video.
#[derive(Debug, Clone, Default)]
pub struct CaptionSettings {
    pub limits: ChunkLimits,
    pub filler: FillerFilter,
    pub style: SubtitleStyle,
}

/// Files involved in producing one captioned video.
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub audio: PathBuf,
    pub clip: PathBuf,
    pub subtitles: PathBuf,
    pub muxed: PathBuf,
    pub output: PathBuf,
}

impl VideoJob {
    pub fn in_dir(dir: &Path, audio: PathBuf, clip: PathBuf) -> Self {
        Self {
            audio,
            clip,
            subtitles: dir.join("subtitles.ass"),
            muxed: dir.join("temp_video.mp4"),
            output: dir.join("final_video.mp4"),
        }
    }
}

/// Transcribes the narration and writes the karaoke subtitle file.
pub fn write_captions(
    transcriber: &dyn TranscriptSource,
    audio: &Path,
    subtitles: &Path,
    settings: &CaptionSettings,
) -> anyhow::Result<Vec<CaptionCue>> {
    let segments = transcriber
        .transcribe(audio)
        .with_context(|| format!("transcribing {}", audio.display()))?;
    let cues = chunk_segments(&segments, &settings.limits, &settings.filler);
    info!("Built {} caption cues from {} segments", cues.len(), segments.len());
    if cues.is_empty() {
        warn!("Transcript produced no captions for {}", audio.display());
    }
    write_document(subtitles, &cues, &settings.style)?;
    Ok(cues)
}

/// Captions, muxes and burns in. Any failure aborts the job.
pub fn create_captioned_video(
    transcriber: &dyn TranscriptSource,
    compositor: &dyn Compositor,
    job: &VideoJob,
    settings: &CaptionSettings,
) -> anyhow::Result<PathBuf> {
    write_captions(transcriber, &job.audio, &job.subtitles, settings)?;
    compositor.mux(&job.clip, &job.audio, &job.muxed)?;
    compositor.burn_subtitles(&job.muxed, &job.subtitles, &job.output)?;

    if job.muxed.exists() {
        fs::remove_file(&job.muxed)?;
    }
    info!("Final video written to {}", job.output.display());
    Ok(job.output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{Segment, Word};
    use std::cell::RefCell;

    struct FixedTranscript(Vec<Segment>);

    impl TranscriptSource for FixedTranscript {
        fn transcribe(&self, _audio: &Path) -> anyhow::Result<Vec<Segment>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenTranscript;

    impl TranscriptSource for BrokenTranscript {
        fn transcribe(&self, _audio: &Path) -> anyhow::Result<Vec<Segment>> {
            anyhow::bail!("audio file is corrupt")
        }
    }

    #[derive(Default)]
    struct FakeCompositor {
        fail_mux: bool,
        calls: RefCell<Vec<&'static str>>,
    }

    impl Compositor for FakeCompositor {
        fn mux(&self, _video: &Path, _audio: &Path, out: &Path) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("mux");
            if self.fail_mux {
                anyhow::bail!("ffmpeg exited with 1");
            }
            fs::write(out, b"muxed")?;
            Ok(())
        }

        fn burn_subtitles(&self, _video: &Path, subtitles: &Path, out: &Path) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("burn");
            assert!(subtitles.exists());
            fs::write(out, b"final")?;
            Ok(())
        }
    }

    fn transcript() -> FixedTranscript {
        FixedTranscript(vec![vec![Word::new("Hello", 0.0, 0.4), Word::new("world", 0.45, 0.9)]])
    }

    #[test]
    fn runs_both_passes_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let job = VideoJob::in_dir(dir.path(), dir.path().join("audio.mp3"), dir.path().join("clip.mp4"));
        let compositor = FakeCompositor::default();

        let out = create_captioned_video(&transcript(), &compositor, &job, &CaptionSettings::default()).unwrap();

        assert_eq!(out, dir.path().join("final_video.mp4"));
        assert_eq!(*compositor.calls.borrow(), vec!["mux", "burn"]);
        assert!(!job.muxed.exists());
        let subs = fs::read_to_string(&job.subtitles).unwrap();
        assert!(subs.contains("Dialogue: 0,0:00:00.00,0:00:00.90,Burst,,0,0,0,,{\\k45}Hello {\\k45}world"));
    }

    #[test]
    fn mux_failure_stops_before_burn() {
        let dir = tempfile::tempdir().unwrap();
        let job = VideoJob::in_dir(dir.path(), dir.path().join("audio.mp3"), dir.path().join("clip.mp4"));
        let compositor = FakeCompositor {
            fail_mux: true,
            ..Default::default()
        };

        let err = create_captioned_video(&transcript(), &compositor, &job, &CaptionSettings::default()).unwrap_err();

        assert!(err.to_string().contains("ffmpeg exited"));
        assert_eq!(*compositor.calls.borrow(), vec!["mux"]);
        assert!(!job.output.exists());
    }

    #[test]
    fn transcript_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let job = VideoJob::in_dir(dir.path(), dir.path().join("audio.mp3"), dir.path().join("clip.mp4"));
        let compositor = FakeCompositor::default();

        let err = create_captioned_video(&BrokenTranscript, &compositor, &job, &CaptionSettings::default())
            .unwrap_err();

        assert!(format!("{:#}", err).contains("audio file is corrupt"));
        assert!(compositor.calls.borrow().is_empty());
    }
}
