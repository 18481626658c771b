use crate::audio::{media_duration_seconds, probe_duration_seconds};
use crate::error::run_tool;
use rand::Rng;
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Picks where a clip of `clip_len` seconds starts inside a video of `video_len`.
pub fn pick_window<R: Rng>(video_len: f64, clip_len: f64, rng: &mut R) -> anyhow::Result<(f64, f64)> {
    let max_start = video_len - clip_len;
    if max_start <= 0.0 {
        anyhow::bail!(
            "Audio ({:.2}s) is longer than or equal to the video ({:.2}s)",
            clip_len,
            video_len
        );
    }
    let start = rng.gen_range(0.0..max_start);
    Ok((start, start + clip_len))
}

/// Cuts a random, silent window of the background video as long as the narration.
pub fn clip_background(background: &Path, audio: &Path, out: &Path) -> anyhow::Result<()> {
    let video_len = probe_duration_seconds(background)?;
    let audio_len = media_duration_seconds(audio)?;
    let (start, end) = pick_window(video_len, audio_len, &mut rand::thread_rng())?;

    info!("Creating video clip {:.2}s-{:.2}s of {}", start, end, background.display());
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-ss")
        .arg(format!("{:.3}", start))
        .arg("-i")
        .arg(background)
        .arg("-t")
        .arg(format!("{:.3}", audio_len))
        .args(["-an", "-c:v", "libx264"])
        .arg(out);
    run_tool("ffmpeg", &mut cmd)?;
    info!("Completed creating video clip {}", out.display());
    Ok(())
}
