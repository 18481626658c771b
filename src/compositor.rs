use crate::error::run_tool;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::{error, info};

/// The two ffmpeg passes that turn a silent clip into the captioned short.
pub trait Compositor {
    /// Mux `video` with `audio`, stopping at the shorter of the two.
    fn mux(&self, video: &Path, audio: &Path, out: &Path) -> anyhow::Result<()>;
    /// Burn the subtitle file into `video`.
    fn burn_subtitles(&self, video: &Path, subtitles: &Path, out: &Path) -> anyhow::Result<()>;
}

pub struct Ffmpeg;

/// Escapes a path for use inside an ffmpeg filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(normalized.len() + 8);
    for ch in normalized.chars() {
        match ch {
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\\'"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn mux_args(video: &Path, audio: &Path, out: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), video.into(), "-i".into(), audio.into()];
    for a in ["-c:v", "copy", "-c:a", "aac", "-map", "0:v:0", "-map", "1:a:0", "-shortest"] {
        args.push(a.into());
    }
    args.push(out.into());
    args
}

fn burn_args(video: &Path, subtitles: &Path, out: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        video.into(),
        "-vf".into(),
        format!("ass={}", escape_filter_path(subtitles)).into(),
        "-c:a".into(),
        "copy".into(),
        out.into(),
    ]
}

impl Compositor for Ffmpeg {
    fn mux(&self, video: &Path, audio: &Path, out: &Path) -> anyhow::Result<()> {
        info!("Combining video and audio into {}", out.display());
        let mut cmd = Command::new("ffmpeg");
        cmd.args(mux_args(video, audio, out));
        if let Err(e) = run_tool("ffmpeg", &mut cmd) {
            error!("Video/audio combination failed: {}", e);
            return Err(e.into());
        }
        info!("Completed combining video and audio");
        Ok(())
    }

    fn burn_subtitles(&self, video: &Path, subtitles: &Path, out: &Path) -> anyhow::Result<()> {
        info!("Burning subtitles {} into {}", subtitles.display(), out.display());
        let mut cmd = Command::new("ffmpeg");
        cmd.args(burn_args(video, subtitles, out));
        if let Err(e) = run_tool("ffmpeg", &mut cmd) {
            error!("Subtitle burning failed: {}", e);
            return Err(e.into());
        }
        info!("Completed burning subtitles");
        Ok(())
    }
}
