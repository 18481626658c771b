use crate::error::{MediaError, run_tool};
use hound::WavReader;
use std::path::Path;
use std::process::Command;

pub fn wav_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.len();
    let frames = samples as f64 / spec.channels as f64;
    let duration = frames / spec.sample_rate as f64;
    Ok(duration)
}

/// Container duration as reported by `ffprobe`.
pub fn probe_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let mut cmd = Command::new("ffprobe");
    cmd.args(["-v", "error", "-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(path);
    let stdout = run_tool("ffprobe", &mut cmd)?;
    parse_probe_duration(&String::from_utf8_lossy(&stdout)).map_err(Into::into)
}

fn parse_probe_duration(output: &str) -> Result<f64, MediaError> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| MediaError::Unparsable {
            tool: "ffprobe",
            output: output.to_string(),
        })
}

/// WAV files are measured directly; anything else goes through `ffprobe`.
pub fn media_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let is_wav = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if is_wav {
        wav_duration_seconds(path)
    } else {
        probe_duration_seconds(path)
    }
}
