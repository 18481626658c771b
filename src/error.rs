use std::path::PathBuf;
use thiserror::Error;

/// Failures of the external command-line tools (ffmpeg, ffprobe, whisper, piper).
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{tool} did not produce {}", .path.display())]
    MissingOutput { tool: &'static str, path: PathBuf },

    #[error("could not parse {tool} output: {output:?}")]
    Unparsable { tool: &'static str, output: String },
}

impl MediaError {
    /// Builds a `Failed` error keeping the last five lines of stderr.
    pub fn failed(tool: &'static str, status: std::process::ExitStatus, stderr: &[u8]) -> Self {
        let text = String::from_utf8_lossy(stderr);
        let lines: Vec<&str> = text.lines().collect();
        let tail = lines[lines.len().saturating_sub(5)..].join("\n");
        MediaError::Failed {
            tool,
            status,
            stderr: tail,
        }
    }
}

/// Runs a prepared command to completion, capturing its output.
pub fn run_tool(tool: &'static str, cmd: &mut std::process::Command) -> Result<Vec<u8>, MediaError> {
    let output = cmd
        .output()
        .map_err(|source| MediaError::Spawn { tool, source })?;
    if !output.status.success() {
        return Err(MediaError::failed(tool, output.status, &output.stderr));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let err = run_tool("ffmpeg", &mut Command::new("definitely-not-a-real-binary-xyz")).unwrap_err();
        assert!(matches!(err, MediaError::Spawn { tool: "ffmpeg", .. }));
    }

    #[test]
    fn missing_output_names_the_path() {
        let err = MediaError::MissingOutput {
            tool: "whisper",
            path: PathBuf::from("out/audio.json"),
        };
        assert_eq!(err.to_string(), "whisper did not produce out/audio.json");
    }
}
