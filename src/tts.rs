//! Narration: ElevenLabs first, the local piper engine when the API is down.

use crate::error::MediaError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{error, info, warn};

const API_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const VOICE_IDS: [&str; 2] = ["IRHApOXLvnW57QJPQH2P", "BAdH0bMfq6VleQGLXj38"];
const TTS_MODEL: &str = "eleven_turbo_v2_5";
const OUTPUT_FORMAT: &str = "mp3_22050_32";

pub fn tts_generate_piper(binary: &str, model: &str, text: &str, out_path: &Path) -> anyhow::Result<()> {
    info!("Calling piper TTS for output file {}", out_path.display());

    let mut child = Command::new(binary)
        .args(["--model", model, "--output_file"])
        .arg(out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| MediaError::Spawn { tool: "piper", source })?;

    {
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Failed to open piper stdin"))?;
        stdin.write_all(text.as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        error!("Piper TTS command failed for {}", out_path.display());
        anyhow::bail!("TTS engine failed, command returned {}", status);
    }
    Ok(())
}

/// Which voice spoke last and whether the API is currently bypassed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarratorState {
    pub last_voice: Option<String>,
    pub failsafe: bool,
}

impl NarratorState {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Alternates between the two voices, starting with the second one.
    pub fn next_voice(&mut self) -> &'static str {
        let next = if self.last_voice.as_deref() == Some(VOICE_IDS[1]) {
            VOICE_IDS[0]
        } else {
            VOICE_IDS[1]
        };
        self.last_voice = Some(next.to_string());
        next
    }
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
    speed: f32,
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_settings: Option<VoiceSettings>,
}

pub struct PiperConfig {
    pub binary: String,
    pub model: String,
}

pub struct Narrator {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    piper: PiperConfig,
    state_path: PathBuf,
    state: NarratorState,
    out_dir: PathBuf,
}

impl Narrator {
    pub fn new(api_key: Option<String>, piper: PiperConfig, state_path: PathBuf, out_dir: PathBuf) -> anyhow::Result<Self> {
        let state = NarratorState::load(&state_path)?;
        if api_key.is_none() {
            warn!("ELEVENLABS_API_KEY not set; narration will use piper only");
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_base: API_BASE.to_string(),
            api_key,
            piper,
            state_path,
            state,
            out_dir,
        })
    }

    async fn eleven_labs(&self, key: &str, voice: &str, request: &TtsRequest<'_>) -> anyhow::Result<Vec<u8>> {
        let url = format!("{}/{}?output_format={}", self.api_base, voice, OUTPUT_FORMAT);
        let res = self
            .http
            .post(&url)
            .header("xi-api-key", key)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            anyhow::bail!("ElevenLabs returned no audio");
        }
        Ok(bytes.to_vec())
    }

    /// Sends a tiny request to see whether the API works again.
    async fn probe_api(&self, key: &str) -> bool {
        let request = TtsRequest {
            text: "test",
            model_id: TTS_MODEL,
            voice_settings: None,
        };
        self.eleven_labs(key, VOICE_IDS[0], &request).await.is_ok()
    }

    fn set_failsafe(&mut self, on: bool) -> anyhow::Result<()> {
        self.state.failsafe = on;
        self.state.save(&self.state_path)
    }

    async fn piper_fallback(&self, text: &str) -> anyhow::Result<PathBuf> {
        info!("Using piper");
        let out = self.out_dir.join("audio.wav");
        let (binary, model, text, target) = (
            self.piper.binary.clone(),
            self.piper.model.clone(),
            text.to_string(),
            out.clone(),
        );
        tokio::task::spawn_blocking(move || tts_generate_piper(&binary, &model, &text, &target)).await??;
        info!("Completed generating audio");
        Ok(out)
    }

    /// Produces the narration file and returns its path.
    pub async fn narrate(&mut self, text: &str) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.out_dir)?;
        let Some(key) = self.api_key.clone() else {
            return self.piper_fallback(text).await;
        };

        if self.state.failsafe {
            if self.probe_api(&key).await {
                info!("ElevenLabs reachable again, leaving failsafe mode");
                self.set_failsafe(false)?;
            } else {
                return self.piper_fallback(text).await;
            }
        }

        info!("Using ElevenLabs");
        let voice = self.state.next_voice();
        self.state.save(&self.state_path)?;
        let request = TtsRequest {
            text,
            model_id: TTS_MODEL,
            voice_settings: Some(VoiceSettings {
                stability: 0.0,
                similarity_boost: 1.0,
                style: 0.0,
                use_speaker_boost: true,
                speed: 1.2,
            }),
        };

        match self.eleven_labs(&key, voice, &request).await {
            Ok(audio) => {
                let out = self.out_dir.join("audio.mp3");
                fs::write(&out, audio)?;
                info!("Completed generating audio");
                Ok(out)
            }
            Err(e) => {
                error!("ElevenLabs failed: {}", e);
                self.set_failsafe(true)?;
                self.piper_fallback(text).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn voices_alternate() {
        let mut state = NarratorState::default();
        let first = state.next_voice();
        let second = state.next_voice();
        let third = state.next_voice();
        assert_eq!(first, VOICE_IDS[1]);
        assert_eq!(second, VOICE_IDS[0]);
        assert_eq!(third, VOICE_IDS[1]);
    }

    #[test]
    fn state_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrator.json");
        assert_eq!(NarratorState::load(&path).unwrap(), NarratorState::default());

        let mut state = NarratorState::default();
        state.next_voice();
        state.failsafe = true;
        state.save(&path).unwrap();
        assert_eq!(NarratorState::load(&path).unwrap(), state);
    }

    #[test]
    fn request_omits_missing_settings() {
        let request = TtsRequest {
            text: "test",
            model_id: TTS_MODEL,
            voice_settings: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"text": "test", "model_id": "eleven_turbo_v2_5"}));
    }

    // Nothing listens on port 1, so every API call fails fast.
    const DEAD_API: &str = "http://127.0.0.1:1/v1/text-to-speech";

    fn narrator(dir: &Path, api_base: &str) -> Narrator {
        let mut narrator = Narrator::new(
            Some("key".into()),
            PiperConfig {
                binary: "no-such-piper-binary".into(),
                model: "model.onnx".into(),
            },
            dir.join("narrator.json"),
            dir.join("out"),
        )
        .unwrap();
        narrator.api_base = api_base.to_string();
        narrator.http = reqwest::Client::builder().no_proxy().build().unwrap();
        narrator
    }

    fn is_piper_spawn_error(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<MediaError>(), Some(MediaError::Spawn { tool: "piper", .. }))
    }

    async fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    return Ok(());
                }
            }
        }
    }

    /// Answers every request with a tiny mp3 body and counts the hits.
    async fn fake_api() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = read_request(&mut stream).await;
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: audio/mpeg\r\ncontent-length: 4\r\nconnection: close\r\n\r\nID3!")
                    .await;
                let _ = stream.shutdown().await;
            }
        });
        (format!("http://{}/v1/text-to-speech", addr), hits)
    }

    #[tokio::test]
    async fn api_failure_enters_failsafe_and_uses_piper() {
        let dir = tempfile::tempdir().unwrap();
        let mut narrator = narrator(dir.path(), DEAD_API);

        let err = narrator.narrate("hello").await.unwrap_err();
        assert!(is_piper_spawn_error(&err), "unexpected error: {:#}", err);

        let saved = NarratorState::load(&dir.path().join("narrator.json")).unwrap();
        assert!(saved.failsafe);
        assert_eq!(saved.last_voice.as_deref(), Some(VOICE_IDS[1]));
    }

    #[tokio::test]
    async fn failsafe_with_dead_api_skips_elevenlabs() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("narrator.json");
        let before = NarratorState {
            last_voice: Some(VOICE_IDS[0].to_string()),
            failsafe: true,
        };
        before.save(&state_path).unwrap();
        let mut narrator = narrator(dir.path(), DEAD_API);

        let err = narrator.narrate("hello").await.unwrap_err();
        assert!(is_piper_spawn_error(&err), "unexpected error: {:#}", err);

        // No voice was picked, so no narration request went out.
        assert_eq!(NarratorState::load(&state_path).unwrap(), before);
    }

    #[tokio::test]
    async fn working_api_leaves_failsafe() {
        let (api, hits) = fake_api().await;
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("narrator.json");
        NarratorState {
            last_voice: None,
            failsafe: true,
        }
        .save(&state_path)
        .unwrap();
        let mut narrator = narrator(dir.path(), &api);

        let out = narrator.narrate("hello").await.unwrap();
        assert_eq!(out, dir.path().join("out").join("audio.mp3"));
        assert_eq!(fs::read(&out).unwrap(), b"ID3!");
        // One health check, then the narration itself.
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let saved = NarratorState::load(&state_path).unwrap();
        assert!(!saved.failsafe);
        assert_eq!(saved.last_voice.as_deref(), Some(VOICE_IDS[1]));
    }

    #[test]
    fn missing_piper_binary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.wav");
        assert!(tts_generate_piper("no-such-piper-binary", "model.onnx", "hi", &out).is_err());
    }
}
