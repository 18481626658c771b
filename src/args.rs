use crate::captions::{ChunkLimits, FillerFilter};
use crate::upload::YoutubeCredentials;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "storyshorts", about = "Generate and publish captioned story shorts")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Produce videos forever: weekly story refresh, daily quota, retry on failure.
    Run(RunArgs),
    /// Produce and upload a single video, then exit.
    Once(RunArgs),
    /// Fetch stories into the database once.
    Refresh(StoreArgs),
    /// Only write the karaoke subtitle file for a narration.
    Captions(CaptionArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = "stories.db")]
    pub database: PathBuf,

    #[arg(long, default_value = "AmItheAsshole")]
    pub subreddit: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ChunkArgs {
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_words: u64,

    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_chars: u64,

    /// Seconds of silence that start a new caption.
    #[arg(long, default_value_t = 0.8)]
    pub max_pause: f64,

    /// Word left out of captions (repeatable).
    #[arg(long = "filler-word")]
    pub filler_words: Vec<String>,
}

impl ChunkArgs {
    pub fn limits(&self) -> anyhow::Result<ChunkLimits> {
        if self.max_pause.is_nan() || self.max_pause < 0.0 {
            anyhow::bail!("--max-pause must be zero or positive, got {}", self.max_pause);
        }
        Ok(ChunkLimits {
            max_words: self.max_words as usize,
            max_chars: self.max_chars as usize,
            max_pause: self.max_pause,
        })
    }

    pub fn filter(&self) -> FillerFilter {
        FillerFilter::new(&self.filler_words)
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct WhisperArgs {
    #[arg(long, default_value = "whisper")]
    pub whisper_bin: String,

    #[arg(long, default_value = "base")]
    pub whisper_model: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CaptionArgs {
    /// Narration to transcribe.
    #[arg(long, required_unless_present = "transcript")]
    pub audio: Option<PathBuf>,

    /// Previously saved whisper JSON to use instead of transcribing.
    #[arg(long, conflicts_with = "audio")]
    pub transcript: Option<PathBuf>,

    #[arg(long, default_value = "subtitles.ass")]
    pub out: PathBuf,

    #[command(flatten)]
    pub chunk: ChunkArgs,

    #[command(flatten)]
    pub whisper: WhisperArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub chunk: ChunkArgs,

    #[command(flatten)]
    pub whisper: WhisperArgs,

    #[arg(long, default_value = "assets/background.mp4")]
    pub background: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "narrator_state.json")]
    pub narrator_state: PathBuf,

    #[arg(long, default_value = "piper")]
    pub piper_bin: String,

    #[arg(long, default_value = "./tts/en_US-hfc_male-medium.onnx")]
    pub piper_model: String,

    #[arg(long, default_value_t = 8)]
    pub videos_per_day: u32,

    /// Minutes between two videos.
    #[arg(long, default_value_t = 30)]
    pub wait_minutes: u64,

    /// Minutes before retrying a failed video.
    #[arg(long, default_value_t = 5)]
    pub retry_minutes: u64,

    /// Build the video but do not upload it.
    #[arg(long)]
    pub no_upload: bool,

    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_key: Option<String>,

    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    pub elevenlabs_key: Option<String>,

    #[arg(long, env = "YOUTUBE_CLIENT_ID", hide_env_values = true)]
    pub youtube_client_id: Option<String>,

    #[arg(long, env = "YOUTUBE_CLIENT_SECRET", hide_env_values = true)]
    pub youtube_client_secret: Option<String>,

    #[arg(long, env = "YOUTUBE_REFRESH_TOKEN", hide_env_values = true)]
    pub youtube_refresh_token: Option<String>,
}

impl RunArgs {
    pub fn youtube_credentials(&self) -> anyhow::Result<YoutubeCredentials> {
        let get = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} not set", name))
        };
        Ok(YoutubeCredentials {
            client_id: get(&self.youtube_client_id, "YOUTUBE_CLIENT_ID")?,
            client_secret: get(&self.youtube_client_secret, "YOUTUBE_CLIENT_SECRET")?,
            refresh_token: get(&self.youtube_refresh_token, "YOUTUBE_REFRESH_TOKEN")?,
        })
    }
}
