mod args;
mod ass;
mod audio;
mod captions;
mod clip;
mod compositor;
mod error;
mod generator;
mod karaoke;
mod reddit;
mod store;
mod transcript;
mod tts;
mod upload;
mod video;

use anyhow::Context;
use args::{Args, CaptionArgs, Command, RunArgs, StoreArgs};
use clap::Parser;
use compositor::Ffmpeg;
use generator::StoryGenerator;
use reddit::RedditClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use store::StoryStore;
use tokio::task;
use tokio::time::sleep;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use transcript::{JsonTranscript, TranscriptSource, WhisperCli};
use tts::{Narrator, PiperConfig};
use upload::{ShortMetadata, Uploader};
use video::{CaptionSettings, VideoJob};

const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the variables may come from the environment.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Run(run) => run_forever(run).await,
        Command::Once(run) => {
            let mut bot = Bot::new(&run).await?;
            bot.produce_one().await.map(|_| ())
        }
        Command::Refresh(store_args) => refresh(&store_args).await,
        Command::Captions(caption_args) => captions_only(&caption_args),
    }
}

fn captions_only(args: &CaptionArgs) -> anyhow::Result<()> {
    let settings = CaptionSettings {
        limits: args.chunk.limits()?,
        filler: args.chunk.filter(),
        ..CaptionSettings::default()
    };
    let (source, audio): (Box<dyn TranscriptSource>, &Path) = match (&args.transcript, &args.audio) {
        (Some(path), _) => (
            Box::new(JsonTranscript { path: path.clone() }) as Box<dyn TranscriptSource>,
            path.as_path(),
        ),
        (None, Some(audio)) => {
            let work_dir = args
                .out
                .parent()
                .map(|p| p.join("whisper"))
                .unwrap_or_else(|| "whisper".into());
            let cli = WhisperCli {
                binary: args.whisper.whisper_bin.clone(),
                model: args.whisper.whisper_model.clone(),
                work_dir,
            };
            (Box::new(cli) as Box<dyn TranscriptSource>, audio.as_path())
        }
        (None, None) => anyhow::bail!("either --audio or --transcript is required"),
    };
    let cues = video::write_captions(source.as_ref(), audio, &args.out, &settings)?;
    info!("Wrote {} captions to {}", cues.len(), args.out.display());
    Ok(())
}

async fn refresh(args: &StoreArgs) -> anyhow::Result<()> {
    let store = StoryStore::open(&args.database)?;
    let client = RedditClient::new();
    if store.post_count()? == 0 {
        reddit::load_top_posts(&client, &store, &args.subreddit).await?;
    }
    reddit::update_hot_stories(&client, &store, &args.subreddit).await?;
    info!(
        "Store holds {} posts and {} generated stories",
        store.post_count()?,
        store.generated_count()?
    );
    Ok(())
}

/// Everything one video needs, built once and reused by the loop.
struct Bot {
    store: Arc<StoryStore>,
    subreddit: String,
    generator: StoryGenerator,
    narrator: Narrator,
    transcriber: WhisperCli,
    settings: CaptionSettings,
    background: PathBuf,
    output_dir: PathBuf,
    uploader: Option<Uploader>,
}

impl Bot {
    async fn new(run: &RunArgs) -> anyhow::Result<Self> {
        if !run.background.exists() {
            error!("Background video not found: {}", run.background.display());
            anyhow::bail!("background video {} does not exist", run.background.display());
        }
        info!("Background video found: {}", run.background.display());

        let store = Arc::new(StoryStore::open(&run.store.database)?);
        if store.post_count()? == 0 {
            info!("Story database is empty, loading top posts");
            reddit::load_top_posts(&RedditClient::new(), &store, &run.store.subreddit).await?;
        }

        let generator = StoryGenerator::new(run.openrouter_key.clone().unwrap_or_default(), store.clone())?;
        let narrator = Narrator::new(
            run.elevenlabs_key.clone(),
            PiperConfig {
                binary: run.piper_bin.clone(),
                model: run.piper_model.clone(),
            },
            run.narrator_state.clone(),
            run.output_dir.clone(),
        )?;
        let uploader = if run.no_upload {
            None
        } else {
            Some(Uploader::new(run.youtube_credentials()?))
        };

        Ok(Self {
            store,
            subreddit: run.store.subreddit.clone(),
            generator,
            narrator,
            transcriber: WhisperCli {
                binary: run.whisper.whisper_bin.clone(),
                model: run.whisper.whisper_model.clone(),
                work_dir: run.output_dir.join("whisper"),
            },
            settings: CaptionSettings {
                limits: run.chunk.limits()?,
                filler: run.chunk.filter(),
                ..CaptionSettings::default()
            },
            background: run.background.clone(),
            output_dir: run.output_dir.clone(),
            uploader,
        })
    }

    /// Story, narration, clip, captions and upload for a single video.
    async fn produce_one(&mut self) -> anyhow::Result<PathBuf> {
        let story = self.generator.generate(&self.subreddit).await?;
        let audio = self.narrator.narrate(&story.narration()).await?;

        let clip = self.output_dir.join("clip.mp4");
        {
            let (background, audio, clip) = (self.background.clone(), audio.clone(), clip.clone());
            task::spawn_blocking(move || clip::clip_background(&background, &audio, &clip))
                .await?
                .context("clipping background video")?;
        }

        let job = VideoJob::in_dir(&self.output_dir, audio, clip);
        let transcriber = self.transcriber.clone();
        let settings = self.settings.clone();
        let video =
            task::spawn_blocking(move || video::create_captioned_video(&transcriber, &Ffmpeg, &job, &settings))
                .await??;

        if let Some(uploader) = &self.uploader {
            uploader.upload_short(&video, &ShortMetadata::default()).await?;
        }
        Ok(video)
    }
}

fn spawn_weekly_refresh(store: Arc<StoryStore>, subreddit: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = RedditClient::new();
        let mut ticker = tokio::time::interval(WEEK);
        loop {
            ticker.tick().await;
            if let Err(e) = reddit::update_hot_stories(&client, &store, &subreddit).await {
                error!("Error updating hot stories: {:#}", e);
            }
        }
    })
}

async fn run_forever(run: RunArgs) -> anyhow::Result<()> {
    info!("Bot starting...");
    let mut bot = Bot::new(&run).await?;
    let _refresher = spawn_weekly_refresh(bot.store.clone(), bot.subreddit.clone());

    let mut video_count = 0;
    loop {
        match bot.produce_one().await {
            Ok(path) => {
                video_count += 1;
                info!("Video {} done: {}", video_count, path.display());
                if video_count >= run.videos_per_day {
                    let resume = chrono::Local::now() + chrono::Duration::days(1);
                    info!(
                        "Daily quota of {} videos reached, resuming at {}",
                        run.videos_per_day,
                        resume.format("%Y-%m-%d %H:%M:%S")
                    );
                    sleep(DAY).await;
                    video_count = 0;
                } else {
                    info!("Waiting {} minutes before next video...", run.wait_minutes);
                    sleep(Duration::from_secs(run.wait_minutes * 60)).await;
                }
            }
            Err(e) => {
                error!("Exception occurred while creating video {}: {:#}", video_count + 1, e);
                info!("Retrying in {} minutes...", run.retry_minutes);
                sleep(Duration::from_secs(run.retry_minutes * 60)).await;
            }
        }
    }
}
