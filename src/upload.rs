use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
/// "People & Blogs".
const CATEGORY_ID: &str = "22";

#[derive(Debug, Clone)]
pub struct YoutubeCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl Default for ShortMetadata {
    fn default() -> Self {
        Self {
            title: "Reddit Story: AITA?".to_string(),
            description: "Generated Reddit story".to_string(),
            tags: vec!["AITA".into(), "Reddit".into(), "Shorts".into()],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: Status,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    category_id: &'a str,
    title: &'a str,
    description: String,
    tags: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    privacy_status: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

fn video_resource(meta: &ShortMetadata) -> VideoResource<'_> {
    VideoResource {
        snippet: Snippet {
            category_id: CATEGORY_ID,
            title: &meta.title,
            description: format!("{}\n\n#Shorts", meta.description),
            tags: &meta.tags,
        },
        status: Status {
            privacy_status: "public",
        },
    }
}

pub struct Uploader {
    http: reqwest::Client,
    credentials: YoutubeCredentials,
}

impl Uploader {
    pub fn new(credentials: YoutubeCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(token.access_token)
    }

    /// Uploads the file as a public Short and returns the new video id.
    pub async fn upload_short(&self, file: &Path, meta: &ShortMetadata) -> anyhow::Result<String> {
        info!("Uploading video {}", file.display());
        let result = self.try_upload(file, meta).await;
        match &result {
            Ok(id) => info!("Upload completed: https://youtu.be/{}", id),
            Err(e) => error!("Upload failed: {}", e),
        }
        result
    }

    async fn try_upload(&self, file: &Path, meta: &ShortMetadata) -> anyhow::Result<String> {
        let token = self.access_token().await?;
        let data = tokio::fs::read(file).await?;

        let session = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", data.len())
            .json(&video_resource(meta))
            .send()
            .await?
            .error_for_status()?;
        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow::anyhow!("upload session has no Location header"))?
            .to_string();

        let uploaded: UploadResponse = self
            .http
            .put(&location)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, "video/mp4")
            .header(CONTENT_LENGTH, data.len())
            .body(data)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(uploaded.id)
    }
}
