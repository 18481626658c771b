use crate::store::{StoredPost, StoryStore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const MODEL: &str = "mistralai/mistral-7b-instruct";
const SYSTEM_PROMPT: &str = "You are a creative writer who creates engaging Reddit-style stories. \
Write in first person and make the story compelling and relatable.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// A generated story split into its two parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub title: String,
    pub body: String,
}

impl Story {
    /// Text handed to the narrator.
    pub fn narration(&self) -> String {
        format!("{}: {}", self.title, self.body).replace("AITA", "Am I the asshole")
    }
}

/// Renders inspiration posts as a numbered list for the prompt.
pub fn format_stories_numbered(posts: &[StoredPost]) -> String {
    let mut out = String::new();
    for (i, post) in posts.iter().enumerate() {
        out.push_str(&format!(
            "{}.\nTitle: {}\nAuthor: u/{}\nScore: {}\n\n{}\n\n",
            i + 1,
            post.title,
            post.author,
            post.score,
            post.body
        ));
    }
    out.trim().to_string()
}

/// Pulls `Title: ...` and the body out of the model's answer.
pub fn parse_story(content: &str) -> Option<Story> {
    let re = Regex::new(r"(?s)Title:\s*(.*?)\n\n(.*)$").ok()?;
    let caps = re.captures(content)?;
    let title = caps.get(1)?.as_str().trim().to_string();
    let body = caps.get(2)?.as_str().trim().to_string();
    if title.is_empty() || body.is_empty() {
        return None;
    }
    Some(Story { title, body })
}

pub struct StoryGenerator {
    http: reqwest::Client,
    api_key: String,
    store: Arc<StoryStore>,
}

impl StoryGenerator {
    pub fn new(api_key: String, store: Arc<StoryStore>) -> anyhow::Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("OPENROUTER_API_KEY not set");
        }
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, api_key, store })
    }

    /// Writes a new story inspired by three random stored posts and records it.
    pub async fn generate(&self, subreddit: &str) -> anyhow::Result<Story> {
        info!("Generating story...");
        let posts = self.store.random_posts(subreddit, 3)?;
        if posts.is_empty() {
            error!("No stories found in database for r/{}", subreddit);
            anyhow::bail!("no stored stories for r/{}", subreddit);
        }
        debug!(
            "Inspiration posts: {}",
            posts.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(", ")
        );

        let request = ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: format!(
                        "Create 1 original story inspired by the writing style of the {} stories below. \
                         Format your response as 'Title: [title]' followed by two newlines, then the story body. \
                         Write the story in first person.\n\nHere are the inspiration stories:\n{}",
                        posts.len(),
                        format_stories_numbered(&posts)
                    ),
                },
            ],
        };

        let res = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "http://localhost")
            .json(&request)
            .send()
            .await?;
        if !res.status().is_success() {
            error!("Story API request failed: {}", res.status());
            anyhow::bail!("story API returned {}", res.status());
        }
        let body: ChatResponse = res.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("story API returned no choices"))?;

        let Some(story) = parse_story(&content) else {
            error!("Could not extract title and body from generated story");
            anyhow::bail!("generated story had no 'Title:' header");
        };
        self.store.save_generated(&story.title, &story.body)?;
        info!("Completed generating story: {}", story.title);
        Ok(story)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_body() {
        let story = parse_story("Title: AITA for skipping the wedding?\n\nSo this happened.\n\nThe end.").unwrap();
        assert_eq!(story.title, "AITA for skipping the wedding?");
        assert_eq!(story.body, "So this happened.\n\nThe end.");
        assert_eq!(
            story.narration(),
            "Am I the asshole for skipping the wedding?: So this happened.\n\nThe end."
        );
    }

    #[test]
    fn tolerates_preamble() {
        let story = parse_story("Sure! Here you go.\nTitle:   Lost keys \n\nI lost them.").unwrap();
        assert_eq!(story.title, "Lost keys");
        assert_eq!(story.body, "I lost them.");
    }

    #[test]
    fn rejects_unformatted_answers() {
        assert!(parse_story("Once upon a time...").is_none());
        assert!(parse_story("Title: only a title").is_none());
    }

    #[test]
    fn numbers_inspiration_posts() {
        let post = |id: &str| StoredPost {
            id: id.into(),
            subreddit: "AmItheAsshole".into(),
            title: format!("T{}", id),
            author: "bob".into(),
            score: 10,
            body: "Body".into(),
        };
        let text = format_stories_numbered(&[post("1"), post("2")]);
        assert_eq!(
            text,
            "1.\nTitle: T1\nAuthor: u/bob\nScore: 10\n\nBody\n\n2.\nTitle: T2\nAuthor: u/bob\nScore: 10\n\nBody"
        );
    }

    #[tokio::test]
    async fn empty_store_is_an_error() {
        let store = Arc::new(StoryStore::open_in_memory().unwrap());
        let generator = StoryGenerator::new("key".into(), store).unwrap();
        assert!(generator.generate("AmItheAsshole").await.is_err());
    }

    #[test]
    fn missing_key_is_rejected() {
        let store = Arc::new(StoryStore::open_in_memory().unwrap());
        assert!(StoryGenerator::new(" ".into(), store).is_err());
    }
}
