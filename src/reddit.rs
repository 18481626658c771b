use crate::store::{StoredPost, StoryStore};
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const BASE_URL: &str = "https://www.reddit.com";
const AGENT: &str = "storyshorts-bot/0.1";

#[derive(Debug, Deserialize)]
pub struct RedditListing {
    pub data: RedditListingData,
}

#[derive(Debug, Deserialize)]
pub struct RedditListingData {
    pub children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
pub struct RedditChild {
    pub data: RedditPost,
}

#[derive(Debug, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub score: i64,
    pub over_18: Option<bool>,
    pub stickied: Option<bool>,
}

impl RedditPost {
    fn into_stored(self, subreddit: &str) -> StoredPost {
        StoredPost {
            id: self.id,
            subreddit: subreddit.to_string(),
            title: self.title,
            author: self.author,
            score: self.score,
            body: self.selftext,
        }
    }
}

/// Hot posts are only worth keeping if they are real, safe-for-work text posts.
pub fn is_usable_hot_post(post: &RedditPost) -> bool {
    !post.stickied.unwrap_or(false) && !post.over_18.unwrap_or(false) && !post.selftext.trim().is_empty()
}

pub struct RedditClient {
    http: reqwest::Client,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RedditClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            min_interval: Duration::from_secs(1),
            last_request: Mutex::new(None),
        }
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn listing(&self, subreddit: &str, query: &str) -> anyhow::Result<Vec<RedditPost>> {
        self.rate_limit().await;
        let url = format!("{}/r/{}/{}", BASE_URL, subreddit, query);
        debug!("GET {}", url);
        let res = self
            .http
            .get(&url)
            .header(USER_AGENT, AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let parsed: RedditListing = serde_json::from_str(&res)?;
        Ok(parsed.data.children.into_iter().map(|c| c.data).collect())
    }

    pub async fn top_of_year(&self, subreddit: &str, limit: usize) -> anyhow::Result<Vec<RedditPost>> {
        self.listing(subreddit, &format!("top.json?t=year&limit={}", limit)).await
    }

    pub async fn hot(&self, subreddit: &str, limit: usize) -> anyhow::Result<Vec<RedditPost>> {
        self.listing(subreddit, &format!("hot.json?limit={}", limit)).await
    }
}

impl Default for RedditClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Seeds an empty store with the subreddit's top posts of the year.
pub async fn load_top_posts(client: &RedditClient, store: &StoryStore, subreddit: &str) -> anyhow::Result<usize> {
    let posts = client.top_of_year(subreddit, 100).await?;
    let mut added = 0;
    for post in posts {
        if store.insert_post(&post.into_stored(subreddit))? {
            added += 1;
        }
    }
    info!("Loaded {} top posts from r/{}", added, subreddit);
    Ok(added)
}

/// Adds the current hot posts to the store.
pub async fn update_hot_stories(client: &RedditClient, store: &StoryStore, subreddit: &str) -> anyhow::Result<usize> {
    info!("Updating weekly stories from r/{}", subreddit);
    let posts = client.hot(subreddit, 10).await?;
    let mut added = 0;
    for post in posts {
        if !is_usable_hot_post(&post) {
            debug!("Skipping post (stickied, NSFW or empty): {}", post.title);
            continue;
        }
        if store.insert_post(&post.into_stored(subreddit))? {
            added += 1;
        }
    }
    info!("Completed updating weekly stories ({} new)", added);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": null,
            "children": [
                {"kind": "t3", "data": {"id": "p1", "title": "AITA for leaving?", "selftext": "Long story.",
                    "author": "throwaway", "score": 1200, "over_18": false, "stickied": false}},
                {"kind": "t3", "data": {"id": "p2", "title": "Monthly rules", "selftext": "Rules here",
                    "author": "mod", "score": 5, "stickied": true}},
                {"kind": "t3", "data": {"id": "p3", "title": "Link post", "selftext": "",
                    "author": "x", "score": 1}},
                {"kind": "t3", "data": {"id": "p4", "title": "NSFW", "selftext": "text",
                    "author": "y", "score": 2, "over_18": true}}
            ]
        }
    }"#;

    #[test]
    fn parses_listing_and_filters_hot_posts() {
        let parsed: RedditListing = serde_json::from_str(LISTING).unwrap();
        let posts: Vec<RedditPost> = parsed.data.children.into_iter().map(|c| c.data).collect();
        assert_eq!(posts.len(), 4);
        let usable: Vec<&str> = posts
            .iter()
            .filter(|p| is_usable_hot_post(p))
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(usable, vec!["p1"]);
    }

    #[test]
    fn converts_to_stored_post() {
        let parsed: RedditListing = serde_json::from_str(LISTING).unwrap();
        let post = parsed.data.children.into_iter().next().unwrap().data;
        let stored = post.into_stored("AmItheAsshole");
        assert_eq!(stored.id, "p1");
        assert_eq!(stored.subreddit, "AmItheAsshole");
        assert_eq!(stored.score, 1200);
        assert_eq!(stored.body, "Long story.");
    }

    #[tokio::test]
    async fn rate_limit_spaces_requests() {
        let client = RedditClient {
            http: reqwest::Client::new(),
            min_interval: Duration::from_millis(50),
            last_request: Mutex::new(None),
        };
        let started = Instant::now();
        client.rate_limit().await;
        client.rate_limit().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
