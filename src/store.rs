//! SQLite store for scraped posts and the stories generated from them.
//!
//! The weekly refresher and the video loop share one connection; every
//! operation takes the lock for its own duration only.

use anyhow::Context;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPost {
    pub id: String,
    pub subreddit: String,
    pub title: String,
    pub author: String,
    pub score: i64,
    pub body: String,
}

pub struct StoryStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    subreddit TEXT NOT NULL,
    title TEXT,
    author TEXT,
    score INTEGER,
    body TEXT
);
CREATE TABLE IF NOT EXISTS generated_stories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    body TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
";

/// Posts shorter than this are not used as inspiration.
const MIN_BODY_CHARS: i64 = 100;

impl StoryStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening story database at {}", path.display());
        let conn = Connection::open(path).with_context(|| format!("opening database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA).context("creating schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("story database lock poisoned: {}", e))
    }

    /// Inserts a post unless its id is already known. Returns whether it was new.
    pub fn insert_post(&self, post: &StoredPost) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO posts (id, subreddit, title, author, score, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![post.id, post.subreddit, post.title, post.author, post.score, post.body],
        )?;
        Ok(changed > 0)
    }

    pub fn post_count(&self) -> anyhow::Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn random_posts(&self, subreddit: &str, count: usize) -> anyhow::Result<Vec<StoredPost>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, subreddit, title, author, score, body FROM posts
             WHERE subreddit = ?1 AND body IS NOT NULL AND LENGTH(body) > ?2
             ORDER BY RANDOM()
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![subreddit, MIN_BODY_CHARS, count as i64], |row| {
            Ok(StoredPost {
                id: row.get(0)?,
                subreddit: row.get(1)?,
                title: row.get(2)?,
                author: row.get(3)?,
                score: row.get(4)?,
                body: row.get(5)?,
            })
        })?;
        let posts = rows.collect::<Result<Vec<_>, _>>()?;
        debug!("Picked {} random posts from r/{}", posts.len(), subreddit);
        Ok(posts)
    }

    pub fn save_generated(&self, title: &str, body: &str) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO generated_stories (title, body) VALUES (?1, ?2)",
            params![title, body],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn generated_count(&self) -> anyhow::Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM generated_stories", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
