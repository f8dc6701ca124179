mod comments;
mod likes;
mod playlists;
mod stats;
mod subscriptions;
mod tweets;
mod user;
mod videos;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use comments::{Comment, CommentStore, CommentWithOwner};
pub use likes::{LikeStore, LikeTarget, LikedVideo};
pub use playlists::{Playlist, PlaylistStore, PlaylistWithVideos};
pub use stats::{ChannelStats, LikeStats, StatsStore, VideoStats};
pub use subscriptions::{ChannelProfile, SubscriptionStore};
pub use tweets::{Tweet, TweetStore};
pub use user::{NewUser, OwnerSummary, User, UserCredentials, UserStore};
pub use videos::{NewVideo, Video, VideoFilter, VideoSort, VideoStore, VideoWithOwner};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table. refresh_token holds the single live refresh token (or NULL).
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    full_name TEXT NOT NULL,
                    avatar TEXT NOT NULL,
                    cover_image TEXT NOT NULL DEFAULT '',
                    password_hash TEXT NOT NULL,
                    refresh_token TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE TABLE videos (
                    id TEXT PRIMARY KEY NOT NULL,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    video_file TEXT NOT NULL,
                    thumbnail TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    duration REAL NOT NULL DEFAULT 0,
                    views INTEGER NOT NULL DEFAULT 0,
                    is_published INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_videos_owner_id ON videos(owner_id)",
                "CREATE TABLE comments (
                    id TEXT PRIMARY KEY NOT NULL,
                    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_comments_video_id ON comments(video_id)",
                "CREATE TABLE tweets (
                    id TEXT PRIMARY KEY NOT NULL,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_tweets_owner_id ON tweets(owner_id)",
                // A like points at exactly one of video/comment/tweet
                "CREATE TABLE likes (
                    id TEXT PRIMARY KEY NOT NULL,
                    liked_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    video_id TEXT REFERENCES videos(id) ON DELETE CASCADE,
                    comment_id TEXT REFERENCES comments(id) ON DELETE CASCADE,
                    tweet_id TEXT REFERENCES tweets(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    CHECK ((video_id IS NOT NULL) + (comment_id IS NOT NULL) + (tweet_id IS NOT NULL) = 1)
                )",
                "CREATE UNIQUE INDEX idx_likes_video ON likes(liked_by, video_id) WHERE video_id IS NOT NULL",
                "CREATE UNIQUE INDEX idx_likes_comment ON likes(liked_by, comment_id) WHERE comment_id IS NOT NULL",
                "CREATE UNIQUE INDEX idx_likes_tweet ON likes(liked_by, tweet_id) WHERE tweet_id IS NOT NULL",
                "CREATE TABLE playlists (
                    id TEXT PRIMARY KEY NOT NULL,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_playlists_owner_id ON playlists(owner_id)",
                "CREATE TABLE playlist_videos (
                    playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
                    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    PRIMARY KEY (playlist_id, video_id)
                )",
                "CREATE TABLE subscriptions (
                    id TEXT PRIMARY KEY NOT NULL,
                    subscriber_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    channel_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE (subscriber_id, channel_id)
                )",
                "CREATE INDEX idx_subscriptions_channel_id ON subscriptions(channel_id)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // One row per (user, video); re-watching bumps watched_at
                "CREATE TABLE watch_history (
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                    watched_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                    PRIMARY KEY (user_id, video_id)
                )",
                "CREATE INDEX idx_watch_history_user ON watch_history(user_id, watched_at)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the video store.
    pub fn videos(&self) -> VideoStore {
        VideoStore::new(self.pool.clone())
    }

    /// Get the comment store.
    pub fn comments(&self) -> CommentStore {
        CommentStore::new(self.pool.clone())
    }

    /// Get the tweet store.
    pub fn tweets(&self) -> TweetStore {
        TweetStore::new(self.pool.clone())
    }

    /// Get the like store.
    pub fn likes(&self) -> LikeStore {
        LikeStore::new(self.pool.clone())
    }

    /// Get the playlist store.
    pub fn playlists(&self) -> PlaylistStore {
        PlaylistStore::new(self.pool.clone())
    }

    /// Get the subscription store.
    pub fn subscriptions(&self) -> SubscriptionStore {
        SubscriptionStore::new(self.pool.clone())
    }

    /// Get the channel statistics store.
    pub fn stats(&self) -> StatsStore {
        StatsStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Generate a new primary key.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Whether an insert/update failed on a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.get_version().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_like_requires_single_target() {
        let db = test_support::open().await;
        let user = test_support::user(&db, "alice").await;

        let result = sqlx::query("INSERT INTO likes (id, liked_by) VALUES ('x', ?)")
            .bind(&user)
            .execute(db.pool())
            .await;
        assert!(result.is_err());
    }
}
