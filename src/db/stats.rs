//! Aggregate numbers for the channel dashboard.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct StatsStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VideoStats {
    pub total_videos: i64,
    pub total_views: i64,
}

/// Likes received on content the channel owns.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LikeStats {
    pub liked_videos_count: i64,
    pub liked_comments_count: i64,
    pub liked_tweets_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub video_stats: VideoStats,
    pub subscribers_count: i64,
    pub like_stats: LikeStats,
}

impl StatsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn channel_stats(&self, channel_id: &str) -> Result<ChannelStats, sqlx::Error> {
        let video_stats: VideoStats = sqlx::query_as(
            "SELECT COUNT(*) AS total_videos, COALESCE(SUM(views), 0) AS total_views
             FROM videos WHERE owner_id = ?",
        )
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;

        let subscribers: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?")
                .bind(channel_id)
                .fetch_one(&self.pool)
                .await?;

        let like_stats: LikeStats = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM likes l JOIN videos v ON v.id = l.video_id
                 WHERE v.owner_id = ?1) AS liked_videos_count,
                (SELECT COUNT(*) FROM likes l JOIN comments c ON c.id = l.comment_id
                 WHERE c.owner_id = ?1) AS liked_comments_count,
                (SELECT COUNT(*) FROM likes l JOIN tweets t ON t.id = l.tweet_id
                 WHERE t.owner_id = ?1) AS liked_tweets_count",
        )
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ChannelStats {
            video_stats,
            subscribers_count: subscribers.0,
            like_stats,
        })
    }
}
