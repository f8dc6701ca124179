use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::new_id;
use super::videos::{
    OWNER_COLUMNS, VIDEO_COLUMNS, VISIBLE_TO_VIEWER, VideoOwnerRow, VideoWithOwner,
};

#[derive(Clone)]
pub struct LikeStore {
    pool: SqlitePool,
}

/// What a like points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video,
    Comment,
    Tweet,
}

impl LikeTarget {
    fn column(self) -> &'static str {
        match self {
            LikeTarget::Video => "video_id",
            LikeTarget::Comment => "comment_id",
            LikeTarget::Tweet => "tweet_id",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedVideo {
    pub liked_at: String,
    pub video: VideoWithOwner,
}

#[derive(sqlx::FromRow)]
struct LikedVideoRow {
    liked_at: String,
    #[sqlx(flatten)]
    video: VideoOwnerRow,
}

impl LikeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Like the target if the user has not, otherwise remove the like.
    /// Returns whether the target is liked afterwards.
    pub async fn toggle(
        &self,
        user_id: &str,
        target: LikeTarget,
        target_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let column = target.column();
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(&format!(
            "DELETE FROM likes WHERE liked_by = ? AND {} = ?",
            column
        ))
        .bind(user_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

        let liked = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(&format!(
                "INSERT INTO likes (id, liked_by, {}) VALUES (?, ?, ?)",
                column
            ))
            .bind(new_id())
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(liked)
    }

    /// Videos the user has liked and can still see, most recent like first.
    pub async fn liked_videos(&self, user_id: &str) -> Result<Vec<LikedVideo>, sqlx::Error> {
        let rows: Vec<LikedVideoRow> = sqlx::query_as(&format!(
            "SELECT l.created_at AS liked_at, {}, {}
             FROM likes l
             JOIN videos v ON v.id = l.video_id
             JOIN users u ON u.id = v.owner_id
             WHERE l.liked_by = ? AND {}
             ORDER BY l.created_at DESC, l.rowid DESC",
            VIDEO_COLUMNS, OWNER_COLUMNS, VISIBLE_TO_VIEWER
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LikedVideo {
                liked_at: row.liked_at,
                video: row.video.into(),
            })
            .collect())
    }
}
