use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::new_id;
use super::user::OwnerSummary;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentWithOwner {
    #[serde(flatten)]
    pub comment: Comment,
    pub owner: OwnerSummary,
}

#[derive(sqlx::FromRow)]
struct CommentOwnerRow {
    #[sqlx(flatten)]
    comment: Comment,
    owner_username: String,
    owner_full_name: String,
    owner_avatar: String,
}

impl From<CommentOwnerRow> for CommentWithOwner {
    fn from(row: CommentOwnerRow) -> Self {
        let owner = OwnerSummary {
            id: row.comment.owner_id.clone(),
            username: row.owner_username,
            full_name: row.owner_full_name,
            avatar: row.owner_avatar,
        };
        Self {
            comment: row.comment,
            owner,
        }
    }
}

const COLUMNS: &str = "id, video_id, owner_id, content, created_at, updated_at";

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        video_id: &str,
        owner_id: &str,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as(&format!(
            "INSERT INTO comments (id, video_id, owner_id, content) VALUES (?, ?, ?, ?)
             RETURNING {}",
            COLUMNS
        ))
        .bind(new_id())
        .bind(video_id)
        .bind(owner_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM comments WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// One page of a video's comments, newest first, plus the total count.
    pub async fn list_for_video(
        &self,
        video_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CommentWithOwner>, i64), sqlx::Error> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE video_id = ?")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<CommentOwnerRow> = sqlx::query_as(
            "SELECT c.id, c.video_id, c.owner_id, c.content, c.created_at, c.updated_at,
                    u.username AS owner_username, u.full_name AS owner_full_name,
                    u.avatar AS owner_avatar
             FROM comments c JOIN users u ON u.id = c.owner_id
             WHERE c.video_id = ?
             ORDER BY c.created_at DESC, c.rowid DESC
             LIMIT ? OFFSET ?",
        )
        .bind(video_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(CommentWithOwner::from).collect(), total.0))
    }

    pub async fn update_content(
        &self,
        id: &str,
        content: &str,
    ) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE comments SET content = ?, updated_at = datetime('now') WHERE id = ?
             RETURNING {}",
            COLUMNS
        ))
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
