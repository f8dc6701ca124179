//! Video storage, view counting and watch history.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::new_id;
use super::user::OwnerSummary;

#[derive(Clone)]
pub struct VideoStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub owner_id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A video with its owner's public profile embedded.
#[derive(Debug, Clone, Serialize)]
pub struct VideoWithOwner {
    #[serde(flatten)]
    pub video: Video,
    pub owner: OwnerSummary,
}

#[derive(sqlx::FromRow)]
pub(super) struct VideoOwnerRow {
    #[sqlx(flatten)]
    video: Video,
    owner_username: String,
    owner_full_name: String,
    owner_avatar: String,
}

impl From<VideoOwnerRow> for VideoWithOwner {
    fn from(row: VideoOwnerRow) -> Self {
        let owner = OwnerSummary {
            id: row.video.owner_id.clone(),
            username: row.owner_username,
            full_name: row.owner_full_name,
            avatar: row.owner_avatar,
        };
        Self {
            video: row.video,
            owner,
        }
    }
}

pub struct NewVideo<'a> {
    pub owner_id: &'a str,
    pub video_file: &'a str,
    pub thumbnail: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub duration: f64,
}

/// Publication filter for listing a channel's videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFilter {
    All,
    Published,
    Unpublished,
}

impl VideoFilter {
    fn as_flag(self) -> Option<bool> {
        match self {
            VideoFilter::All => None,
            VideoFilter::Published => Some(true),
            VideoFilter::Unpublished => Some(false),
        }
    }
}

/// Sort order for listing a channel's videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSort {
    ViewsAsc,
    ViewsDesc,
    DurationAsc,
    DurationDesc,
}

impl VideoSort {
    fn order_by(self) -> &'static str {
        match self {
            VideoSort::ViewsAsc => "v.views ASC, v.rowid ASC",
            VideoSort::ViewsDesc => "v.views DESC, v.rowid DESC",
            VideoSort::DurationAsc => "v.duration ASC, v.rowid ASC",
            VideoSort::DurationDesc => "v.duration DESC, v.rowid DESC",
        }
    }
}

pub(super) const VIDEO_COLUMNS: &str = "v.id, v.owner_id, v.video_file, v.thumbnail, v.title, v.description, \
     v.duration, v.views, v.is_published, v.created_at, v.updated_at";

/// Restricts `v` to published videos plus the bound viewer's own drafts.
/// Binding `NULL` as the viewer leaves only published videos.
pub(super) const VISIBLE_TO_VIEWER: &str = "(v.is_published = 1 OR v.owner_id = ?)";

pub(super) const OWNER_COLUMNS: &str =
    "u.username AS owner_username, u.full_name AS owner_full_name, u.avatar AS owner_avatar";

impl VideoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a published video. Returns the video id.
    pub async fn create(&self, video: &NewVideo<'_>) -> Result<String, sqlx::Error> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO videos (id, owner_id, video_file, thumbnail, title, description, duration)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(video.owner_id)
        .bind(video.video_file)
        .bind(video.thumbnail)
        .bind(video.title)
        .bind(video.description)
        .bind(video.duration)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Video>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM videos v WHERE v.id = ?", VIDEO_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// A video if it is published or belongs to the viewer.
    pub async fn get_visible(
        &self,
        id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Option<Video>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {} FROM videos v WHERE v.id = ? AND {}",
            VIDEO_COLUMNS, VISIBLE_TO_VIEWER
        ))
        .bind(id)
        .bind(viewer_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_with_owner(&self, id: &str) -> Result<Option<VideoWithOwner>, sqlx::Error> {
        let row: Option<VideoOwnerRow> = sqlx::query_as(&format!(
            "SELECT {}, {} FROM videos v JOIN users u ON u.id = v.owner_id WHERE v.id = ?",
            VIDEO_COLUMNS, OWNER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(VideoWithOwner::from))
    }

    /// One page of a channel's videos plus the total number matching the filter.
    pub async fn list_by_owner(
        &self,
        owner_id: &str,
        filter: VideoFilter,
        sort: VideoSort,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Video>, i64), sqlx::Error> {
        let flag = filter.as_flag();

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM videos WHERE owner_id = ? AND (? IS NULL OR is_published = ?)",
        )
        .bind(owner_id)
        .bind(flag)
        .bind(flag)
        .fetch_one(&self.pool)
        .await?;

        let videos: Vec<Video> = sqlx::query_as(&format!(
            "SELECT {} FROM videos v
             WHERE v.owner_id = ? AND (? IS NULL OR v.is_published = ?)
             ORDER BY {} LIMIT ? OFFSET ?",
            VIDEO_COLUMNS,
            sort.order_by()
        ))
        .bind(owner_id)
        .bind(flag)
        .bind(flag)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((videos, total.0))
    }

    /// Every video of a channel the viewer may see, newest first.
    pub async fn list_all_by_owner(
        &self,
        owner_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Vec<Video>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {} FROM videos v WHERE v.owner_id = ? AND {}
             ORDER BY v.created_at DESC, v.rowid DESC",
            VIDEO_COLUMNS, VISIBLE_TO_VIEWER
        ))
        .bind(owner_id)
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn update_details(
        &self,
        id: &str,
        title: &str,
        description: &str,
        thumbnail: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE videos SET title = ?, description = ?, thumbnail = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(thumbnail)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip the published flag. Returns the new value, or None if the video is gone.
    pub async fn toggle_published(&self, id: &str) -> Result<Option<bool>, sqlx::Error> {
        let row: Option<(bool,)> = sqlx::query_as(
            "UPDATE videos SET is_published = NOT is_published, updated_at = datetime('now')
             WHERE id = ? RETURNING is_published",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a view and, for signed-in viewers, move the video to the top of their history.
    pub async fn record_view(&self, id: &str, viewer_id: Option<&str>) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE videos SET views = views + 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if let Some(viewer_id) = viewer_id {
            // Reinsert so the row gets a fresh rowid as well as a fresh timestamp
            sqlx::query("DELETE FROM watch_history WHERE user_id = ? AND video_id = ?")
                .bind(viewer_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO watch_history (user_id, video_id) VALUES (?, ?)")
                .bind(viewer_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    /// Videos a user has watched and can still see, most recent first.
    pub async fn watch_history(&self, user_id: &str) -> Result<Vec<VideoWithOwner>, sqlx::Error> {
        let rows: Vec<VideoOwnerRow> = sqlx::query_as(&format!(
            "SELECT {}, {} FROM watch_history h
             JOIN videos v ON v.id = h.video_id
             JOIN users u ON u.id = v.owner_id
             WHERE h.user_id = ? AND {}
             ORDER BY h.rowid DESC",
            VIDEO_COLUMNS, OWNER_COLUMNS, VISIBLE_TO_VIEWER
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VideoWithOwner::from).collect())
    }
}
