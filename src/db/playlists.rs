use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::new_id;
use super::videos::{VIDEO_COLUMNS, VISIBLE_TO_VIEWER, Video};

#[derive(Clone)]
pub struct PlaylistStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A playlist with the videos the viewer may see, in playlist order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistWithVideos {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub total_videos: usize,
    pub videos: Vec<Video>,
}

const COLUMNS: &str = "id, owner_id, name, description, created_at, updated_at";

impl PlaylistStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        owner_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Playlist, sqlx::Error> {
        sqlx::query_as(&format!(
            "INSERT INTO playlists (id, owner_id, name, description) VALUES (?, ?, ?, ?)
             RETURNING {}",
            COLUMNS
        ))
        .bind(new_id())
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Playlist>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM playlists WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_with_videos(
        &self,
        id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Option<PlaylistWithVideos>, sqlx::Error> {
        match self.get_by_id(id).await? {
            Some(playlist) => Ok(Some(self.with_videos(playlist, viewer_id).await?)),
            None => Ok(None),
        }
    }

    /// All playlists of a user, newest first, each with its videos.
    pub async fn list_by_owner(
        &self,
        owner_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Vec<PlaylistWithVideos>, sqlx::Error> {
        let playlists: Vec<Playlist> = sqlx::query_as(&format!(
            "SELECT {} FROM playlists WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
            COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(playlists.len());
        for playlist in playlists {
            result.push(self.with_videos(playlist, viewer_id).await?);
        }
        Ok(result)
    }

    async fn with_videos(
        &self,
        playlist: Playlist,
        viewer_id: Option<&str>,
    ) -> Result<PlaylistWithVideos, sqlx::Error> {
        let videos: Vec<Video> = sqlx::query_as(&format!(
            "SELECT {} FROM playlist_videos pv
             JOIN videos v ON v.id = pv.video_id
             WHERE pv.playlist_id = ? AND {}
             ORDER BY pv.position ASC",
            VIDEO_COLUMNS, VISIBLE_TO_VIEWER
        ))
        .bind(&playlist.id)
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(PlaylistWithVideos {
            playlist,
            total_videos: videos.len(),
            videos,
        })
    }

    /// Append a video. Returns false if it was already in the playlist.
    pub async fn add_video(&self, playlist_id: &str, video_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id, position)
             SELECT ?, ?, COALESCE(MAX(position), 0) + 1 FROM playlist_videos WHERE playlist_id = ?",
        )
        .bind(playlist_id)
        .bind(video_id)
        .bind(playlist_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            self.touch(playlist_id).await?;
        }
        Ok(result.rows_affected() > 0)
    }

    /// Remove a video. Returns false if it was not in the playlist.
    pub async fn remove_video(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ? AND video_id = ?")
                .bind(playlist_id)
                .bind(video_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() > 0 {
            self.touch(playlist_id).await?;
        }
        Ok(result.rows_affected() > 0)
    }

    async fn touch(&self, playlist_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE playlists SET updated_at = datetime('now') WHERE id = ?")
            .bind(playlist_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update(
        &self,
        id: &str,
        name: &str,
        description: &str,
    ) -> Result<Option<Playlist>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE playlists SET name = ?, description = ?, updated_at = datetime('now')
             WHERE id = ? RETURNING {}",
            COLUMNS
        ))
        .bind(name)
        .bind(description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
