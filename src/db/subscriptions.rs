use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::new_id;
use super::user::{OwnerSummary, User};

#[derive(Clone)]
pub struct SubscriptionStore {
    pool: SqlitePool,
}

/// A user's public channel page, as seen by an optional viewer.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub user: User,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
}

impl SubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Subscribe if not subscribed, otherwise unsubscribe.
    /// Returns whether the subscriber follows the channel afterwards.
    pub async fn toggle(&self, subscriber_id: &str, channel_id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let removed =
            sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?")
                .bind(subscriber_id)
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;

        let subscribed = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(
                "INSERT INTO subscriptions (id, subscriber_id, channel_id) VALUES (?, ?, ?)",
            )
            .bind(new_id())
            .bind(subscriber_id)
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(subscribed)
    }

    /// Users subscribed to a channel, most recent first.
    pub async fn subscribers(&self, channel_id: &str) -> Result<Vec<OwnerSummary>, sqlx::Error> {
        sqlx::query_as(
            "SELECT u.id, u.username, u.full_name, u.avatar
             FROM subscriptions s JOIN users u ON u.id = s.subscriber_id
             WHERE s.channel_id = ?
             ORDER BY s.created_at DESC, s.rowid DESC",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Channels a user is subscribed to, most recent first.
    pub async fn subscribed_channels(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<OwnerSummary>, sqlx::Error> {
        sqlx::query_as(
            "SELECT u.id, u.username, u.full_name, u.avatar
             FROM subscriptions s JOIN users u ON u.id = s.channel_id
             WHERE s.subscriber_id = ?
             ORDER BY s.created_at DESC, s.rowid DESC",
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Option<&str>,
    ) -> Result<Option<ChannelProfile>, sqlx::Error> {
        sqlx::query_as(
            "SELECT u.id, u.username, u.email, u.full_name, u.avatar, u.cover_image,
                    u.created_at, u.updated_at,
                    (SELECT COUNT(*) FROM subscriptions WHERE channel_id = u.id) AS subscribers_count,
                    (SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = u.id)
                        AS channels_subscribed_to_count,
                    EXISTS (SELECT 1 FROM subscriptions WHERE channel_id = u.id AND subscriber_id = ?)
                        AS is_subscribed
             FROM users u WHERE u.username = ?",
        )
        .bind(viewer_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }
}
