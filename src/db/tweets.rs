use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::new_id;

#[derive(Clone)]
pub struct TweetStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

const COLUMNS: &str = "id, owner_id, content, created_at, updated_at";

impl TweetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, owner_id: &str, content: &str) -> Result<Tweet, sqlx::Error> {
        sqlx::query_as(&format!(
            "INSERT INTO tweets (id, owner_id, content) VALUES (?, ?, ?) RETURNING {}",
            COLUMNS
        ))
        .bind(new_id())
        .bind(owner_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Tweet>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM tweets WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// All tweets of a user, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Tweet>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {} FROM tweets WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
            COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn update_content(
        &self,
        id: &str,
        content: &str,
    ) -> Result<Option<Tweet>, sqlx::Error> {
        sqlx::query_as(&format!(
            "UPDATE tweets SET content = ?, updated_at = datetime('now') WHERE id = ? RETURNING {}",
            COLUMNS
        ))
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tweets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support;

    #[tokio::test]
    async fn test_tweet_lifecycle() {
        let db = test_support::open().await;
        let alice = test_support::user(&db, "alice").await;
        let bob = test_support::user(&db, "bob").await;

        let first = db.tweets().create(&alice, "one").await.unwrap();
        db.tweets().create(&alice, "two").await.unwrap();
        db.tweets().create(&bob, "bob's").await.unwrap();

        let tweets = db.tweets().list_by_owner(&alice).await.unwrap();
        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[0].content, "two");

        let edited = db
            .tweets()
            .update_content(&first.id, "one, edited")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.content, "one, edited");
        assert!(db.tweets().update_content("missing", "x").await.unwrap().is_none());

        assert!(db.tweets().delete(&first.id).await.unwrap());
        assert_eq!(db.tweets().list_by_owner(&alice).await.unwrap().len(), 1);
    }
}
