use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::model::*;
use super::repo::*;

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(db_path: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)?.create_if_missing(true);

        // An in-memory database exists per connection, so the pool must
        // not hand out more than one.
        let max_connections = if db_path.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let repo = Self { pool };

        repo.init_schema().await?;

        info!("Database initialized at {}", db_path);

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for SqliteRepository {
    async fn get_user_by_external_id(&self, external_id: &str) -> DbResult<AppUser> {
        sqlx::query_as::<_, AppUser>(
            "SELECT id, external_id, display_name, created FROM users WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                DbError::NotFound(format!("User not found: {}", external_id))
            }
            _ => DbError::Sqlx(e),
        })
    }

    async fn upsert_user(&self, user: &AppUser) -> DbResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO users (id, external_id, display_name, created) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.external_id)
        .bind(&user.display_name)
        .bind(user.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatLogRepo for SqliteRepository {
    async fn fetch_recent_turns(&self, user_id: &str, limit: i32) -> DbResult<Vec<ChatTurn>> {
        let turns = sqlx::query_as::<_, ChatTurn>(
            "SELECT user_id, sender, content, created FROM chat_log
             WHERE user_id = ? ORDER BY created DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(turns)
    }

    async fn append_turn(&self, turn: &ChatTurn) -> DbResult<()> {
        sqlx::query("INSERT INTO chat_log (user_id, sender, content, created) VALUES (?, ?, ?, ?)")
            .bind(&turn.user_id)
            .bind(turn.sender)
            .bind(&turn.content)
            .bind(turn.created)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RecommendationRepo for SqliteRepository {
    async fn save_recommendations(&self, recs: &[MovieRecommendation]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for rec in recs {
            sqlx::query(
                "INSERT INTO recommendations
                 (user_id, title, year, genre, mood_tag, poster_url, preview_url, rating, created)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&rec.user_id)
            .bind(&rec.title)
            .bind(&rec.year)
            .bind(&rec.genre)
            .bind(&rec.mood_tag)
            .bind(&rec.poster_url)
            .bind(&rec.preview_url)
            .bind(rec.rating)
            .bind(rec.created)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

impl Repository for SqliteRepository {}
