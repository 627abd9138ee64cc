use async_trait::async_trait;

use super::model::*;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user_by_external_id(&self, external_id: &str) -> DbResult<AppUser>;
    async fn upsert_user(&self, user: &AppUser) -> DbResult<()>;
}

#[async_trait]
pub trait ChatLogRepo: Send + Sync {
    /// Most recent turns first, at most `limit` of them.
    async fn fetch_recent_turns(&self, user_id: &str, limit: i32) -> DbResult<Vec<ChatTurn>>;
    async fn append_turn(&self, turn: &ChatTurn) -> DbResult<()>;
}

#[async_trait]
pub trait RecommendationRepo: Send + Sync {
    async fn save_recommendations(&self, recs: &[MovieRecommendation]) -> DbResult<()>;
}

pub trait Repository: UserRepo + ChatLogRepo + RecommendationRepo + Send + Sync {}
