//! 用户成就进度仓储

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::UserAchievement;
use crate::repository::traits::AchievementProgressRepositoryTrait;

/// 用户成就进度仓储
pub struct PgAchievementRepository {
    pool: PgPool,
}

impl PgAchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: &str, achievement_id: &str) -> Result<Option<UserAchievement>> {
        let record = sqlx::query_as::<_, UserAchievement>(
            r#"
            SELECT id, user_id, achievement_id, current_progress, required_progress,
                   is_completed, completed_at
            FROM user_achievements
            WHERE user_id = $1 AND achievement_id = $2
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// 插入或更新进度
    ///
    /// `required_progress` 只在首次插入时写入
    pub async fn upsert(&self, achievement: &UserAchievement) -> Result<UserAchievement> {
        let record = sqlx::query_as::<_, UserAchievement>(
            r#"
            INSERT INTO user_achievements
                (user_id, achievement_id, current_progress, required_progress, is_completed, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, achievement_id) DO UPDATE
            SET current_progress = EXCLUDED.current_progress,
                is_completed = EXCLUDED.is_completed,
                completed_at = EXCLUDED.completed_at
            RETURNING id, user_id, achievement_id, current_progress, required_progress,
                      is_completed, completed_at
            "#,
        )
        .bind(&achievement.user_id)
        .bind(&achievement.achievement_id)
        .bind(achievement.current_progress)
        .bind(achievement.required_progress)
        .bind(achievement.is_completed)
        .bind(achievement.completed_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserAchievement>> {
        let records = sqlx::query_as::<_, UserAchievement>(
            r#"
            SELECT id, user_id, achievement_id, current_progress, required_progress,
                   is_completed, completed_at
            FROM user_achievements
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl AchievementProgressRepositoryTrait for PgAchievementRepository {
    async fn get(&self, user_id: &str, achievement_id: &str) -> Result<Option<UserAchievement>> {
        self.get(user_id, achievement_id).await
    }

    async fn upsert(&self, achievement: &UserAchievement) -> Result<UserAchievement> {
        self.upsert(achievement).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserAchievement>> {
        self.list_by_user(user_id).await
    }
}
