//! 用户仓储

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::UserAccount;
use crate::repository::traits::UserRepositoryTrait;

/// 用户仓储
///
/// 用户由外部账户系统创建，这里只提供读取和测试场景下的初始化
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT user_id, total_points
            FROM progression_users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// 积分排行
    pub async fn ranked_users(&self, limit: i64) -> Result<Vec<UserAccount>> {
        let users = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT user_id, total_points
            FROM progression_users
            ORDER BY total_points DESC, user_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn count_ahead_of(&self, total_points: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM progression_users WHERE total_points > $1"#)
                .bind(total_points)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// 初始化用户记录（已存在时不变），返回是否新建
    pub async fn create_user(&self, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO progression_users (user_id, total_points)
            VALUES ($1, 0)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserRepositoryTrait for PgUserRepository {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserAccount>> {
        self.get_user(user_id).await
    }

    async fn ranked_users(&self, limit: i64) -> Result<Vec<UserAccount>> {
        self.ranked_users(limit).await
    }

    async fn count_ahead_of(&self, total_points: i64) -> Result<i64> {
        self.count_ahead_of(total_points).await
    }
}
