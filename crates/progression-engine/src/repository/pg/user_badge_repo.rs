//! 用户徽章仓储

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{ProgressionError, Result};
use crate::models::UserBadge;
use crate::repository::traits::UserBadgeRepositoryTrait;

/// 用户徽章仓储
///
/// 依赖 (user_id, badge_id) 唯一约束实现插入去重
pub struct PgUserBadgeRepository {
    pool: PgPool,
}

impl PgUserBadgeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: &str, badge_id: &str) -> Result<Option<UserBadge>> {
        let badge = sqlx::query_as::<_, UserBadge>(
            r#"
            SELECT id, user_id, badge_id, earned_at, is_displayed, display_order
            FROM user_badges
            WHERE user_id = $1 AND badge_id = $2
            "#,
        )
        .bind(user_id)
        .bind(badge_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(badge)
    }

    /// 插入徽章记录，冲突时返回 None
    pub async fn create_if_absent(&self, badge: &UserBadge) -> Result<Option<UserBadge>> {
        let created = sqlx::query_as::<_, UserBadge>(
            r#"
            INSERT INTO user_badges (user_id, badge_id, earned_at, is_displayed, display_order)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, badge_id) DO NOTHING
            RETURNING id, user_id, badge_id, earned_at, is_displayed, display_order
            "#,
        )
        .bind(&badge.user_id)
        .bind(&badge.badge_id)
        .bind(badge.earned_at)
        .bind(badge.is_displayed)
        .bind(badge.display_order)
        .fetch_optional(&self.pool)
        .await?;

        Ok(created)
    }

    /// 更新展示元数据
    pub async fn update(&self, badge: &UserBadge) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_badges
            SET is_displayed = $3, display_order = $4
            WHERE user_id = $1 AND badge_id = $2
            "#,
        )
        .bind(&badge.user_id)
        .bind(&badge.badge_id)
        .bind(badge.is_displayed)
        .bind(badge.display_order)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ProgressionError::badge_not_held(
                &badge.user_id,
                &badge.badge_id,
            ));
        }
        Ok(())
    }

    /// 在同一事务中批量更新展示顺序
    ///
    /// 任一徽章未持有时事务回滚，不修改任何记录
    pub async fn update_display_orders(
        &self,
        user_id: &str,
        orders: &[(String, i32)],
    ) -> Result<Vec<UserBadge>> {
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(orders.len());

        for (badge_id, order) in orders {
            let badge = sqlx::query_as::<_, UserBadge>(
                r#"
                UPDATE user_badges
                SET display_order = $3
                WHERE user_id = $1 AND badge_id = $2
                RETURNING id, user_id, badge_id, earned_at, is_displayed, display_order
                "#,
            )
            .bind(user_id)
            .bind(badge_id)
            .bind(order)
            .fetch_optional(&mut *tx)
            .await?;

            match badge {
                Some(badge) => updated.push(badge),
                // tx 在此处 drop，事务回滚
                None => return Err(ProgressionError::badge_not_held(user_id, badge_id)),
            }
        }

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete(&self, user_id: &str, badge_id: &str) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM user_badges WHERE user_id = $1 AND badge_id = $2"#)
            .bind(user_id)
            .bind(badge_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 列出用户的所有徽章
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let badges = sqlx::query_as::<_, UserBadge>(
            r#"
            SELECT id, user_id, badge_id, earned_at, is_displayed, display_order
            FROM user_badges
            WHERE user_id = $1
            ORDER BY earned_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(badges)
    }
}

#[async_trait]
impl UserBadgeRepositoryTrait for PgUserBadgeRepository {
    async fn get(&self, user_id: &str, badge_id: &str) -> Result<Option<UserBadge>> {
        self.get(user_id, badge_id).await
    }

    async fn create_if_absent(&self, badge: &UserBadge) -> Result<Option<UserBadge>> {
        self.create_if_absent(badge).await
    }

    async fn update(&self, badge: &UserBadge) -> Result<()> {
        self.update(badge).await
    }

    async fn update_display_orders(
        &self,
        user_id: &str,
        orders: &[(String, i32)],
    ) -> Result<Vec<UserBadge>> {
        self.update_display_orders(user_id, orders).await
    }

    async fn delete(&self, user_id: &str, badge_id: &str) -> Result<bool> {
        self.delete(user_id, badge_id).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        self.list_by_user(user_id).await
    }
}
