//! 活动流水仓储
//!
//! 流水只追加；追加与用户总积分递增在同一事务内完成

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::{ProgressionError, Result};
use crate::models::{ActivityEntry, ActivityTotals, ActivityType, AppendOutcome, NewActivity};
use crate::repository::traits::ActivityRepositoryTrait;

const ENTRY_COLUMNS: &str = "id, user_id, activity_type, points_awarded, description, \
     related_entity_type, related_entity_id, idempotency_key, occurred_at";

/// 活动流水仓储
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 追加流水
    ///
    /// 先以 `FOR UPDATE` 锁定用户行，同一用户的并发追加在数据库层串行执行；
    /// 幂等键命中时直接返回已有流水。
    pub async fn append(&self, activity: &NewActivity) -> Result<AppendOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            r#"SELECT total_points FROM progression_users WHERE user_id = $1 FOR UPDATE"#,
        )
        .bind(&activity.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current_total) = current else {
            return Err(ProgressionError::UserNotFound(activity.user_id.clone()));
        };

        if let Some(key) = &activity.idempotency_key {
            let existing = sqlx::query_as::<_, ActivityEntry>(&format!(
                "SELECT {} FROM activity_entries WHERE user_id = $1 AND idempotency_key = $2",
                ENTRY_COLUMNS
            ))
            .bind(&activity.user_id)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(entry) = existing {
                tx.commit().await?;
                return Ok(AppendOutcome {
                    entry,
                    total_points: current_total,
                    duplicate: true,
                });
            }
        }

        let (related_type, related_id) = match &activity.related_entity {
            Some(related) => (
                Some(related.entity_type.as_str()),
                Some(related.entity_id.as_str()),
            ),
            None => (None, None),
        };

        let entry = sqlx::query_as::<_, ActivityEntry>(&format!(
            r#"
            INSERT INTO activity_entries
                (user_id, activity_type, points_awarded, description,
                 related_entity_type, related_entity_id, idempotency_key, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(&activity.user_id)
        .bind(activity.activity_type)
        .bind(activity.points_awarded)
        .bind(&activity.description)
        .bind(related_type)
        .bind(related_id)
        .bind(activity.idempotency_key.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let total_points: i64 = sqlx::query_scalar(
            r#"
            UPDATE progression_users
            SET total_points = total_points + $2
            WHERE user_id = $1
            RETURNING total_points
            "#,
        )
        .bind(&activity.user_id)
        .bind(activity.points_awarded)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AppendOutcome {
            entry,
            total_points,
            duplicate: false,
        })
    }

    /// 按时间倒序分页列出流水
    pub async fn list_by_user(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>> {
        let entries = sqlx::query_as::<_, ActivityEntry>(&format!(
            r#"
            SELECT {}
            FROM activity_entries
            WHERE user_id = $1
            ORDER BY occurred_at DESC, id DESC
            OFFSET $2 LIMIT $3
            "#,
            ENTRY_COLUMNS
        ))
        .bind(user_id)
        .bind(offset.max(0))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM activity_entries WHERE user_id = $1"#)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    pub async fn totals_by_type(
        &self,
        user_id: &str,
    ) -> Result<Vec<(ActivityType, ActivityTotals)>> {
        let rows = sqlx::query(
            r#"
            SELECT activity_type,
                   COUNT(*) AS entry_count,
                   COALESCE(SUM(points_awarded), 0)::BIGINT AS points
            FROM activity_entries
            WHERE user_id = $1
            GROUP BY activity_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = Vec::with_capacity(rows.len());
        for row in rows {
            let activity_type: ActivityType = row.try_get("activity_type")?;
            let count: i64 = row.try_get("entry_count")?;
            let points: i64 = row.try_get("points")?;
            totals.push((
                activity_type,
                ActivityTotals {
                    count: count.max(0) as u64,
                    points,
                },
            ));
        }
        totals.sort_by_key(|(activity_type, _)| *activity_type);

        Ok(totals)
    }
}

#[async_trait]
impl ActivityRepositoryTrait for PgActivityRepository {
    async fn append(&self, activity: &NewActivity) -> Result<AppendOutcome> {
        self.append(activity).await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>> {
        self.list_by_user(user_id, offset, limit).await
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        self.count_by_user(user_id).await
    }

    async fn totals_by_type(&self, user_id: &str) -> Result<Vec<(ActivityType, ActivityTotals)>> {
        self.totals_by_type(user_id).await
    }
}
