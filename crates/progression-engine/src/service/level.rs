//! 积分等级计算
//!
//! 等级是总积分的纯函数：每 `points_per_level` 积分升一级，从 1 级开始，
//! `max_level` 为展示上限。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ProgressionError, Result};
use crate::repository::UserRepositoryTrait;

/// 等级曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelCurve {
    /// 每级所需积分
    pub points_per_level: i64,
    /// 展示上限
    pub max_level: u32,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            points_per_level: 1000,
            max_level: 100,
        }
    }
}

/// 等级信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub points: i64,
    pub level: u32,
    /// 距下一级还需的积分，达到上限时为 0
    pub points_to_next_level: i64,
    /// 当前级内的进度，范围 [0, 1)，达到上限时为 1.0
    pub progress_fraction: f64,
}

/// 排行榜条目
///
/// 积分相同的用户名次相同，其后的名次顺延（1, 2, 2, 4）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: String,
    pub level: LevelInfo,
}

impl LevelCurve {
    pub fn validate(&self) -> Result<()> {
        if self.points_per_level <= 0 {
            return Err(ProgressionError::Config(format!(
                "levels.points_per_level 必须为正数: {}",
                self.points_per_level
            )));
        }
        if self.max_level == 0 {
            return Err(ProgressionError::Config(
                "levels.max_level 至少为 1".to_string(),
            ));
        }
        Ok(())
    }

    /// 计算积分对应的等级
    ///
    /// 对任意非负积分都有定义；负数按 0 处理
    pub fn level_for(&self, points: i64) -> LevelInfo {
        let points = points.max(0);
        let per_level = self.points_per_level.max(1);
        let max_level = self.max_level.max(1);

        let raw_level = (points / per_level).saturating_add(1);
        if raw_level >= i64::from(max_level) {
            return LevelInfo {
                points,
                level: max_level,
                points_to_next_level: 0,
                progress_fraction: 1.0,
            };
        }

        let into_level = points % per_level;
        LevelInfo {
            points,
            level: raw_level as u32,
            points_to_next_level: per_level - into_level,
            progress_fraction: into_level as f64 / per_level as f64,
        }
    }
}

/// 等级计算器
pub struct LevelCalculator<U>
where
    U: UserRepositoryTrait,
{
    user_repo: Arc<U>,
    curve: LevelCurve,
}

impl<U> LevelCalculator<U>
where
    U: UserRepositoryTrait,
{
    pub fn new(user_repo: Arc<U>, curve: LevelCurve) -> Self {
        Self { user_repo, curve }
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    /// 查询用户等级
    #[instrument(skip(self))]
    pub async fn get_level(&self, user_id: &str) -> Result<LevelInfo> {
        let user = self
            .user_repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| ProgressionError::UserNotFound(user_id.to_string()))?;

        Ok(self.curve.level_for(user.total_points))
    }

    /// 积分排行榜（前 `limit` 名）
    #[instrument(skip(self))]
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let users = self.user_repo.ranked_users(i64::from(limit)).await?;

        let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(users.len());
        for (index, user) in users.into_iter().enumerate() {
            let rank = match entries.last() {
                Some(prev) if prev.level.points == user.total_points => prev.rank,
                _ => index as i64 + 1,
            };
            entries.push(LeaderboardEntry {
                rank,
                level: self.curve.level_for(user.total_points),
                user_id: user.user_id,
            });
        }
        Ok(entries)
    }

    /// 用户名次：总积分严格更高的用户数加一
    #[instrument(skip(self))]
    pub async fn rank_of(&self, user_id: &str) -> Result<i64> {
        let user = self
            .user_repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| ProgressionError::UserNotFound(user_id.to_string()))?;

        Ok(self.user_repo.count_ahead_of(user.total_points).await? + 1)
    }
}
