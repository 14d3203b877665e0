//! 成就相关实体定义
//!
//! 用户成就记录遵循 NotStarted -> InProgress -> Completed 的单向状态机，
//! Completed 为终态，之后的任何进度更新都是空操作。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::AchievementState;
use crate::error::{ProgressionError, Result};

/// 成就定义
///
/// 来自目录配置，进程启动时加载，运行期间不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDefinition {
    /// 成就编码（目录键）
    pub achievement_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 完成所需进度
    pub required_progress: f64,
    /// 完成奖励积分
    #[serde(default)]
    pub reward_points: i64,
    /// 完成奖励徽章
    #[serde(default)]
    pub reward_badge_id: Option<String>,
}

/// 用户成就进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub id: i64,
    pub user_id: String,
    pub achievement_id: String,
    pub current_progress: f64,
    /// 创建时从定义复制，后续定义变化不影响已有记录
    pub required_progress: f64,
    pub is_completed: bool,
    #[sqlx(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// 一次进度更新带来的状态变化
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressTransition {
    /// 无变化（已完成，或进度与当前相同）
    Unchanged,
    /// 进度前进但未完成
    Advanced(UserAchievement),
    /// 本次更新使成就进入完成态
    Completed(UserAchievement),
}

impl UserAchievement {
    /// 首次追踪时创建的初始记录（进度为 0，id 由存储层分配）
    pub fn start(user_id: &str, definition: &AchievementDefinition) -> Self {
        Self {
            id: 0,
            user_id: user_id.to_string(),
            achievement_id: definition.achievement_id.clone(),
            current_progress: 0.0,
            required_progress: definition.required_progress,
            is_completed: false,
            completed_at: None,
        }
    }

    pub fn state(&self) -> AchievementState {
        if self.is_completed {
            AchievementState::Completed
        } else {
            AchievementState::InProgress
        }
    }

    /// 完成比例，范围 [0, 1]
    pub fn progress_fraction(&self) -> f64 {
        if self.is_completed || self.required_progress <= 0.0 {
            return 1.0;
        }
        (self.current_progress / self.required_progress).clamp(0.0, 1.0)
    }

    /// 计算推进到 `new_progress` 后的状态，不修改自身
    ///
    /// - 已完成：任何值都是空操作（完成态不可逆）
    /// - 未完成且进度回退：`InvalidProgressRegression`
    /// - 达到或超过所需进度：进入完成态，`completed_at = now`
    pub fn advance(&self, new_progress: f64, now: DateTime<Utc>) -> Result<ProgressTransition> {
        validate_progress(new_progress)?;

        if self.is_completed {
            return Ok(ProgressTransition::Unchanged);
        }

        if new_progress < self.current_progress {
            return Err(ProgressionError::InvalidProgressRegression {
                user_id: self.user_id.clone(),
                achievement_id: self.achievement_id.clone(),
                current: self.current_progress,
                requested: new_progress,
            });
        }

        if new_progress >= self.required_progress {
            let mut next = self.clone();
            next.current_progress = new_progress;
            next.is_completed = true;
            next.completed_at = Some(now);
            return Ok(ProgressTransition::Completed(next));
        }

        if new_progress == self.current_progress {
            return Ok(ProgressTransition::Unchanged);
        }

        let mut next = self.clone();
        next.current_progress = new_progress;
        Ok(ProgressTransition::Advanced(next))
    }
}

/// 进度值必须是非负有限数
pub fn validate_progress(progress: f64) -> Result<()> {
    if !progress.is_finite() || progress < 0.0 {
        return Err(ProgressionError::Validation(format!(
            "成就进度必须是非负有限数: {}",
            progress
        )));
    }
    Ok(())
}
