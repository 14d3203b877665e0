//! 服务层数据传输对象

use serde::Serialize;

use super::level::LevelInfo;
use crate::cascade::CascadeResult;
use crate::models::{
    AchievementState, ActivityEntry, BadgeAwardOutcome, LedgerReceipt, PromotionRecord, Tier,
    UserAchievement,
};

/// 成就进度更新结果
#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    /// 更新后的进度记录
    pub user_achievement: UserAchievement,
    pub state: AchievementState,
    /// 本次调用使成就进入完成态
    pub completed_now: bool,
    /// 完成时执行的奖励（未完成或已完成过时为空）
    pub cascade: CascadeResult,
}

impl ProgressOutcome {
    pub(crate) fn without_rewards(record: UserAchievement) -> Self {
        Self {
            state: record.state(),
            user_achievement: record,
            completed_now: false,
            cascade: CascadeResult::default(),
        }
    }

    /// 完成奖励中本次新增的积分
    pub fn reward_points_credited(&self) -> i64 {
        self.cascade.credited_points()
    }
}

/// 积分发放结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsAwardResult {
    pub entry: ActivityEntry,
    pub total_points: i64,
    pub level: LevelInfo,
    pub promotion: Option<PromotionRecord>,
}

/// 徽章发放结果（含徽章附带积分）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeAwardResult {
    pub outcome: BadgeAwardOutcome,
    /// 徽章附带积分的记账回执（徽章无积分时为空）
    pub points_entry: Option<LedgerReceipt>,
    pub promotion: Option<PromotionRecord>,
}

/// 用户进阶概览
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressStats {
    pub user_id: String,
    pub level: LevelInfo,
    /// 积分排名，同分同名次
    pub rank: i64,
    pub badge_count: usize,
    /// 展示中的徽章编码（按展示顺序）
    pub displayed_badges: Vec<String>,
    pub completed_achievements: usize,
    pub in_progress_achievements: usize,
    /// 持有的等级（从低到高）
    pub tiers: Vec<Tier>,
    pub activity_count: i64,
}
