//! 通知事件类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Tier;

/// 事件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// 获得新徽章
    #[serde(rename_all = "camelCase")]
    BadgeAwarded { badge_id: String, badge_name: String },
    /// 徽章被撤销
    #[serde(rename_all = "camelCase")]
    BadgeRevoked { badge_id: String },
    /// 成就完成
    #[serde(rename_all = "camelCase")]
    AchievementCompleted {
        achievement_id: String,
        title: String,
        reward_points: i64,
    },
    /// 等级晋升
    #[serde(rename_all = "camelCase")]
    TierPromoted { tier: Tier, total_points: i64 },
}

impl EventKind {
    /// 事件名称，用于日志与指标标签
    pub fn name(&self) -> &'static str {
        match self {
            Self::BadgeAwarded { .. } => "badge_awarded",
            Self::BadgeRevoked { .. } => "badge_revoked",
            Self::AchievementCompleted { .. } => "achievement_completed",
            Self::TierPromoted { .. } => "tier_promoted",
        }
    }
}

/// 进阶事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionEvent {
    pub event_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
}

impl ProgressionEvent {
    pub fn new(user_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            kind,
            occurred_at: Utc::now(),
        }
    }
}
