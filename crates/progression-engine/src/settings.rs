//! 引擎配置
//!
//! 在共享配置（数据库、可观测性）之上增加 `[progression]` 段：
//! 等级阈值、等级曲线、行为积分表、徽章展示上限、锁超时、目录路径。
//! 所有数值在启动时校验，非法配置直接拒绝启动。

use serde::Deserialize;

use progression_shared::config::{DatabaseConfig, load_layered};
use progression_shared::observability::ObservabilityConfig;

use crate::error::{ProgressionError, Result};
use crate::lock::LockConfig;
use crate::models::ActivityType;
use crate::service::{DEFAULT_MAX_DISPLAYED_BADGES, LevelCurve, TierThresholds};

pub const SERVICE_NAME: &str = "progression-engine";

/// 行为积分表
///
/// 记录常规社区行为时使用的默认积分；Manual、AchievementCompleted、BadgeEarned
/// 由调用方或奖励流程给出积分，不在表内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActionPoints {
    pub post_created: i64,
    pub comment_added: i64,
    pub like_received: i64,
    pub share_received: i64,
    pub profile_completed: i64,
    pub daily_login: i64,
    pub referral: i64,
    pub review_submitted: i64,
    pub guide_published: i64,
    pub event_participation: i64,
}

impl Default for ActionPoints {
    fn default() -> Self {
        Self {
            post_created: 10,
            comment_added: 5,
            like_received: 2,
            share_received: 3,
            profile_completed: 50,
            daily_login: 1,
            referral: 100,
            review_submitted: 15,
            guide_published: 25,
            event_participation: 20,
        }
    }
}

impl ActionPoints {
    /// 行为对应的默认积分，不适用的类型返回 None
    pub fn points_for(&self, activity_type: ActivityType) -> Option<i64> {
        let points = match activity_type {
            ActivityType::PostCreated => self.post_created,
            ActivityType::CommentAdded => self.comment_added,
            ActivityType::LikeReceived => self.like_received,
            ActivityType::ShareReceived => self.share_received,
            ActivityType::ProfileCompleted => self.profile_completed,
            ActivityType::DailyLogin => self.daily_login,
            ActivityType::Referral => self.referral,
            ActivityType::ReviewSubmitted => self.review_submitted,
            ActivityType::GuidePublished => self.guide_published,
            ActivityType::EventParticipation => self.event_participation,
            ActivityType::Manual
            | ActivityType::AchievementCompleted
            | ActivityType::BadgeEarned => return None,
        };
        Some(points)
    }

    pub fn validate(&self) -> Result<()> {
        for activity_type in ActivityType::ALL {
            if let Some(points) = self.points_for(activity_type)
                && points < 0
            {
                return Err(ProgressionError::Config(format!(
                    "行为积分不能为负数: {}={}",
                    activity_type, points
                )));
            }
        }
        Ok(())
    }
}

/// 徽章配置
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BadgeSettings {
    /// 最多同时展示的徽章数
    pub max_displayed: usize,
}

impl Default for BadgeSettings {
    fn default() -> Self {
        Self {
            max_displayed: DEFAULT_MAX_DISPLAYED_BADGES,
        }
    }
}

/// 通知配置
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    /// 事件通道容量，满时丢弃并告警
    pub channel_capacity: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 1024,
        }
    }
}

/// `[progression]` 配置段
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgressionSettings {
    pub tiers: TierThresholds,
    pub levels: LevelCurve,
    pub points: ActionPoints,
    pub badges: BadgeSettings,
    pub locks: LockConfig,
    pub notifications: NotificationSettings,
    /// 目录文件路径，未配置时使用空目录
    pub catalog_path: Option<String>,
}

impl ProgressionSettings {
    pub fn validate(&self) -> Result<()> {
        self.tiers.validate()?;
        self.levels.validate()?;
        self.points.validate()?;
        if self.badges.max_displayed == 0 {
            return Err(ProgressionError::Config(
                "badges.max_displayed 至少为 1".to_string(),
            ));
        }
        if self.locks.acquire_timeout_ms == 0 {
            return Err(ProgressionError::Config(
                "locks.acquire_timeout_ms 必须大于 0".to_string(),
            ));
        }
        if self.notifications.enabled && self.notifications.channel_capacity == 0 {
            return Err(ProgressionError::Config(
                "notifications.channel_capacity 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 引擎完整配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub service_name: String,
    pub environment: String,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
    pub progression: ProgressionSettings,
}

impl EngineConfig {
    /// 分层加载并校验
    pub fn load() -> Result<Self> {
        let config: Self = load_layered(SERVICE_NAME)?;
        config.progression.validate()?;
        Ok(config)
    }
}
