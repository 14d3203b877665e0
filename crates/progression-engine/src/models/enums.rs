//! 进阶引擎枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 活动类型
///
/// 每条积分流水都归属一种活动类型，决定默认积分值和统计口径
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    /// 发帖
    PostCreated,
    /// 评论
    CommentAdded,
    /// 收到点赞
    LikeReceived,
    /// 内容被分享
    ShareReceived,
    /// 完善资料
    ProfileCompleted,
    /// 每日登录
    DailyLogin,
    /// 邀请注册
    Referral,
    /// 提交点评
    ReviewSubmitted,
    /// 发布指南
    GuidePublished,
    /// 参与活动
    EventParticipation,
    /// 获得徽章附带的积分
    BadgeEarned,
    /// 成就完成奖励
    AchievementCompleted,
    /// 人工调整或其他来源
    Manual,
}

impl ActivityType {
    pub const ALL: [ActivityType; 13] = [
        Self::PostCreated,
        Self::CommentAdded,
        Self::LikeReceived,
        Self::ShareReceived,
        Self::ProfileCompleted,
        Self::DailyLogin,
        Self::Referral,
        Self::ReviewSubmitted,
        Self::GuidePublished,
        Self::EventParticipation,
        Self::BadgeEarned,
        Self::AchievementCompleted,
        Self::Manual,
    ];

    /// 与序列化格式一致的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostCreated => "POST_CREATED",
            Self::CommentAdded => "COMMENT_ADDED",
            Self::LikeReceived => "LIKE_RECEIVED",
            Self::ShareReceived => "SHARE_RECEIVED",
            Self::ProfileCompleted => "PROFILE_COMPLETED",
            Self::DailyLogin => "DAILY_LOGIN",
            Self::Referral => "REFERRAL",
            Self::ReviewSubmitted => "REVIEW_SUBMITTED",
            Self::GuidePublished => "GUIDE_PUBLISHED",
            Self::EventParticipation => "EVENT_PARTICIPATION",
            Self::BadgeEarned => "BADGE_EARNED",
            Self::AchievementCompleted => "ACHIEVEMENT_COMPLETED",
            Self::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown activity type: {}", s))
    }
}

/// 徽章分类
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeCategory {
    #[default]
    Community,
    Content,
    Social,
    Special,
}

/// 徽章稀有度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeRarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// 社区等级（角色）
///
/// 按积分阈值从低到高排列，派生的 `Ord` 即晋升顺序
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Tier {
    /// 基础等级，注册即持有，不由晋升评估授予
    User,
    Expert,
    Reviewer,
    Author,
    Master,
}

impl Tier {
    /// 可由积分晋升获得的等级（从低到高）
    pub const PROMOTABLE: [Tier; 4] = [Self::Expert, Self::Reviewer, Self::Author, Self::Master];

    /// 角色名称（写入角色分配服务的值）
    pub fn role_name(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Expert => "Expert",
            Self::Reviewer => "Reviewer",
            Self::Author => "Author",
            Self::Master => "Master",
        }
    }

    /// 从角色名称解析等级，非等级角色（如 Admin）返回 None
    pub fn from_role_name(name: &str) -> Option<Self> {
        match name {
            "User" => Some(Self::User),
            "Expert" => Some(Self::Expert),
            "Reviewer" => Some(Self::Reviewer),
            "Author" => Some(Self::Author),
            "Master" => Some(Self::Master),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.role_name())
    }
}

/// 成就状态
///
/// 由用户成就记录推导的视图：无记录即 NotStarted，Completed 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AchievementState {
    NotStarted,
    InProgress,
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_round_trip_through_str() {
        for t in ActivityType::ALL {
            assert_eq!(t.as_str().parse::<ActivityType>().unwrap(), t);
        }
        assert_eq!(
            "guide-published".parse::<ActivityType>().unwrap(),
            ActivityType::GuidePublished
        );
        assert!("unknown".parse::<ActivityType>().is_err());
    }

    #[test]
    fn test_activity_type_serde_matches_as_str() {
        let json = serde_json::to_string(&ActivityType::ReviewSubmitted).unwrap();
        assert_eq!(json, "\"REVIEW_SUBMITTED\"");
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::User < Tier::Expert);
        assert!(Tier::Expert < Tier::Reviewer);
        assert!(Tier::Reviewer < Tier::Author);
        assert!(Tier::Author < Tier::Master);
    }

    #[test]
    fn test_tier_role_names() {
        for tier in Tier::PROMOTABLE {
            assert_eq!(Tier::from_role_name(tier.role_name()), Some(tier));
        }
        assert_eq!(Tier::from_role_name("Admin"), None);
    }
}
