//! 进阶引擎领域模型
//!
//! 包含积分流水、徽章、成就和用户账户的实体定义

pub mod achievement;
pub mod activity;
pub mod badge;
pub mod enums;
pub mod user;

// 重新导出常用类型
pub use achievement::{AchievementDefinition, ProgressTransition, UserAchievement};
pub use activity::{
    ActivityEntry, ActivityTotals, AppendOutcome, LedgerReceipt, NewActivity, RelatedEntity,
};
pub use badge::{BadgeAwardOutcome, BadgeDefinition, UserBadge};
pub use enums::{AchievementState, ActivityType, BadgeCategory, BadgeRarity, Tier};
pub use user::{PromotionRecord, UserAccount};
