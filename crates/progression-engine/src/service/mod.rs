//! 业务服务层
//!
//! - `ActivityLedger` - 积分流水（积分唯一入口，记账后同临界区评估晋升）
//! - `BadgeAwardTracker` - 徽章发放、撤销、展示设置
//! - `AchievementTracker` - 成就进度与完成奖励
//! - `LevelCalculator` - 积分等级
//! - `TierPromotionEvaluator` - 社区等级晋升
//! - `RewardsOrchestrator` - 组合以上服务的编排入口

mod achievement_service;
mod badge_service;
pub mod dto;
mod ledger_service;
mod level;
mod promotion_service;
mod rewards;

pub use achievement_service::{AchievementTracker, LedgerRewardSink};
pub use badge_service::{BadgeAwardTracker, DEFAULT_MAX_DISPLAYED_BADGES};
pub use dto::{BadgeAwardResult, PointsAwardResult, ProgressOutcome, UserProgressStats};
pub use ledger_service::{ActivityLedger, HistoryPager};
pub use level::{LeaderboardEntry, LevelCalculator, LevelCurve, LevelInfo};
pub use promotion_service::{TierPromotionEvaluator, TierThresholds};
pub use rewards::{ProgressionRepositories, RewardsOrchestrator};
