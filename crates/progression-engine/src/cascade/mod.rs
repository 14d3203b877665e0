//! 成就完成奖励级联模块
//!
//! 成就首次进入完成态时，需要恰好一次地发放奖励积分和奖励徽章。
//!
//! ## 核心组件
//!
//! - `plan_completion` - 纯函数，根据前后状态计算需要执行的奖励效果
//! - `RewardEffect` - 单个奖励效果（记积分 / 发徽章），自带幂等键
//! - `RewardSink` - 效果执行接口 trait，用于解耦成就追踪与积分、徽章服务
//! - `CascadeResult` - 执行结果
//!
//! 效果在持久化完成状态之前执行。中途失败时成就仍处于进行中，
//! 重试会重新执行全部效果，幂等键保证每个效果只生效一次。

mod effects;

pub use effects::{CascadeResult, RewardEffect, RewardSink, apply_effects, plan_completion};

#[cfg(test)]
pub use effects::MockRewardSink;

/// 成就奖励积分的幂等键
pub fn achievement_reward_key(user_id: &str, achievement_id: &str) -> String {
    format!("achievement:{}:{}", user_id, achievement_id)
}

/// 徽章附带积分的幂等键
pub fn badge_points_key(user_id: &str, badge_id: &str) -> String {
    format!("badge:{}:{}", user_id, badge_id)
}
