//! 用户账户与晋升记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Tier;

/// 用户账户
///
/// 引擎只读取并递增 `total_points`，角色由角色分配服务持有
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub user_id: String,
    /// 累计积分，等于该用户全部流水的 points_awarded 之和
    pub total_points: i64,
}

impl UserAccount {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_points: 0,
        }
    }
}

/// 等级晋升记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRecord {
    pub user_id: String,
    /// 本次授予的等级
    pub tier: Tier,
    /// 触发晋升时的累计积分
    pub total_points: i64,
    pub promoted_at: DateTime<Utc>,
}
