//! 徽章相关实体定义
//!
//! 包含徽章定义（目录数据，只读）和用户持有记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{BadgeCategory, BadgeRarity};

/// 徽章定义
///
/// 来自目录配置，进程启动时加载，运行期间不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDefinition {
    /// 徽章编码（目录键）
    pub badge_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub category: BadgeCategory,
    #[serde(default)]
    pub rarity: BadgeRarity,
    /// 获得徽章时附带的积分（由调用方负责记入流水）
    #[serde(default)]
    pub points: i64,
}

/// 用户徽章
///
/// 每个 (user_id, badge_id) 至多一条，创建后仅展示元数据可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub id: i64,
    pub user_id: String,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
    /// 是否在个人主页展示
    pub is_displayed: bool,
    /// 展示顺序，越小越靠前
    pub display_order: i32,
}

impl UserBadge {
    /// 构造新获得的徽章记录（id 由存储层分配）
    pub fn earned(user_id: &str, badge_id: &str, earned_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            user_id: user_id.to_string(),
            badge_id: badge_id.to_string(),
            earned_at,
            is_displayed: false,
            display_order: 0,
        }
    }
}

/// 徽章发放结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeAwardOutcome {
    /// true 表示本次新发放；false 表示用户已持有，本次无副作用
    pub awarded: bool,
    /// 当前持有的徽章记录（新建或已存在）
    pub user_badge: UserBadge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_definition_defaults_from_json() {
        let def: BadgeDefinition =
            serde_json::from_value(serde_json::json!({"badgeId": "first_post", "name": "First Post"}))
                .unwrap();
        assert_eq!(def.points, 0);
        assert_eq!(def.category, BadgeCategory::Community);
        assert_eq!(def.rarity, BadgeRarity::Common);
    }

    #[test]
    fn test_earned_badge_is_hidden_by_default() {
        let badge = UserBadge::earned("user-1", "first_post", Utc::now());
        assert!(!badge.is_displayed);
        assert_eq!(badge.display_order, 0);
        assert_eq!(badge.id, 0);
    }
}
