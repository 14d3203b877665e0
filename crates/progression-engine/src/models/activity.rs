//! 活动流水实体定义
//!
//! 活动流水是积分的唯一来源，只追加、不修改、不删除

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ActivityType;
use super::user::PromotionRecord;

/// 活动流水
///
/// 每次发放积分（包括成就奖励、徽章附带积分）都会生成一条流水
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: String,
    pub activity_type: ActivityType,
    /// 本次发放的积分（非负）
    pub points_awarded: i64,
    pub description: String,
    /// 关联实体类型（如 guide、review、achievement）
    #[sqlx(default)]
    pub related_entity_type: Option<String>,
    #[sqlx(default)]
    pub related_entity_id: Option<String>,
    /// 幂等键，同一用户下唯一
    #[sqlx(default)]
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// 关联实体引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntity {
    pub entity_type: String,
    pub entity_id: String,
}

impl RelatedEntity {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// 待写入的活动流水
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub user_id: String,
    pub activity_type: ActivityType,
    pub points_awarded: i64,
    pub description: String,
    pub related_entity: Option<RelatedEntity>,
    pub idempotency_key: Option<String>,
}

impl NewActivity {
    pub fn new(
        user_id: impl Into<String>,
        activity_type: ActivityType,
        points_awarded: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            activity_type,
            points_awarded,
            description: description.into(),
            related_entity: None,
            idempotency_key: None,
        }
    }

    pub fn with_related(mut self, related: Option<RelatedEntity>) -> Self {
        self.related_entity = related;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// 生成流水实体（由存储层分配 id 后调用）
    pub fn into_entry(self, id: i64, occurred_at: DateTime<Utc>) -> ActivityEntry {
        let (related_entity_type, related_entity_id) = match self.related_entity {
            Some(r) => (Some(r.entity_type), Some(r.entity_id)),
            None => (None, None),
        };
        ActivityEntry {
            id,
            user_id: self.user_id,
            activity_type: self.activity_type,
            points_awarded: self.points_awarded,
            description: self.description,
            related_entity_type,
            related_entity_id,
            idempotency_key: self.idempotency_key,
            occurred_at,
        }
    }
}

/// 流水追加结果
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub entry: ActivityEntry,
    /// 追加后的用户总积分
    pub total_points: i64,
    /// 幂等键命中，返回的是已有流水，总积分未变化
    pub duplicate: bool,
}

/// 记账回执
///
/// 在流水追加结果之上附带同一临界区内触发的等级晋升
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    pub entry: ActivityEntry,
    /// 记账后的用户总积分
    pub total_points: i64,
    /// 幂等键命中，未新增流水
    pub duplicate: bool,
    /// 本次触发的等级晋升
    pub promotion: Option<PromotionRecord>,
}

/// 按活动类型汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTotals {
    pub count: u64,
    pub points: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_activity_into_entry() {
        let now = Utc::now();
        let entry = NewActivity::new("user-1", ActivityType::GuidePublished, 25, "发布指南")
            .with_related(Some(RelatedEntity::new("guide", "g-42")))
            .with_idempotency_key("guide:g-42")
            .into_entry(7, now);

        assert_eq!(entry.id, 7);
        assert_eq!(entry.points_awarded, 25);
        assert_eq!(entry.related_entity_type.as_deref(), Some("guide"));
        assert_eq!(entry.related_entity_id.as_deref(), Some("g-42"));
        assert_eq!(entry.idempotency_key.as_deref(), Some("guide:g-42"));
        assert_eq!(entry.occurred_at, now);
    }

    #[test]
    fn test_entry_without_related_entity() {
        let entry = NewActivity::new("user-1", ActivityType::Manual, 0, "调整").into_entry(1, Utc::now());
        assert!(entry.related_entity_type.is_none());
        assert!(entry.related_entity_id.is_none());
        assert!(entry.idempotency_key.is_none());
    }
}
