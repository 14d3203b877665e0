//! 奖励效果计算与执行

use async_trait::async_trait;
use tracing::debug;

use super::achievement_reward_key;
use crate::error::Result;
use crate::models::{
    AchievementDefinition, ActivityType, BadgeAwardOutcome, LedgerReceipt, NewActivity,
    RelatedEntity, UserAchievement,
};

/// 奖励效果
#[derive(Debug, Clone, PartialEq)]
pub enum RewardEffect {
    /// 记入积分流水（携带幂等键）
    CreditPoints(NewActivity),
    /// 发放徽章
    AwardBadge { user_id: String, badge_id: String },
}

/// 效果执行接口
///
/// 由积分与徽章服务的组合实现，成就追踪只依赖此接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardSink: Send + Sync {
    /// 记入积分；幂等键命中时返回 `duplicate = true` 的结果
    async fn credit_points(&self, activity: NewActivity) -> Result<LedgerReceipt>;

    /// 发放徽章；已持有时返回 `awarded = false`
    async fn award_badge(&self, user_id: &str, badge_id: &str) -> Result<BadgeAwardOutcome>;
}

/// 级联执行结果
#[derive(Debug, Clone, Default)]
pub struct CascadeResult {
    /// 奖励积分流水（重试命中幂等键时为已有流水）
    pub points: Option<LedgerReceipt>,
    /// 奖励徽章发放结果
    pub badge: Option<BadgeAwardOutcome>,
}

impl CascadeResult {
    /// 本次执行是否新增了积分
    pub fn credited_points(&self) -> i64 {
        self.points
            .as_ref()
            .filter(|p| !p.duplicate)
            .map_or(0, |p| p.entry.points_awarded)
    }
}

/// 计算成就状态变化需要执行的奖励效果
///
/// 只有 "之前未完成、之后已完成" 的转换会产生效果；其他情况返回空列表。
/// 奖励积分为 0 时不生成积分流水。
pub fn plan_completion(
    definition: &AchievementDefinition,
    previous: Option<&UserAchievement>,
    next: &UserAchievement,
) -> Vec<RewardEffect> {
    let was_completed = previous.is_some_and(|p| p.is_completed);
    if was_completed || !next.is_completed {
        return Vec::new();
    }

    let mut effects = Vec::with_capacity(2);

    if definition.reward_points > 0 {
        let activity = NewActivity::new(
            next.user_id.clone(),
            ActivityType::AchievementCompleted,
            definition.reward_points,
            format!("完成成就: {}", definition.title),
        )
        .with_related(Some(RelatedEntity::new(
            "achievement",
            definition.achievement_id.clone(),
        )))
        .with_idempotency_key(achievement_reward_key(
            &next.user_id,
            &definition.achievement_id,
        ));
        effects.push(RewardEffect::CreditPoints(activity));
    }

    if let Some(badge_id) = &definition.reward_badge_id {
        effects.push(RewardEffect::AwardBadge {
            user_id: next.user_id.clone(),
            badge_id: badge_id.clone(),
        });
    }

    effects
}

/// 依次执行效果，任一失败立即返回错误
pub async fn apply_effects(sink: &dyn RewardSink, effects: Vec<RewardEffect>) -> Result<CascadeResult> {
    let mut result = CascadeResult::default();

    for effect in effects {
        match effect {
            RewardEffect::CreditPoints(activity) => {
                let outcome = sink.credit_points(activity).await?;
                debug!(
                    entry_id = outcome.entry.id,
                    duplicate = outcome.duplicate,
                    "成就奖励积分已记入"
                );
                result.points = Some(outcome);
            }
            RewardEffect::AwardBadge { user_id, badge_id } => {
                let outcome = sink.award_badge(&user_id, &badge_id).await?;
                debug!(
                    badge_id = %badge_id,
                    awarded = outcome.awarded,
                    "成就奖励徽章已处理"
                );
                result.badge = Some(outcome);
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProgressionError;
    use crate::models::UserBadge;
    use chrono::Utc;

    fn definition(reward_points: i64, reward_badge: Option<&str>) -> AchievementDefinition {
        AchievementDefinition {
            achievement_id: "content_creator".to_string(),
            title: "Content Creator".to_string(),
            description: String::new(),
            required_progress: 100.0,
            reward_points,
            reward_badge_id: reward_badge.map(str::to_string),
        }
    }

    fn record(progress: f64, completed: bool) -> UserAchievement {
        UserAchievement {
            id: 1,
            user_id: "user-1".to_string(),
            achievement_id: "content_creator".to_string(),
            current_progress: progress,
            required_progress: 100.0,
            is_completed: completed,
            completed_at: completed.then(Utc::now),
        }
    }

    #[test]
    fn test_plan_on_completion_transition() {
        let def = definition(50, Some("writer"));
        let effects = plan_completion(&def, Some(&record(40.0, false)), &record(100.0, true));

        assert_eq!(effects.len(), 2);
        match &effects[0] {
            RewardEffect::CreditPoints(activity) => {
                assert_eq!(activity.points_awarded, 50);
                assert_eq!(activity.activity_type, ActivityType::AchievementCompleted);
                assert_eq!(
                    activity.idempotency_key.as_deref(),
                    Some("achievement:user-1:content_creator")
                );
            }
            other => panic!("unexpected effect: {:?}", other),
        }
        assert_eq!(
            effects[1],
            RewardEffect::AwardBadge {
                user_id: "user-1".to_string(),
                badge_id: "writer".to_string()
            }
        );
    }

    #[test]
    fn test_plan_for_new_record_completed_immediately() {
        let effects = plan_completion(&definition(50, None), None, &record(120.0, true));
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_plan_is_empty_without_transition() {
        let def = definition(50, Some("writer"));
        assert!(plan_completion(&def, Some(&record(10.0, false)), &record(40.0, false)).is_empty());
        assert!(plan_completion(&def, Some(&record(100.0, true)), &record(100.0, true)).is_empty());
    }

    #[test]
    fn test_zero_reward_points_skips_ledger_entry() {
        let effects = plan_completion(&definition(0, Some("writer")), None, &record(100.0, true));
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], RewardEffect::AwardBadge { .. }));
    }

    #[tokio::test]
    async fn test_apply_effects_calls_sink_in_order() {
        let mut sink = MockRewardSink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_credit_points()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|activity| {
                Ok(LedgerReceipt {
                    entry: activity.into_entry(9, Utc::now()),
                    total_points: 50,
                    duplicate: false,
                    promotion: None,
                })
            });
        sink.expect_award_badge()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|user_id, badge_id| {
                Ok(BadgeAwardOutcome {
                    awarded: true,
                    user_badge: UserBadge::earned(user_id, badge_id, Utc::now()),
                })
            });

        let effects = plan_completion(&definition(50, Some("writer")), None, &record(100.0, true));
        let result = apply_effects(&sink, effects).await.unwrap();

        assert_eq!(result.credited_points(), 50);
        assert!(result.badge.unwrap().awarded);
    }

    #[tokio::test]
    async fn test_apply_effects_stops_on_failure() {
        let mut sink = MockRewardSink::new();
        sink.expect_credit_points()
            .times(1)
            .returning(|_| Err(ProgressionError::Persistence("ledger down".to_string())));
        sink.expect_award_badge().times(0);

        let effects = plan_completion(&definition(50, Some("writer")), None, &record(100.0, true));
        let err = apply_effects(&sink, effects).await.unwrap_err();
        assert!(err.is_persistence_failure());
    }
}
