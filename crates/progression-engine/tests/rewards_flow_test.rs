//! 奖励流程集成测试
//!
//! 基于内存存储走完整的编排路径：记账 -> 晋升，进度 -> 完成 -> 奖励级联。

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fake::Fake;

use common::{memory_orchestrator, test_catalog};
use progression::error::{ProgressionError, Result};
use progression::models::{AchievementState, ActivityType, Tier, UserAchievement, UserBadge};
use progression::repository::{
    AchievementProgressRepositoryTrait, ActivityRepositoryTrait, UserBadgeRepositoryTrait,
};
use progression::service::{ProgressionRepositories, RewardsOrchestrator};
use progression::{InMemoryStore, NotificationSender, ProgressionSettings};

// ==================== 场景测试 ====================

#[tokio::test]
async fn test_exact_threshold_promotes_to_lower_tier_only() {
    let (_, orchestrator) = memory_orchestrator(&["alice"]);

    let result = orchestrator.award_points("alice", 5_000, "seed").await.unwrap();

    let promotion = result.promotion.expect("应晋升");
    assert_eq!(promotion.tier, Tier::Expert);
    assert_eq!(promotion.total_points, 5_000);

    let stats = orchestrator.user_stats("alice").await.unwrap();
    assert!(stats.tiers.contains(&Tier::Expert));
    assert!(!stats.tiers.contains(&Tier::Reviewer));
}

#[tokio::test]
async fn test_boundary_is_inclusive() {
    let (_, orchestrator) = memory_orchestrator(&["bob"]);

    orchestrator.award_points("bob", 9_999, "seed").await.unwrap();
    let result = orchestrator.award_points("bob", 1, "top up").await.unwrap();

    assert_eq!(result.total_points, 10_000);
    assert_eq!(result.promotion.map(|p| p.tier), Some(Tier::Reviewer));
}

#[tokio::test]
async fn test_achievement_reward_fires_once() {
    let (_, orchestrator) = memory_orchestrator(&["carol"]);

    let first = orchestrator
        .record_achievement_progress("carol", "content_creator", 40.0)
        .await
        .unwrap();
    assert_eq!(first.state, AchievementState::InProgress);

    let second = orchestrator
        .record_achievement_progress("carol", "content_creator", 100.0)
        .await
        .unwrap();
    assert!(second.completed_now);
    assert!(second.user_achievement.is_completed);
    assert_eq!(second.reward_points_credited(), 50);

    let third = orchestrator
        .record_achievement_progress("carol", "content_creator", 100.0)
        .await
        .unwrap();
    assert!(!third.completed_now);
    assert_eq!(third.reward_points_credited(), 0);

    let history = orchestrator.ledger().get_history("carol", 1, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].points_awarded, 50);
    assert_eq!(history[0].activity_type, ActivityType::AchievementCompleted);
    assert_eq!(orchestrator.get_level("carol").await.unwrap().points, 50);
}

#[tokio::test]
async fn test_double_badge_award_keeps_one_record() {
    let (store, orchestrator) = memory_orchestrator(&["dave"]);

    let (a, b) = tokio::join!(
        orchestrator.award_badge("dave", "first_post"),
        orchestrator.award_badge("dave", "first_post"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.outcome.awarded ^ b.outcome.awarded);
    let held = progression::repository::UserBadgeRepositoryTrait::list_by_user(
        store.as_ref(),
        "dave",
    )
    .await
    .unwrap();
    assert_eq!(held.len(), 1);
    // 徽章附带积分只记一次
    assert_eq!(orchestrator.get_level("dave").await.unwrap().points, 10);
}

// ==================== 性质测试 ====================

#[tokio::test]
async fn test_total_equals_sum_of_awards() {
    for _ in 0..20 {
        let (_, orchestrator) = memory_orchestrator(&["erin"]);
        let count: usize = (1..40).fake();
        let mut expected = 0i64;

        for _ in 0..count {
            let points: i64 = (0..2_000).fake();
            expected += points;
            orchestrator.award_points("erin", points, "random").await.unwrap();
        }

        let level = orchestrator.get_level("erin").await.unwrap();
        assert_eq!(level.points, expected);
        assert_eq!(
            orchestrator.ledger().count_entries("erin").await.unwrap(),
            count as i64
        );
    }
}

#[tokio::test]
async fn test_level_monotonic_and_promotion_never_removed() {
    let (_, orchestrator) = memory_orchestrator(&["frank"]);
    let mut last_level = 0;
    let mut held: Vec<Tier> = Vec::new();

    for _ in 0..60 {
        let points: i64 = (0..3_000).fake();
        orchestrator.award_points("frank", points, "random").await.unwrap();

        let level = orchestrator.get_level("frank").await.unwrap().level;
        assert!(level >= last_level);
        last_level = level;

        let tiers = orchestrator.user_stats("frank").await.unwrap().tiers;
        assert!(held.iter().all(|t| tiers.contains(t)));
        held = tiers;
    }

    // 积分不变时重复评估不产生新授予
    let promotion = orchestrator.promotion();
    assert!(promotion.evaluate_and_promote("frank").await.unwrap().is_none());
    assert!(promotion.evaluate_and_promote("frank").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cascade_awards_reward_badge() {
    let (_, orchestrator) = memory_orchestrator(&["gina"]);

    let outcome = orchestrator
        .complete_achievement("gina", "guide_writer")
        .await
        .unwrap();

    assert!(outcome.completed_now);
    let badge = outcome.cascade.badge.expect("奖励徽章");
    assert!(badge.awarded);
    assert!(orchestrator.badges().has_badge("gina", "guide_author").await.unwrap());
    // 级联发放的徽章不附带徽章积分
    assert_eq!(orchestrator.get_level("gina").await.unwrap().points, 250);

    // 已完成后再次完成是空操作
    let again = orchestrator
        .complete_achievement("gina", "guide_writer")
        .await
        .unwrap();
    assert!(!again.completed_now);
    assert!(again.cascade.badge.is_none());
}

#[tokio::test]
async fn test_validation_rejected_before_state_change() {
    let (_, orchestrator) = memory_orchestrator(&["hank"]);

    assert!(matches!(
        orchestrator.award_points("hank", -1, "bad").await,
        Err(ProgressionError::InvalidPointsValue(-1))
    ));

    orchestrator
        .record_achievement_progress("hank", "content_creator", 60.0)
        .await
        .unwrap();
    assert!(matches!(
        orchestrator
            .record_achievement_progress("hank", "content_creator", 59.0)
            .await,
        Err(ProgressionError::InvalidProgressRegression { .. })
    ));

    let record = orchestrator
        .achievements()
        .get_progress("hank", "content_creator")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.current_progress, 60.0);
    assert_eq!(orchestrator.ledger().count_entries("hank").await.unwrap(), 0);
}

#[tokio::test]
async fn test_display_status_requires_held_badge() {
    let (_, orchestrator) = memory_orchestrator(&["ivy"]);

    assert!(matches!(
        orchestrator
            .badges()
            .set_display_status("ivy", "first_post", true)
            .await,
        Err(ProgressionError::BadgeNotHeld { .. })
    ));

    orchestrator.award_badge("ivy", "first_post").await.unwrap();
    let shown = orchestrator
        .badges()
        .set_display_status("ivy", "first_post", true)
        .await
        .unwrap();
    assert!(shown.is_displayed);
}

// ==================== 故障恢复 ====================

/// 进度存储包装：前 N 次 upsert 返回持久化失败
struct FlakyProgressStore {
    inner: Arc<InMemoryStore>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl AchievementProgressRepositoryTrait for FlakyProgressStore {
    async fn get(&self, user_id: &str, achievement_id: &str) -> Result<Option<UserAchievement>> {
        AchievementProgressRepositoryTrait::get(self.inner.as_ref(), user_id, achievement_id).await
    }

    async fn upsert(&self, achievement: &UserAchievement) -> Result<UserAchievement> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProgressionError::Persistence("progress store offline".to_string()));
        }
        self.inner.upsert(achievement).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserAchievement>> {
        AchievementProgressRepositoryTrait::list_by_user(self.inner.as_ref(), user_id).await
    }
}

/// 流水存储包装：前 N 次追加返回持久化失败
struct FlakyActivityStore {
    inner: Arc<InMemoryStore>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl ActivityRepositoryTrait for FlakyActivityStore {
    async fn append(
        &self,
        activity: &progression::models::NewActivity,
    ) -> Result<progression::models::AppendOutcome> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProgressionError::Persistence("ledger offline".to_string()));
        }
        self.inner.append(activity).await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<progression::models::ActivityEntry>> {
        ActivityRepositoryTrait::list_by_user(self.inner.as_ref(), user_id, offset, limit).await
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        self.inner.count_by_user(user_id).await
    }

    async fn totals_by_type(
        &self,
        user_id: &str,
    ) -> Result<Vec<(ActivityType, progression::models::ActivityTotals)>> {
        self.inner.totals_by_type(user_id).await
    }
}

#[tokio::test]
async fn test_retry_after_progress_write_failure_credits_once() {
    let store = Arc::new(InMemoryStore::new());
    store.register_user("jack");
    let flaky = Arc::new(FlakyProgressStore {
        inner: store.clone(),
        failures_left: AtomicUsize::new(1),
    });
    let repos = ProgressionRepositories {
        activities: store.clone(),
        users: store.clone(),
        roles: store.clone(),
        badges: store.clone(),
        achievements: flaky,
    };
    let orchestrator = RewardsOrchestrator::new(
        repos,
        test_catalog(),
        &ProgressionSettings::default(),
        NotificationSender::disabled(),
    )
    .unwrap();

    // 奖励已发放但完成状态写入失败
    let err = orchestrator
        .record_achievement_progress("jack", "guide_writer", 5.0)
        .await
        .unwrap_err();
    assert!(err.is_persistence_failure());
    assert_eq!(
        orchestrator.achievements().state_of("jack", "guide_writer").await.unwrap(),
        AchievementState::NotStarted
    );

    // 重试补齐完成状态，奖励不重复
    let outcome = orchestrator
        .record_achievement_progress("jack", "guide_writer", 5.0)
        .await
        .unwrap();
    assert!(outcome.completed_now);
    assert!(outcome.cascade.points.as_ref().unwrap().duplicate);
    assert!(!outcome.cascade.badge.as_ref().unwrap().awarded);

    assert_eq!(orchestrator.get_level("jack").await.unwrap().points, 250);
    assert_eq!(orchestrator.ledger().count_entries("jack").await.unwrap(), 1);
    assert_eq!(
        orchestrator.achievements().state_of("jack", "guide_writer").await.unwrap(),
        AchievementState::Completed
    );
}

#[tokio::test]
async fn test_retry_after_ledger_failure_completes_achievement() {
    let store = Arc::new(InMemoryStore::new());
    store.register_user("kate");
    let flaky = Arc::new(FlakyActivityStore {
        inner: store.clone(),
        failures_left: AtomicUsize::new(1),
    });
    let repos = ProgressionRepositories {
        activities: flaky,
        users: store.clone(),
        roles: store.clone(),
        badges: store.clone(),
        achievements: store.clone(),
    };
    let orchestrator = RewardsOrchestrator::new(
        repos,
        test_catalog(),
        &ProgressionSettings::default(),
        NotificationSender::disabled(),
    )
    .unwrap();

    orchestrator
        .record_achievement_progress("kate", "content_creator", 40.0)
        .await
        .unwrap();
    assert!(
        orchestrator
            .record_achievement_progress("kate", "content_creator", 100.0)
            .await
            .is_err()
    );
    // 奖励失败时成就保持进行中
    assert_eq!(
        orchestrator.achievements().state_of("kate", "content_creator").await.unwrap(),
        AchievementState::InProgress
    );

    let outcome = orchestrator
        .record_achievement_progress("kate", "content_creator", 100.0)
        .await
        .unwrap();
    assert!(outcome.completed_now);
    assert_eq!(outcome.reward_points_credited(), 50);
    assert_eq!(orchestrator.get_level("kate").await.unwrap().points, 50);
}

/// 徽章存储包装：前 N 次插入返回持久化失败
struct FlakyBadgeStore {
    inner: Arc<InMemoryStore>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl UserBadgeRepositoryTrait for FlakyBadgeStore {
    async fn get(&self, user_id: &str, badge_id: &str) -> Result<Option<UserBadge>> {
        UserBadgeRepositoryTrait::get(self.inner.as_ref(), user_id, badge_id).await
    }

    async fn create_if_absent(&self, badge: &UserBadge) -> Result<Option<UserBadge>> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProgressionError::Persistence("badge store offline".to_string()));
        }
        self.inner.create_if_absent(badge).await
    }

    async fn update(&self, badge: &UserBadge) -> Result<()> {
        self.inner.update(badge).await
    }

    async fn update_display_orders(
        &self,
        user_id: &str,
        orders: &[(String, i32)],
    ) -> Result<Vec<UserBadge>> {
        self.inner.update_display_orders(user_id, orders).await
    }

    async fn delete(&self, user_id: &str, badge_id: &str) -> Result<bool> {
        self.inner.delete(user_id, badge_id).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        UserBadgeRepositoryTrait::list_by_user(self.inner.as_ref(), user_id).await
    }
}

#[tokio::test]
async fn test_badge_not_written_when_points_credit_fails() {
    let store = Arc::new(InMemoryStore::new());
    store.register_user("pat");
    let flaky = Arc::new(FlakyActivityStore {
        inner: store.clone(),
        failures_left: AtomicUsize::new(1),
    });
    let repos = ProgressionRepositories {
        activities: flaky,
        users: store.clone(),
        roles: store.clone(),
        badges: store.clone(),
        achievements: store.clone(),
    };
    let orchestrator = RewardsOrchestrator::new(
        repos,
        test_catalog(),
        &ProgressionSettings::default(),
        NotificationSender::disabled(),
    )
    .unwrap();

    let err = orchestrator.award_badge("pat", "first_post").await.unwrap_err();
    assert!(err.is_persistence_failure());
    // 整体未生效：没有徽章也没有积分
    assert!(!orchestrator.badges().has_badge("pat", "first_post").await.unwrap());
    assert_eq!(orchestrator.get_level("pat").await.unwrap().points, 0);

    let result = orchestrator.award_badge("pat", "first_post").await.unwrap();
    assert!(result.outcome.awarded);
    assert!(!result.points_entry.unwrap().duplicate);
    assert_eq!(orchestrator.get_level("pat").await.unwrap().points, 10);
}

#[tokio::test]
async fn test_retry_after_badge_write_failure_credits_once() {
    let store = Arc::new(InMemoryStore::new());
    store.register_user("quinn");
    let flaky = Arc::new(FlakyBadgeStore {
        inner: store.clone(),
        failures_left: AtomicUsize::new(1),
    });
    let repos = ProgressionRepositories {
        activities: store.clone(),
        users: store.clone(),
        roles: store.clone(),
        badges: flaky,
        achievements: store.clone(),
    };
    let orchestrator = RewardsOrchestrator::new(
        repos,
        test_catalog(),
        &ProgressionSettings::default(),
        NotificationSender::disabled(),
    )
    .unwrap();

    assert!(orchestrator.award_badge("quinn", "first_post").await.is_err());
    assert!(!orchestrator.badges().has_badge("quinn", "first_post").await.unwrap());

    // 重试补齐徽章，积分按幂等键去重
    let result = orchestrator.award_badge("quinn", "first_post").await.unwrap();
    assert!(result.outcome.awarded);
    assert!(result.points_entry.unwrap().duplicate);
    assert_eq!(orchestrator.get_level("quinn").await.unwrap().points, 10);
    assert_eq!(orchestrator.ledger().count_entries("quinn").await.unwrap(), 1);
}
