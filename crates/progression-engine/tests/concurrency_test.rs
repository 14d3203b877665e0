//! 并发集成测试
//!
//! 多线程运行时下验证按键串行化与调用方取消后的完整性。

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Notify;

use common::{memory_orchestrator, test_catalog};
use progression::error::Result;
use progression::models::{
    ActivityEntry, ActivityTotals, ActivityType, AppendOutcome, NewActivity, Tier,
};
use progression::repository::{ActivityRepositoryTrait, UserBadgeRepositoryTrait};
use progression::service::{ProgressionRepositories, RewardsOrchestrator};
use progression::{InMemoryStore, NotificationSender, ProgressionSettings};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_awards_lose_no_points() {
    let (_, orchestrator) = memory_orchestrator(&["alice"]);
    let orchestrator = Arc::new(orchestrator);

    let tasks = (0..100).map(|i| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .award_points("alice", 100, &format!("award {}", i))
                .await
        })
    });
    let results = join_all(tasks).await;

    let promotions: Vec<Tier> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter_map(|r| r.promotion.map(|p| p.tier))
        .collect();

    assert_eq!(orchestrator.get_level("alice").await.unwrap().points, 10_000);
    // 每个等级恰好授予一次
    assert_eq!(promotions.len(), 2);
    assert!(promotions.contains(&Tier::Expert));
    assert!(promotions.contains(&Tier::Reviewer));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_badge_awards_yield_single_record() {
    let (store, orchestrator) = memory_orchestrator(&["bob"]);
    let orchestrator = Arc::new(orchestrator);

    let tasks = (0..16).map(|_| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.award_badge("bob", "first_post").await })
    });
    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.outcome.awarded).count(), 1);
    let held = UserBadgeRepositoryTrait::list_by_user(store.as_ref(), "bob")
        .await
        .unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(orchestrator.get_level("bob").await.unwrap().points, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_completion_rewards_once() {
    let (_, orchestrator) = memory_orchestrator(&["carol"]);
    let orchestrator = Arc::new(orchestrator);

    let tasks = (0..12).map(|_| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .record_achievement_progress("carol", "guide_writer", 5.0)
                .await
        })
    });
    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.completed_now).count(), 1);
    assert_eq!(orchestrator.get_level("carol").await.unwrap().points, 250);
    assert_eq!(orchestrator.ledger().count_entries("carol").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_users_do_not_block_each_other() {
    let users: Vec<String> = (0..8).map(|i| format!("user-{}", i)).collect();
    let refs: Vec<&str> = users.iter().map(String::as_str).collect();
    let (_, orchestrator) = memory_orchestrator(&refs);
    let orchestrator = Arc::new(orchestrator);

    let tasks = users.iter().flat_map(|user| {
        (0..10).map(|_| {
            let orchestrator = orchestrator.clone();
            let user = user.clone();
            tokio::spawn(async move { orchestrator.award_points(&user, 7, "tick").await })
        })
    });
    for result in join_all(tasks.collect::<Vec<_>>()).await {
        result.unwrap().unwrap();
    }

    for user in &users {
        assert_eq!(orchestrator.get_level(user).await.unwrap().points, 70);
    }
}

/// 流水存储包装：追加时先通知已进入，再等待放行
struct GatedActivityStore {
    inner: Arc<InMemoryStore>,
    entered: Notify,
    gate: Notify,
}

#[async_trait]
impl ActivityRepositoryTrait for GatedActivityStore {
    async fn append(&self, activity: &NewActivity) -> Result<AppendOutcome> {
        self.entered.notify_one();
        self.gate.notified().await;
        self.inner.append(activity).await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>> {
        ActivityRepositoryTrait::list_by_user(self.inner.as_ref(), user_id, offset, limit).await
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        self.inner.count_by_user(user_id).await
    }

    async fn totals_by_type(&self, user_id: &str) -> Result<Vec<(ActivityType, ActivityTotals)>> {
        self.inner.totals_by_type(user_id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_caller_does_not_split_operation() {
    let store = Arc::new(InMemoryStore::new());
    store.register_user("dave");
    let gated = Arc::new(GatedActivityStore {
        inner: store.clone(),
        entered: Notify::new(),
        gate: Notify::new(),
    });
    let repos = ProgressionRepositories {
        activities: gated.clone(),
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

    // 调用方在存储追加进行中时放弃等待
    tokio::select! {
        _ = orchestrator.award_points("dave", 5_000, "bonus") => {
            panic!("追加被阻塞时调用不应完成");
        }
        _ = gated.entered.notified() => {}
    }
    assert_eq!(orchestrator.ledger().count_entries("dave").await.unwrap(), 0);

    gated.gate.notify_one();

    // 临界区继续执行到底：记账与晋升同时可见
    let stats = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = orchestrator.user_stats("dave").await.unwrap();
            if stats.tiers.contains(&Tier::Expert) {
                break stats;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("被取消的操作应在后台完成");

    assert_eq!(stats.activity_count, 1);
    assert_eq!(stats.level.points, 5_000);
}
