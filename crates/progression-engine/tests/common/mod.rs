//! 集成测试公共辅助函数

#![allow(dead_code)]

use std::sync::Arc;

use progression::models::{AchievementDefinition, BadgeDefinition};
use progression::service::{ProgressionRepositories, RewardsOrchestrator};
use progression::{Catalog, InMemoryStore, NotificationSender, ProgressionSettings};

pub type MemoryOrchestrator =
    RewardsOrchestrator<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

pub fn badge(id: &str, points: i64) -> BadgeDefinition {
    BadgeDefinition {
        badge_id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        icon_url: String::new(),
        category: Default::default(),
        rarity: Default::default(),
        points,
    }
}

pub fn achievement(
    id: &str,
    required: f64,
    reward_points: i64,
    reward_badge: Option<&str>,
) -> AchievementDefinition {
    AchievementDefinition {
        achievement_id: id.to_string(),
        title: id.to_string(),
        description: String::new(),
        required_progress: required,
        reward_points,
        reward_badge_id: reward_badge.map(str::to_string),
    }
}

/// 测试目录：
/// - content_creator: 100 进度，奖励 50 积分
/// - guide_writer: 5 进度，奖励 250 积分 + guide_author 徽章（徽章本身 100 积分）
pub fn test_catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::new(
            vec![badge("first_post", 10), badge("guide_author", 100)],
            vec![
                achievement("content_creator", 100.0, 50, None),
                achievement("guide_writer", 5.0, 250, Some("guide_author")),
            ],
        )
        .expect("valid catalog"),
    )
}

pub fn memory_orchestrator(users: &[&str]) -> (Arc<InMemoryStore>, MemoryOrchestrator) {
    let store = Arc::new(InMemoryStore::new());
    for user in users {
        store.register_user(user);
    }
    let orchestrator = RewardsOrchestrator::new(
        ProgressionRepositories::shared(store.clone()),
        test_catalog(),
        &ProgressionSettings::default(),
        NotificationSender::disabled(),
    )
    .expect("valid settings");
    (store, orchestrator)
}
