//! PostgreSQL 仓储实现
//!
//! 结构定义见 `migrations/0001_progression.sql`：
//! - `user_badges` 上的 (user_id, badge_id) 唯一约束承担徽章发放的去重
//! - `activity_entries` 上的 (user_id, idempotency_key) 部分唯一索引承担奖励幂等
//! - 流水追加与总积分递增在同一事务内完成，并以 `FOR UPDATE` 锁定用户行

mod achievement_repo;
mod activity_repo;
mod role_repo;
mod user_badge_repo;
mod user_repo;

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::migrate::Migrator;

pub use achievement_repo::PgAchievementRepository;
pub use activity_repo::PgActivityRepository;
pub use role_repo::PgRoleRepository;
pub use user_badge_repo::PgUserBadgeRepository;
pub use user_repo::PgUserRepository;

/// 基于同一连接池的全部仓储
#[derive(Clone)]
pub struct PgRepositories {
    pub users: Arc<PgUserRepository>,
    pub activities: Arc<PgActivityRepository>,
    pub badges: Arc<PgUserBadgeRepository>,
    pub achievements: Arc<PgAchievementRepository>,
    pub roles: Arc<PgRoleRepository>,
}

impl PgRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            activities: Arc::new(PgActivityRepository::new(pool.clone())),
            badges: Arc::new(PgUserBadgeRepository::new(pool.clone())),
            achievements: Arc::new(PgAchievementRepository::new(pool.clone())),
            roles: Arc::new(PgRoleRepository::new(pool)),
        }
    }
}

/// 内置迁移
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
