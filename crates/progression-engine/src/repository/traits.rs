//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试。
//! 所有实现的失败都以 `ProgressionError::Database` 或 `Persistence` 上抛，
//! 服务层不解释其内容。

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ActivityEntry, ActivityTotals, ActivityType, AppendOutcome, NewActivity, UserAccount,
    UserAchievement, UserBadge,
};

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserAccount>>;

    /// 按总积分倒序列出用户，积分相同按 user_id 升序
    async fn ranked_users(&self, limit: i64) -> Result<Vec<UserAccount>>;

    /// 总积分严格高于给定值的用户数
    async fn count_ahead_of(&self, total_points: i64) -> Result<i64>;
}

/// 活动流水仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityRepositoryTrait: Send + Sync {
    /// 追加流水并递增用户总积分（单个原子操作）
    ///
    /// - 用户不存在：`UserNotFound`，不写入任何数据
    /// - 幂等键命中：返回已有流水，`duplicate = true`，总积分不变
    async fn append(&self, activity: &NewActivity) -> Result<AppendOutcome>;

    /// 按时间倒序分页列出流水
    async fn list_by_user(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>>;

    async fn count_by_user(&self, user_id: &str) -> Result<i64>;

    /// 按活动类型汇总次数与积分
    async fn totals_by_type(&self, user_id: &str) -> Result<Vec<(ActivityType, ActivityTotals)>>;
}

/// 用户徽章仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserBadgeRepositoryTrait: Send + Sync {
    async fn get(&self, user_id: &str, badge_id: &str) -> Result<Option<UserBadge>>;

    /// 不存在时插入（唯一约束语义）
    ///
    /// 插入成功返回带 id 的新记录；(user_id, badge_id) 已存在返回 None
    async fn create_if_absent(&self, badge: &UserBadge) -> Result<Option<UserBadge>>;

    /// 更新展示元数据
    async fn update(&self, badge: &UserBadge) -> Result<()>;

    /// 批量更新展示顺序（单个原子操作）
    ///
    /// 任一徽章未持有时返回 `BadgeNotHeld`，不修改任何记录；
    /// 成功时按入参顺序返回更新后的记录
    async fn update_display_orders(
        &self,
        user_id: &str,
        orders: &[(String, i32)],
    ) -> Result<Vec<UserBadge>>;

    /// 删除记录，返回是否存在
    async fn delete(&self, user_id: &str, badge_id: &str) -> Result<bool>;

    /// 列出用户徽章（按获得时间倒序）
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserBadge>>;
}

/// 用户成就进度仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementProgressRepositoryTrait: Send + Sync {
    async fn get(&self, user_id: &str, achievement_id: &str) -> Result<Option<UserAchievement>>;

    /// 按 (user_id, achievement_id) 插入或更新，返回带 id 的记录
    async fn upsert(&self, achievement: &UserAchievement) -> Result<UserAchievement>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserAchievement>>;
}

/// 角色分配接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleRepositoryTrait: Send + Sync {
    async fn get_roles(&self, user_id: &str) -> Result<Vec<String>>;

    /// 授予角色，返回是否为新授予
    async fn assign_role(&self, user_id: &str, role: &str) -> Result<bool>;
}
