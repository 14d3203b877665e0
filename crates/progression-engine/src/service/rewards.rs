//! 奖励编排入口
//!
//! 组合积分流水、徽章、成就、等级四个服务，对外提供"用户做了某事"级别的操作。
//! 自身不持有业务状态，所有状态都在各服务的存储中。

use std::sync::Arc;

use tracing::instrument;

use super::achievement_service::{AchievementTracker, LedgerRewardSink};
use super::badge_service::BadgeAwardTracker;
use super::dto::{BadgeAwardResult, PointsAwardResult, ProgressOutcome, UserProgressStats};
use super::ledger_service::ActivityLedger;
use super::level::{LeaderboardEntry, LevelCalculator, LevelInfo};
use super::promotion_service::TierPromotionEvaluator;
use crate::cascade::badge_points_key;
use crate::catalog::Catalog;
use crate::error::{ProgressionError, Result};
use crate::lock::LockManager;
use crate::models::{ActivityType, LedgerReceipt, NewActivity, RelatedEntity, Tier};
use crate::notification::NotificationSender;
use crate::repository::pg::{
    PgAchievementRepository, PgActivityRepository, PgRepositories, PgRoleRepository,
    PgUserBadgeRepository, PgUserRepository,
};
use crate::repository::{
    AchievementProgressRepositoryTrait, ActivityRepositoryTrait, RoleRepositoryTrait,
    UserBadgeRepositoryTrait, UserRepositoryTrait,
};
use crate::settings::{ActionPoints, ProgressionSettings};

/// 编排器依赖的存储集合
pub struct ProgressionRepositories<A, U, R, B, P> {
    pub activities: Arc<A>,
    pub users: Arc<U>,
    pub roles: Arc<R>,
    pub badges: Arc<B>,
    pub achievements: Arc<P>,
}

impl<S> ProgressionRepositories<S, S, S, S, S> {
    /// 同一个存储同时实现全部存储接口（如内存存储）
    pub fn shared(store: Arc<S>) -> Self {
        Self {
            activities: store.clone(),
            users: store.clone(),
            roles: store.clone(),
            badges: store.clone(),
            achievements: store,
        }
    }
}

impl From<PgRepositories>
    for ProgressionRepositories<
        PgActivityRepository,
        PgUserRepository,
        PgRoleRepository,
        PgUserBadgeRepository,
        PgAchievementRepository,
    >
{
    fn from(repos: PgRepositories) -> Self {
        Self {
            activities: repos.activities,
            users: repos.users,
            roles: repos.roles,
            badges: repos.badges,
            achievements: repos.achievements,
        }
    }
}

/// 奖励编排器
pub struct RewardsOrchestrator<A, U, R, B, P>
where
    A: ActivityRepositoryTrait,
    U: UserRepositoryTrait,
    R: RoleRepositoryTrait,
    B: UserBadgeRepositoryTrait,
    P: AchievementProgressRepositoryTrait,
{
    ledger: ActivityLedger<A, U, R>,
    badges: BadgeAwardTracker<B>,
    achievements: AchievementTracker<P>,
    levels: LevelCalculator<U>,
    users: Arc<U>,
    roles: Arc<R>,
    catalog: Arc<Catalog>,
    action_points: ActionPoints,
}

impl<A, U, R, B, P> RewardsOrchestrator<A, U, R, B, P>
where
    A: ActivityRepositoryTrait + 'static,
    U: UserRepositoryTrait + 'static,
    R: RoleRepositoryTrait + 'static,
    B: UserBadgeRepositoryTrait + 'static,
    P: AchievementProgressRepositoryTrait + 'static,
{
    /// 按配置组装全部服务
    ///
    /// 配置非法时返回 `Config` 错误
    pub fn new(
        repos: ProgressionRepositories<A, U, R, B, P>,
        catalog: Arc<Catalog>,
        settings: &ProgressionSettings,
        notifier: NotificationSender,
    ) -> Result<Self> {
        settings.validate()?;

        let locks = LockManager::new(settings.locks.clone());
        let promotion = TierPromotionEvaluator::new(
            repos.users.clone(),
            repos.roles.clone(),
            settings.tiers,
            locks.clone(),
            notifier.clone(),
        );
        let ledger = ActivityLedger::new(repos.activities, promotion, locks.clone());
        let badges = BadgeAwardTracker::new(
            repos.badges,
            catalog.clone(),
            locks.clone(),
            notifier.clone(),
        )
        .with_max_displayed(settings.badges.max_displayed);
        let sink = Arc::new(LedgerRewardSink::new(ledger.clone(), badges.clone()));
        let achievements = AchievementTracker::new(
            repos.achievements,
            catalog.clone(),
            sink,
            locks,
            notifier,
        );
        let levels = LevelCalculator::new(repos.users.clone(), settings.levels);

        Ok(Self {
            ledger,
            badges,
            achievements,
            levels,
            users: repos.users,
            roles: repos.roles,
            catalog,
            action_points: settings.points,
        })
    }

    pub fn ledger(&self) -> &ActivityLedger<A, U, R> {
        &self.ledger
    }

    pub fn badges(&self) -> &BadgeAwardTracker<B> {
        &self.badges
    }

    pub fn achievements(&self) -> &AchievementTracker<P> {
        &self.achievements
    }

    pub fn promotion(&self) -> &TierPromotionEvaluator<U, R> {
        self.ledger.promotion()
    }

    pub fn levels(&self) -> &LevelCalculator<U> {
        &self.levels
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// 人工发放积分
    #[instrument(skip(self))]
    pub async fn award_points(
        &self,
        user_id: &str,
        points: i64,
        reason: &str,
    ) -> Result<PointsAwardResult> {
        let receipt = self
            .ledger
            .record(NewActivity::new(user_id, ActivityType::Manual, points, reason))
            .await?;
        Ok(self.points_result(receipt))
    }

    /// 记录一次常规社区行为，积分取自行为积分表
    #[instrument(skip(self))]
    pub async fn record_action(
        &self,
        user_id: &str,
        activity_type: ActivityType,
        related_entity: Option<RelatedEntity>,
    ) -> Result<PointsAwardResult> {
        let points = self.action_points.points_for(activity_type).ok_or_else(|| {
            ProgressionError::Validation(format!(
                "活动类型 {} 没有默认积分，需显式指定积分",
                activity_type
            ))
        })?;

        let activity = NewActivity::new(user_id, activity_type, points, activity_type.as_str())
            .with_related(related_entity);
        let receipt = self.ledger.record(activity).await?;
        Ok(self.points_result(receipt))
    }

    /// 发放徽章，并记入徽章附带积分
    ///
    /// 附带积分使用 (用户, 徽章) 幂等键，重复发放、撤销后再次发放都只记一次。
    /// 先记积分再写徽章记录：记账失败时徽章不落库，整次调用无副作用；
    /// 徽章写入失败时已记的积分在重试中按幂等键去重，重试即补齐徽章。
    /// 两步在独立任务中执行，调用方取消不会把操作截断在中间。
    #[instrument(skip(self))]
    pub async fn award_badge(&self, user_id: &str, badge_id: &str) -> Result<BadgeAwardResult> {
        self.ensure_user(user_id).await?;
        let definition = self.catalog.require_badge(badge_id)?.clone();

        let ledger = self.ledger.clone();
        let badges = self.badges.clone();
        let (user, badge) = (user_id.to_string(), badge_id.to_string());

        let handle = tokio::spawn(async move {
            let points_entry = if definition.points > 0 {
                let activity = NewActivity::new(
                    &user,
                    ActivityType::BadgeEarned,
                    definition.points,
                    format!("获得徽章: {}", definition.name),
                )
                .with_related(Some(RelatedEntity::new("badge", &badge)))
                .with_idempotency_key(badge_points_key(&user, &badge));
                Some(ledger.record(activity).await?)
            } else {
                None
            };

            let outcome = badges.award_badge(&user, &badge, None).await?;

            let promotion = points_entry.as_ref().and_then(|r| r.promotion.clone());
            Ok(BadgeAwardResult {
                outcome,
                points_entry,
                promotion,
            })
        });

        handle
            .await
            .map_err(|e| ProgressionError::Internal(format!("徽章发放任务异常终止: {}", e)))?
    }

    /// 更新成就进度（完成时级联发放奖励）
    #[instrument(skip(self))]
    pub async fn record_achievement_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        progress: f64,
    ) -> Result<ProgressOutcome> {
        self.ensure_user(user_id).await?;
        self.achievements
            .update_progress(user_id, achievement_id, progress)
            .await
    }

    /// 直接完成成就
    #[instrument(skip(self))]
    pub async fn complete_achievement(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<ProgressOutcome> {
        self.ensure_user(user_id).await?;
        self.achievements.complete(user_id, achievement_id).await
    }

    pub async fn get_level(&self, user_id: &str) -> Result<LevelInfo> {
        self.levels.get_level(user_id).await
    }

    /// 积分排行榜
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.levels.leaderboard(limit).await
    }

    pub async fn rank_of(&self, user_id: &str) -> Result<i64> {
        self.levels.rank_of(user_id).await
    }

    /// 用户进阶概览
    #[instrument(skip(self))]
    pub async fn user_stats(&self, user_id: &str) -> Result<UserProgressStats> {
        let level = self.levels.get_level(user_id).await?;
        let rank = self.levels.rank_of(user_id).await?;
        let badges = self.badges.list_badges(user_id).await?;
        let displayed = self.badges.list_displayed_badges(user_id).await?;
        let achievements = self.achievements.list_achievements(user_id).await?;
        let completed = achievements.iter().filter(|a| a.is_completed).count();

        let mut tiers: Vec<Tier> = self
            .roles
            .get_roles(user_id)
            .await?
            .iter()
            .filter_map(|role| Tier::from_role_name(role))
            .collect();
        tiers.sort();

        Ok(UserProgressStats {
            user_id: user_id.to_string(),
            level,
            rank,
            badge_count: badges.len(),
            displayed_badges: displayed.into_iter().map(|b| b.badge_id).collect(),
            completed_achievements: completed,
            in_progress_achievements: achievements.len() - completed,
            tiers,
            activity_count: self.ledger.count_entries(user_id).await?,
        })
    }

    async fn ensure_user(&self, user_id: &str) -> Result<()> {
        match self.users.get_user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(ProgressionError::UserNotFound(user_id.to_string())),
        }
    }

    fn points_result(&self, receipt: LedgerReceipt) -> PointsAwardResult {
        PointsAwardResult {
            level: self.levels.curve().level_for(receipt.total_points),
            total_points: receipt.total_points,
            entry: receipt.entry,
            promotion: receipt.promotion,
        }
    }
}
