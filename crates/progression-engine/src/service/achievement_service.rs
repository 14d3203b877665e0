//! 成就追踪服务
//!
//! 每个 (用户, 成就) 一条进度记录，首次更新时创建。进度只增不减，
//! 首次达到所需进度时进入完成态并恰好一次地发放奖励。
//!
//! 完成流程（在成就锁内）：
//! 1. 读取当前记录并计算状态转换
//! 2. 由 `cascade::plan_completion` 得出奖励效果
//! 3. 执行奖励效果（带幂等键）
//! 4. 持久化完成状态
//!
//! 第 3、4 步之间失败时记录仍为进行中，重试会补齐且不会重复发放。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use progression_shared::observability::metrics as obs_metrics;
use tracing::{debug, info, instrument};

use super::badge_service::BadgeAwardTracker;
use super::dto::ProgressOutcome;
use super::ledger_service::ActivityLedger;
use crate::cascade::{RewardSink, apply_effects, plan_completion};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::lock::{LockManager, lock_keys};
use crate::models::{
    AchievementDefinition, AchievementState, BadgeAwardOutcome, LedgerReceipt, NewActivity,
    ProgressTransition, UserAchievement, achievement::validate_progress,
};
use crate::notification::NotificationSender;
use crate::repository::{
    AchievementProgressRepositoryTrait, ActivityRepositoryTrait, RoleRepositoryTrait,
    UserBadgeRepositoryTrait, UserRepositoryTrait,
};

/// 进度目标
#[derive(Debug, Clone, Copy)]
enum ProgressTarget {
    Value(f64),
    /// 直接置为所需进度
    Required,
}

/// 成就追踪服务
pub struct AchievementTracker<P>
where
    P: AchievementProgressRepositoryTrait,
{
    progress_repo: Arc<P>,
    catalog: Arc<Catalog>,
    rewards: Arc<dyn RewardSink>,
    locks: LockManager,
    notifier: NotificationSender,
}

impl<P> Clone for AchievementTracker<P>
where
    P: AchievementProgressRepositoryTrait,
{
    fn clone(&self) -> Self {
        Self {
            progress_repo: self.progress_repo.clone(),
            catalog: self.catalog.clone(),
            rewards: self.rewards.clone(),
            locks: self.locks.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<P> AchievementTracker<P>
where
    P: AchievementProgressRepositoryTrait + 'static,
{
    pub fn new(
        progress_repo: Arc<P>,
        catalog: Arc<Catalog>,
        rewards: Arc<dyn RewardSink>,
        locks: LockManager,
        notifier: NotificationSender,
    ) -> Self {
        Self {
            progress_repo,
            catalog,
            rewards,
            locks,
            notifier,
        }
    }

    /// 更新成就进度
    ///
    /// - 未完成时进度回退：`InvalidProgressRegression`
    /// - 已完成：空操作，返回当前记录
    /// - 负数或非有限值：`Validation`
    #[instrument(skip(self))]
    pub async fn update_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
        new_progress: f64,
    ) -> Result<ProgressOutcome> {
        validate_progress(new_progress)?;
        self.apply(user_id, achievement_id, ProgressTarget::Value(new_progress))
            .await
    }

    /// 直接完成成就（进度置为所需进度）
    #[instrument(skip(self))]
    pub async fn complete(&self, user_id: &str, achievement_id: &str) -> Result<ProgressOutcome> {
        self.apply(user_id, achievement_id, ProgressTarget::Required)
            .await
    }

    async fn apply(
        &self,
        user_id: &str,
        achievement_id: &str,
        target: ProgressTarget,
    ) -> Result<ProgressOutcome> {
        let definition = self.catalog.require_achievement(achievement_id)?.clone();
        let start = Instant::now();
        let this = self.clone();
        let user = user_id.to_string();

        let outcome = self
            .locks
            .run_exclusive(lock_keys::achievement(user_id, achievement_id), async move {
                // 锁内重新读取，完成态判断以此为准
                let previous = this
                    .progress_repo
                    .get(&user, &definition.achievement_id)
                    .await?;
                let current = previous
                    .clone()
                    .unwrap_or_else(|| UserAchievement::start(&user, &definition));

                let value = match target {
                    ProgressTarget::Value(v) => v,
                    ProgressTarget::Required => current.required_progress,
                };

                match current.advance(value, Utc::now())? {
                    ProgressTransition::Unchanged => match previous {
                        Some(existing) => Ok(ProgressOutcome::without_rewards(existing)),
                        None => {
                            let stored = this.progress_repo.upsert(&current).await?;
                            Ok(ProgressOutcome::without_rewards(stored))
                        }
                    },
                    ProgressTransition::Advanced(next) => {
                        let stored = this.progress_repo.upsert(&next).await?;
                        debug!(
                            progress = stored.current_progress,
                            required = stored.required_progress,
                            "成就进度已更新"
                        );
                        Ok(ProgressOutcome::without_rewards(stored))
                    }
                    ProgressTransition::Completed(next) => {
                        let effects = plan_completion(&definition, previous.as_ref(), &next);
                        let cascade = apply_effects(this.rewards.as_ref(), effects).await?;
                        let stored = this.progress_repo.upsert(&next).await?;

                        obs_metrics::record_achievement_completion(&definition.achievement_id);
                        this.notifier
                            .send_achievement_completed(&user, &definition);
                        info!(
                            user_id = %user,
                            achievement_id = %definition.achievement_id,
                            reward_points = cascade.credited_points(),
                            "成就完成"
                        );

                        Ok(ProgressOutcome {
                            state: AchievementState::Completed,
                            user_achievement: stored,
                            completed_now: true,
                            cascade,
                        })
                    }
                }
            })
            .await?;

        obs_metrics::record_operation_duration("update_progress", start.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// 用户的成就状态，无记录为 NotStarted
    pub async fn state_of(&self, user_id: &str, achievement_id: &str) -> Result<AchievementState> {
        self.catalog.require_achievement(achievement_id)?;
        Ok(self
            .progress_repo
            .get(user_id, achievement_id)
            .await?
            .map_or(AchievementState::NotStarted, |r| r.state()))
    }

    pub async fn get_progress(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> Result<Option<UserAchievement>> {
        self.progress_repo.get(user_id, achievement_id).await
    }

    pub async fn list_achievements(&self, user_id: &str) -> Result<Vec<UserAchievement>> {
        self.progress_repo.list_by_user(user_id).await
    }

    pub async fn list_in_progress(&self, user_id: &str) -> Result<Vec<UserAchievement>> {
        Ok(self
            .list_achievements(user_id)
            .await?
            .into_iter()
            .filter(|r| !r.is_completed)
            .collect())
    }

    pub async fn list_completed(&self, user_id: &str) -> Result<Vec<UserAchievement>> {
        Ok(self
            .list_achievements(user_id)
            .await?
            .into_iter()
            .filter(|r| r.is_completed)
            .collect())
    }

    /// 目录中用户尚未完成的成就（含未开始与进行中，按编码排序）
    pub async fn available_achievements(
        &self,
        user_id: &str,
    ) -> Result<Vec<AchievementDefinition>> {
        let completed: HashSet<String> = self
            .list_completed(user_id)
            .await?
            .into_iter()
            .map(|r| r.achievement_id)
            .collect();

        let mut available: Vec<AchievementDefinition> = self
            .catalog
            .achievements()
            .filter(|def| !completed.contains(&def.achievement_id))
            .cloned()
            .collect();
        available.sort_by(|a, b| a.achievement_id.cmp(&b.achievement_id));
        Ok(available)
    }
}

/// 基于积分流水与徽章服务的奖励执行器
pub struct LedgerRewardSink<A, U, R, B>
where
    A: ActivityRepositoryTrait,
    U: UserRepositoryTrait,
    R: RoleRepositoryTrait,
    B: UserBadgeRepositoryTrait,
{
    ledger: ActivityLedger<A, U, R>,
    badges: BadgeAwardTracker<B>,
}

impl<A, U, R, B> LedgerRewardSink<A, U, R, B>
where
    A: ActivityRepositoryTrait,
    U: UserRepositoryTrait,
    R: RoleRepositoryTrait,
    B: UserBadgeRepositoryTrait,
{
    pub fn new(ledger: ActivityLedger<A, U, R>, badges: BadgeAwardTracker<B>) -> Self {
        Self { ledger, badges }
    }
}

#[async_trait]
impl<A, U, R, B> RewardSink for LedgerRewardSink<A, U, R, B>
where
    A: ActivityRepositoryTrait + 'static,
    U: UserRepositoryTrait + 'static,
    R: RoleRepositoryTrait + 'static,
    B: UserBadgeRepositoryTrait + 'static,
{
    async fn credit_points(&self, activity: NewActivity) -> Result<LedgerReceipt> {
        self.ledger.record(activity).await
    }

    async fn award_badge(&self, user_id: &str, badge_id: &str) -> Result<BadgeAwardOutcome> {
        self.badges.award_badge(user_id, badge_id, None).await
    }
}
