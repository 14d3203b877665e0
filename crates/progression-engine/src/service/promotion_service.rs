//! 等级晋升评估服务
//!
//! 根据累计积分授予社区等级角色。只授予、不移除；同一等级重复评估无副作用。

use std::sync::Arc;

use chrono::Utc;
use progression_shared::observability::metrics as obs_metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{ProgressionError, Result};
use crate::lock::{LockManager, lock_keys};
use crate::models::{PromotionRecord, Tier};
use crate::notification::NotificationSender;
use crate::repository::{RoleRepositoryTrait, UserRepositoryTrait};

/// 等级积分阈值（含边界）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub expert: i64,
    pub reviewer: i64,
    pub author: i64,
    pub master: i64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            expert: 5_000,
            reviewer: 10_000,
            author: 25_000,
            master: 50_000,
        }
    }
}

impl TierThresholds {
    /// 等级所需积分；基础等级为 0
    pub fn threshold(&self, tier: Tier) -> i64 {
        match tier {
            Tier::User => 0,
            Tier::Expert => self.expert,
            Tier::Reviewer => self.reviewer,
            Tier::Author => self.author,
            Tier::Master => self.master,
        }
    }

    /// 阈值必须按等级顺序严格递增，且都大于 0
    pub fn validate(&self) -> Result<()> {
        let mut previous = (Tier::User, 0);
        for tier in Tier::PROMOTABLE {
            let value = self.threshold(tier);
            if value <= previous.1 {
                return Err(ProgressionError::Config(format!(
                    "等级阈值必须严格递增: {}={} 不大于 {}={}",
                    tier, value, previous.0, previous.1
                )));
            }
            previous = (tier, value);
        }
        Ok(())
    }

    /// 积分满足的最高等级
    pub fn highest_tier_for(&self, total_points: i64) -> Tier {
        Tier::PROMOTABLE
            .iter()
            .rev()
            .copied()
            .find(|tier| total_points >= self.threshold(*tier))
            .unwrap_or(Tier::User)
    }
}

/// 等级晋升评估器
pub struct TierPromotionEvaluator<U, R>
where
    U: UserRepositoryTrait,
    R: RoleRepositoryTrait,
{
    user_repo: Arc<U>,
    role_repo: Arc<R>,
    thresholds: TierThresholds,
    locks: LockManager,
    notifier: NotificationSender,
}

impl<U, R> Clone for TierPromotionEvaluator<U, R>
where
    U: UserRepositoryTrait,
    R: RoleRepositoryTrait,
{
    fn clone(&self) -> Self {
        Self {
            user_repo: self.user_repo.clone(),
            role_repo: self.role_repo.clone(),
            thresholds: self.thresholds,
            locks: self.locks.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<U, R> TierPromotionEvaluator<U, R>
where
    U: UserRepositoryTrait + 'static,
    R: RoleRepositoryTrait + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        role_repo: Arc<R>,
        thresholds: TierThresholds,
        locks: LockManager,
        notifier: NotificationSender,
    ) -> Self {
        Self {
            user_repo,
            role_repo,
            thresholds,
            locks,
            notifier,
        }
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    /// 评估并晋升（独立调用入口，按用户串行）
    ///
    /// 返回本次新授予的等级；无变化返回 None
    #[instrument(skip(self))]
    pub async fn evaluate_and_promote(&self, user_id: &str) -> Result<Option<PromotionRecord>> {
        let this = self.clone();
        let user = user_id.to_string();

        self.locks
            .run_exclusive(lock_keys::user(user_id), async move {
                let account = this
                    .user_repo
                    .get_user(&user)
                    .await?
                    .ok_or_else(|| ProgressionError::UserNotFound(user.clone()))?;
                this.promote_for_total(&user, account.total_points).await
            })
            .await
    }

    /// 按给定总积分评估晋升
    ///
    /// 调用方必须已持有该用户的锁（积分流水在同一临界区内调用）
    pub(crate) async fn promote_for_total(
        &self,
        user_id: &str,
        total_points: i64,
    ) -> Result<Option<PromotionRecord>> {
        let target = self.thresholds.highest_tier_for(total_points);
        if target == Tier::User {
            return Ok(None);
        }

        let roles = self.role_repo.get_roles(user_id).await?;
        if roles.iter().any(|r| r == target.role_name()) {
            debug!(user_id = %user_id, tier = %target, "已持有目标等级");
            return Ok(None);
        }

        if !self.role_repo.assign_role(user_id, target.role_name()).await? {
            return Ok(None);
        }

        let record = PromotionRecord {
            user_id: user_id.to_string(),
            tier: target,
            total_points,
            promoted_at: Utc::now(),
        };

        obs_metrics::record_tier_promotion(target.role_name());
        self.notifier.send_tier_promoted(&record);
        info!(
            user_id = %user_id,
            tier = %target,
            total_points = total_points,
            "用户等级晋升"
        );

        Ok(Some(record))
    }
}
