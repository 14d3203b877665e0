//! 徽章发放服务
//!
//! 负责徽章的发放、撤销和展示设置。发放幂等：同一用户对同一徽章最多一条记录，
//! 重复发放返回 `awarded = false`，不是错误。本服务不发放积分。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use progression_shared::observability::metrics as obs_metrics;
use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::error::{ProgressionError, Result};
use crate::lock::{LockManager, lock_keys};
use crate::models::{BadgeAwardOutcome, BadgeDefinition, UserBadge};
use crate::notification::NotificationSender;
use crate::repository::UserBadgeRepositoryTrait;

/// 默认最多展示的徽章数量
pub const DEFAULT_MAX_DISPLAYED_BADGES: usize = 5;

/// 徽章发放服务
pub struct BadgeAwardTracker<B>
where
    B: UserBadgeRepositoryTrait,
{
    badge_repo: Arc<B>,
    catalog: Arc<Catalog>,
    locks: LockManager,
    notifier: NotificationSender,
    max_displayed: usize,
}

impl<B> Clone for BadgeAwardTracker<B>
where
    B: UserBadgeRepositoryTrait,
{
    fn clone(&self) -> Self {
        Self {
            badge_repo: self.badge_repo.clone(),
            catalog: self.catalog.clone(),
            locks: self.locks.clone(),
            notifier: self.notifier.clone(),
            max_displayed: self.max_displayed,
        }
    }
}

impl<B> BadgeAwardTracker<B>
where
    B: UserBadgeRepositoryTrait + 'static,
{
    pub fn new(
        badge_repo: Arc<B>,
        catalog: Arc<Catalog>,
        locks: LockManager,
        notifier: NotificationSender,
    ) -> Self {
        Self {
            badge_repo,
            catalog,
            locks,
            notifier,
            max_displayed: DEFAULT_MAX_DISPLAYED_BADGES,
        }
    }

    /// 设置展示数量上限
    pub fn with_max_displayed(mut self, max_displayed: usize) -> Self {
        self.max_displayed = max_displayed;
        self
    }

    pub fn max_displayed(&self) -> usize {
        self.max_displayed
    }

    /// 发放徽章
    ///
    /// 在 (user_id, badge_id) 锁内先查后插，存储层的唯一约束兜底并发冲突。
    /// `awarded_at` 为空时使用当前时间。
    #[instrument(skip(self))]
    pub async fn award_badge(
        &self,
        user_id: &str,
        badge_id: &str,
        awarded_at: Option<DateTime<Utc>>,
    ) -> Result<BadgeAwardOutcome> {
        let definition = self.catalog.require_badge(badge_id)?.clone();

        let repo = self.badge_repo.clone();
        let candidate = UserBadge::earned(user_id, badge_id, awarded_at.unwrap_or_else(Utc::now));

        let outcome = self
            .locks
            .run_exclusive(lock_keys::badge(user_id, badge_id), async move {
                if let Some(existing) = repo.get(&candidate.user_id, &candidate.badge_id).await? {
                    return Ok(BadgeAwardOutcome {
                        awarded: false,
                        user_badge: existing,
                    });
                }

                if let Some(created) = repo.create_if_absent(&candidate).await? {
                    return Ok(BadgeAwardOutcome {
                        awarded: true,
                        user_badge: created,
                    });
                }

                // 唯一约束冲突：其他实例抢先插入
                let existing = repo
                    .get(&candidate.user_id, &candidate.badge_id)
                    .await?
                    .ok_or_else(|| {
                        ProgressionError::Persistence(format!(
                            "徽章插入冲突但记录不存在: user_id={}, badge_id={}",
                            candidate.user_id, candidate.badge_id
                        ))
                    })?;
                Ok(BadgeAwardOutcome {
                    awarded: false,
                    user_badge: existing,
                })
            })
            .await?;

        obs_metrics::record_badge_award(badge_id, outcome.awarded);
        if outcome.awarded {
            self.notifier.send_badge_awarded(user_id, &definition);
            info!(user_id = %user_id, badge_id = %badge_id, "徽章发放成功");
        }

        Ok(outcome)
    }

    /// 撤销徽章（管理操作）
    ///
    /// 返回 false 表示用户未持有该徽章
    #[instrument(skip(self))]
    pub async fn revoke_badge(&self, user_id: &str, badge_id: &str) -> Result<bool> {
        let repo = self.badge_repo.clone();
        let (user, badge) = (user_id.to_string(), badge_id.to_string());

        let removed = self
            .locks
            .run_exclusive(lock_keys::badge(user_id, badge_id), async move {
                repo.delete(&user, &badge).await
            })
            .await?;

        if removed {
            self.notifier.send_badge_revoked(user_id, badge_id);
            info!(user_id = %user_id, badge_id = %badge_id, "徽章已撤销");
        }
        Ok(removed)
    }

    /// 设置徽章是否展示
    ///
    /// 打开展示时检查上限，已达上限返回 `DisplayLimitReached`
    #[instrument(skip(self))]
    pub async fn set_display_status(
        &self,
        user_id: &str,
        badge_id: &str,
        is_displayed: bool,
    ) -> Result<UserBadge> {
        let repo = self.badge_repo.clone();
        let max_displayed = self.max_displayed;
        let (user, badge) = (user_id.to_string(), badge_id.to_string());

        self.locks
            .run_exclusive(lock_keys::display(user_id), async move {
                let mut held = repo
                    .get(&user, &badge)
                    .await?
                    .ok_or_else(|| ProgressionError::badge_not_held(&user, &badge))?;

                if held.is_displayed == is_displayed {
                    return Ok(held);
                }

                if is_displayed {
                    let displayed = repo
                        .list_by_user(&user)
                        .await?
                        .iter()
                        .filter(|b| b.is_displayed)
                        .count();
                    if displayed >= max_displayed {
                        warn!(user_id = %user, limit = max_displayed, "展示徽章数量已达上限");
                        return Err(ProgressionError::DisplayLimitReached {
                            user_id: user.clone(),
                            limit: max_displayed,
                        });
                    }
                }

                held.is_displayed = is_displayed;
                repo.update(&held).await?;
                Ok(held)
            })
            .await
    }

    /// 设置徽章展示顺序
    #[instrument(skip(self))]
    pub async fn set_display_order(
        &self,
        user_id: &str,
        badge_id: &str,
        display_order: i32,
    ) -> Result<UserBadge> {
        let repo = self.badge_repo.clone();
        let (user, badge) = (user_id.to_string(), badge_id.to_string());

        self.locks
            .run_exclusive(lock_keys::display(user_id), async move {
                let mut held = repo
                    .get(&user, &badge)
                    .await?
                    .ok_or_else(|| ProgressionError::badge_not_held(&user, &badge))?;
                held.display_order = display_order;
                repo.update(&held).await?;
                Ok(held)
            })
            .await
    }

    /// 批量调整展示顺序
    ///
    /// 由存储层一次性写入，任一徽章未持有时全部不生效
    #[instrument(skip(self, orders), fields(count = orders.len()))]
    pub async fn reorder_display(
        &self,
        user_id: &str,
        orders: &[(String, i32)],
    ) -> Result<Vec<UserBadge>> {
        let repo = self.badge_repo.clone();
        let user = user_id.to_string();
        let orders = orders.to_vec();

        self.locks
            .run_exclusive(lock_keys::display(user_id), async move {
                repo.update_display_orders(&user, &orders).await
            })
            .await
    }

    /// 用户持有的全部徽章（按获得时间倒序）
    pub async fn list_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        self.badge_repo.list_by_user(user_id).await
    }

    /// 展示中的徽章（按展示顺序，其次按获得时间）
    pub async fn list_displayed_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let mut displayed: Vec<UserBadge> = self
            .badge_repo
            .list_by_user(user_id)
            .await?
            .into_iter()
            .filter(|b| b.is_displayed)
            .collect();
        displayed.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then(a.earned_at.cmp(&b.earned_at))
        });
        Ok(displayed)
    }

    pub async fn has_badge(&self, user_id: &str, badge_id: &str) -> Result<bool> {
        Ok(self.badge_repo.get(user_id, badge_id).await?.is_some())
    }

    /// 目录中用户尚未持有的徽章（按编码排序）
    pub async fn available_badges(&self, user_id: &str) -> Result<Vec<BadgeDefinition>> {
        let held: HashSet<String> = self
            .badge_repo
            .list_by_user(user_id)
            .await?
            .into_iter()
            .map(|b| b.badge_id)
            .collect();

        let mut available: Vec<BadgeDefinition> = self
            .catalog
            .badges()
            .filter(|def| !held.contains(&def.badge_id))
            .cloned()
            .collect();
        available.sort_by(|a, b| a.badge_id.cmp(&b.badge_id));
        Ok(available)
    }
}
