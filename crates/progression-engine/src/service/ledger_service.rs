//! 活动流水服务
//!
//! 积分的唯一入口。每次记账：
//! 1. 校验积分非负（任何状态变更之前）
//! 2. 在用户锁内原子地追加流水并递增总积分
//! 3. 在同一临界区内评估等级晋升

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use progression_shared::observability::metrics as obs_metrics;
use tracing::{info, instrument};

use super::promotion_service::TierPromotionEvaluator;
use crate::error::{ProgressionError, Result};
use crate::lock::{LockManager, lock_keys};
use crate::models::{
    ActivityEntry, ActivityTotals, ActivityType, LedgerReceipt, NewActivity, RelatedEntity,
};
use crate::repository::{ActivityRepositoryTrait, RoleRepositoryTrait, UserRepositoryTrait};

/// 活动流水服务
pub struct ActivityLedger<A, U, R>
where
    A: ActivityRepositoryTrait,
    U: UserRepositoryTrait,
    R: RoleRepositoryTrait,
{
    activity_repo: Arc<A>,
    promotion: TierPromotionEvaluator<U, R>,
    locks: LockManager,
}

impl<A, U, R> Clone for ActivityLedger<A, U, R>
where
    A: ActivityRepositoryTrait,
    U: UserRepositoryTrait,
    R: RoleRepositoryTrait,
{
    fn clone(&self) -> Self {
        Self {
            activity_repo: self.activity_repo.clone(),
            promotion: self.promotion.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<A, U, R> ActivityLedger<A, U, R>
where
    A: ActivityRepositoryTrait + 'static,
    U: UserRepositoryTrait + 'static,
    R: RoleRepositoryTrait + 'static,
{
    pub fn new(
        activity_repo: Arc<A>,
        promotion: TierPromotionEvaluator<U, R>,
        locks: LockManager,
    ) -> Self {
        Self {
            activity_repo,
            promotion,
            locks,
        }
    }

    pub fn promotion(&self) -> &TierPromotionEvaluator<U, R> {
        &self.promotion
    }

    /// 记录一次活动并发放积分
    ///
    /// 返回新建的流水（含存储层分配的 id 与时间戳）
    pub async fn record_activity(
        &self,
        user_id: &str,
        activity_type: ActivityType,
        points_awarded: i64,
        description: &str,
        related_entity: Option<RelatedEntity>,
    ) -> Result<ActivityEntry> {
        let activity = NewActivity::new(user_id, activity_type, points_awarded, description)
            .with_related(related_entity);
        Ok(self.record(activity).await?.entry)
    }

    /// 记账（完整回执）
    ///
    /// 幂等键命中时不新增流水，但仍会重新评估晋升，
    /// 使上次在晋升阶段失败的调用可以通过重试补齐。
    #[instrument(
        skip(self, activity),
        fields(
            user_id = %activity.user_id,
            activity_type = %activity.activity_type,
            points = activity.points_awarded
        )
    )]
    pub async fn record(&self, activity: NewActivity) -> Result<LedgerReceipt> {
        if activity.points_awarded < 0 {
            return Err(ProgressionError::InvalidPointsValue(activity.points_awarded));
        }
        if activity.user_id.trim().is_empty() {
            return Err(ProgressionError::Validation("user_id 不能为空".to_string()));
        }

        let start = Instant::now();
        let this = self.clone();
        let key = lock_keys::user(&activity.user_id);

        let receipt = self
            .locks
            .run_exclusive(key, async move {
                let outcome = this.activity_repo.append(&activity).await?;
                let promotion = this
                    .promotion
                    .promote_for_total(&outcome.entry.user_id, outcome.total_points)
                    .await?;

                Ok(LedgerReceipt {
                    entry: outcome.entry,
                    total_points: outcome.total_points,
                    duplicate: outcome.duplicate,
                    promotion,
                })
            })
            .await?;

        if !receipt.duplicate {
            obs_metrics::record_activity(
                receipt.entry.activity_type.as_str(),
                receipt.entry.points_awarded,
            );
            info!(
                entry_id = receipt.entry.id,
                total_points = receipt.total_points,
                "积分流水已记录"
            );
        }
        obs_metrics::record_operation_duration("record_activity", start.elapsed().as_secs_f64());

        Ok(receipt)
    }

    /// 分页查询流水（按时间倒序，页码从 1 开始）
    ///
    /// 超出末尾的页返回空列表
    #[instrument(skip(self))]
    pub async fn get_history(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ActivityEntry>> {
        fetch_page(self.activity_repo.as_ref(), user_id, page, page_size).await
    }

    /// 创建可重复遍历的分页器
    pub fn history_pages(&self, user_id: &str, page_size: u32) -> HistoryPager<A> {
        HistoryPager::new(self.activity_repo.clone(), user_id, page_size)
    }

    /// 按活动类型汇总
    #[instrument(skip(self))]
    pub async fn activity_breakdown(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<ActivityType, ActivityTotals>> {
        let totals = self.activity_repo.totals_by_type(user_id).await?;
        Ok(totals.into_iter().collect())
    }

    pub async fn count_entries(&self, user_id: &str) -> Result<i64> {
        self.activity_repo.count_by_user(user_id).await
    }
}

async fn fetch_page<A>(
    repo: &A,
    user_id: &str,
    page: u32,
    page_size: u32,
) -> Result<Vec<ActivityEntry>>
where
    A: ActivityRepositoryTrait + ?Sized,
{
    if page == 0 || page_size == 0 {
        return Err(ProgressionError::Validation(format!(
            "页码和每页条数必须大于 0: page={}, page_size={}",
            page, page_size
        )));
    }

    let offset = i64::from(page - 1) * i64::from(page_size);
    repo.list_by_user(user_id, offset, i64::from(page_size)).await
}

/// 流水分页器
///
/// 惰性加载，`next_page` 依次返回各页直到末尾；`reset` 后可重新遍历，
/// `page` 可直接访问任意页。
pub struct HistoryPager<A>
where
    A: ActivityRepositoryTrait,
{
    repo: Arc<A>,
    user_id: String,
    page_size: u32,
    next: u32,
    exhausted: bool,
}

impl<A> HistoryPager<A>
where
    A: ActivityRepositoryTrait,
{
    fn new(repo: Arc<A>, user_id: &str, page_size: u32) -> Self {
        Self {
            repo,
            user_id: user_id.to_string(),
            page_size,
            next: 1,
            exhausted: false,
        }
    }

    /// 下一页；遍历结束返回 None
    pub async fn next_page(&mut self) -> Result<Option<Vec<ActivityEntry>>> {
        if self.exhausted {
            return Ok(None);
        }

        let entries = fetch_page(self.repo.as_ref(), &self.user_id, self.next, self.page_size).await?;
        if entries.len() < self.page_size as usize {
            self.exhausted = true;
        }
        if entries.is_empty() {
            return Ok(None);
        }

        self.next += 1;
        Ok(Some(entries))
    }

    /// 直接读取第 `page` 页（从 1 开始），不影响遍历位置
    pub async fn page(&self, page: u32) -> Result<Vec<ActivityEntry>> {
        fetch_page(self.repo.as_ref(), &self.user_id, page, self.page_size).await
    }

    /// 回到第一页
    pub fn reset(&mut self) {
        self.next = 1;
        self.exhausted = false;
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}
