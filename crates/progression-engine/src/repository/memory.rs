//! 内存仓储
//!
//! 单个 `InMemoryStore` 同时实现全部仓储接口，供测试与离线回放使用。
//! 流水与用户总积分放在同一把互斥锁下，保证追加与递增的原子性；
//! 徽章与成就按用户分片存放在 DashMap 中。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::traits::{
    AchievementProgressRepositoryTrait, ActivityRepositoryTrait, RoleRepositoryTrait,
    UserBadgeRepositoryTrait, UserRepositoryTrait,
};
use crate::error::{ProgressionError, Result};
use crate::models::{
    ActivityEntry, ActivityTotals, ActivityType, AppendOutcome, NewActivity, Tier, UserAccount,
    UserAchievement, UserBadge,
};

#[derive(Default)]
struct LedgerState {
    users: HashMap<String, UserAccount>,
    /// 每个用户的流水，按追加顺序
    entries: HashMap<String, Vec<ActivityEntry>>,
    /// (user_id, idempotency_key) -> 流水下标
    idempotency: HashMap<(String, String), usize>,
    next_id: i64,
}

/// 内存仓储
#[derive(Default)]
pub struct InMemoryStore {
    ledger: Mutex<LedgerState>,
    roles: DashMap<String, BTreeSet<String>>,
    badges: DashMap<String, BTreeMap<String, UserBadge>>,
    achievements: DashMap<String, BTreeMap<String, UserAchievement>>,
    next_badge_id: AtomicI64,
    next_achievement_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册用户（0 积分，持有基础等级角色）
    ///
    /// 返回是否为新注册；已存在的用户保持不变
    pub fn register_user(&self, user_id: &str) -> bool {
        let created = {
            let mut state = self.ledger.lock();
            if state.users.contains_key(user_id) {
                false
            } else {
                state
                    .users
                    .insert(user_id.to_string(), UserAccount::new(user_id));
                true
            }
        };

        if created {
            self.roles
                .entry(user_id.to_string())
                .or_default()
                .insert(Tier::User.role_name().to_string());
        }
        created
    }

    /// 已注册的用户 ID（升序）
    pub fn user_ids(&self) -> Vec<String> {
        let state = self.ledger.lock();
        let mut ids: Vec<String> = state.users.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl UserRepositoryTrait for InMemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserAccount>> {
        Ok(self.ledger.lock().users.get(user_id).cloned())
    }

    async fn ranked_users(&self, limit: i64) -> Result<Vec<UserAccount>> {
        let state = self.ledger.lock();
        let mut users: Vec<UserAccount> = state.users.values().cloned().collect();
        users.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        users.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(users)
    }

    async fn count_ahead_of(&self, total_points: i64) -> Result<i64> {
        let state = self.ledger.lock();
        Ok(state
            .users
            .values()
            .filter(|u| u.total_points > total_points)
            .count() as i64)
    }
}

#[async_trait]
impl ActivityRepositoryTrait for InMemoryStore {
    async fn append(&self, activity: &NewActivity) -> Result<AppendOutcome> {
        let mut state = self.ledger.lock();
        let state = &mut *state;

        let Some(user) = state.users.get_mut(&activity.user_id) else {
            return Err(ProgressionError::UserNotFound(activity.user_id.clone()));
        };

        let entries = state.entries.entry(activity.user_id.clone()).or_default();

        if let Some(key) = &activity.idempotency_key
            && let Some(&index) = state
                .idempotency
                .get(&(activity.user_id.clone(), key.clone()))
            && let Some(existing) = entries.get(index)
        {
            return Ok(AppendOutcome {
                entry: existing.clone(),
                total_points: user.total_points,
                duplicate: true,
            });
        }

        let total_points = user
            .total_points
            .checked_add(activity.points_awarded)
            .ok_or_else(|| {
                ProgressionError::Persistence(format!(
                    "用户总积分溢出: user_id={}",
                    activity.user_id
                ))
            })?;

        state.next_id += 1;
        let entry = activity.clone().into_entry(state.next_id, Utc::now());

        if let Some(key) = &activity.idempotency_key {
            state
                .idempotency
                .insert((activity.user_id.clone(), key.clone()), entries.len());
        }
        entries.push(entry.clone());
        user.total_points = total_points;

        Ok(AppendOutcome {
            entry,
            total_points,
            duplicate: false,
        })
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ActivityEntry>> {
        let state = self.ledger.lock();
        let Some(entries) = state.entries.get(user_id) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let state = self.ledger.lock();
        Ok(state.entries.get(user_id).map_or(0, |e| e.len() as i64))
    }

    async fn totals_by_type(&self, user_id: &str) -> Result<Vec<(ActivityType, ActivityTotals)>> {
        let state = self.ledger.lock();
        let mut totals: BTreeMap<ActivityType, ActivityTotals> = BTreeMap::new();
        for entry in state.entries.get(user_id).into_iter().flatten() {
            let slot = totals.entry(entry.activity_type).or_default();
            slot.count += 1;
            slot.points += entry.points_awarded;
        }
        Ok(totals.into_iter().collect())
    }
}

#[async_trait]
impl UserBadgeRepositoryTrait for InMemoryStore {
    async fn get(&self, user_id: &str, badge_id: &str) -> Result<Option<UserBadge>> {
        Ok(self
            .badges
            .get(user_id)
            .and_then(|held| held.get(badge_id).cloned()))
    }

    async fn create_if_absent(&self, badge: &UserBadge) -> Result<Option<UserBadge>> {
        let mut held = self.badges.entry(badge.user_id.clone()).or_default();
        if held.contains_key(&badge.badge_id) {
            return Ok(None);
        }

        let mut created = badge.clone();
        created.id = self.next_badge_id.fetch_add(1, Ordering::SeqCst) + 1;
        held.insert(created.badge_id.clone(), created.clone());
        Ok(Some(created))
    }

    async fn update(&self, badge: &UserBadge) -> Result<()> {
        let mut held = self.badges.entry(badge.user_id.clone()).or_default();
        match held.get_mut(&badge.badge_id) {
            Some(existing) => {
                existing.is_displayed = badge.is_displayed;
                existing.display_order = badge.display_order;
                Ok(())
            }
            None => Err(ProgressionError::badge_not_held(
                &badge.user_id,
                &badge.badge_id,
            )),
        }
    }

    async fn update_display_orders(
        &self,
        user_id: &str,
        orders: &[(String, i32)],
    ) -> Result<Vec<UserBadge>> {
        // 持有分片写锁完成校验与写入，中途不会被其他写入穿插
        let mut held = self.badges.entry(user_id.to_string()).or_default();
        if let Some((missing, _)) = orders.iter().find(|(id, _)| !held.contains_key(id)) {
            return Err(ProgressionError::badge_not_held(user_id, missing));
        }

        let mut updated = Vec::with_capacity(orders.len());
        for (badge_id, order) in orders {
            if let Some(badge) = held.get_mut(badge_id) {
                badge.display_order = *order;
                updated.push(badge.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, user_id: &str, badge_id: &str) -> Result<bool> {
        Ok(self
            .badges
            .get_mut(user_id)
            .is_some_and(|mut held| held.remove(badge_id).is_some()))
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let mut badges: Vec<UserBadge> = self
            .badges
            .get(user_id)
            .map(|held| held.values().cloned().collect())
            .unwrap_or_default();
        badges.sort_by(|a, b| b.earned_at.cmp(&a.earned_at).then(b.id.cmp(&a.id)));
        Ok(badges)
    }
}

#[async_trait]
impl AchievementProgressRepositoryTrait for InMemoryStore {
    async fn get(&self, user_id: &str, achievement_id: &str) -> Result<Option<UserAchievement>> {
        Ok(self
            .achievements
            .get(user_id)
            .and_then(|records| records.get(achievement_id).cloned()))
    }

    async fn upsert(&self, achievement: &UserAchievement) -> Result<UserAchievement> {
        let mut records = self
            .achievements
            .entry(achievement.user_id.clone())
            .or_default();

        let mut stored = achievement.clone();
        stored.id = match records.get(&achievement.achievement_id) {
            Some(existing) => existing.id,
            None => self.next_achievement_id.fetch_add(1, Ordering::SeqCst) + 1,
        };
        records.insert(stored.achievement_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<UserAchievement>> {
        let mut records: Vec<UserAchievement> = self
            .achievements
            .get(user_id)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

#[async_trait]
impl RoleRepositoryTrait for InMemoryStore {
    async fn get_roles(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .roles
            .get(user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn assign_role(&self, user_id: &str, role: &str) -> Result<bool> {
        Ok(self
            .roles
            .entry(user_id.to_string())
            .or_default()
            .insert(role.to_string()))
    }
}
