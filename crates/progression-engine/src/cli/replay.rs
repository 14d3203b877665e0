//! 事件回放
//!
//! 事件格式（每行一个）：
//!
//! ```json
//! {"type": "action", "userId": "u1", "activityType": "POST_CREATED"}
//! {"type": "points", "userId": "u1", "points": 100, "reason": "活动奖励"}
//! {"type": "badge", "userId": "u1", "badgeId": "helper"}
//! {"type": "progress", "userId": "u1", "achievementId": "content_creator", "progress": 40}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{ProgressionError, Result};
use crate::models::{ActivityType, RelatedEntity};
use crate::notification::NotificationSender;
use crate::repository::InMemoryStore;
use crate::service::{ProgressionRepositories, RewardsOrchestrator, UserProgressStats};
use crate::settings::ProgressionSettings;

/// 基于内存存储的编排器
pub type MemoryOrchestrator =
    RewardsOrchestrator<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

/// 回放事件
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ReplayEvent {
    /// 常规社区行为，积分取自行为积分表
    Action {
        user_id: String,
        activity_type: ActivityType,
        #[serde(default)]
        related: Option<RelatedEntity>,
    },
    Points {
        user_id: String,
        points: i64,
        #[serde(default)]
        reason: String,
    },
    Badge {
        user_id: String,
        badge_id: String,
    },
    RevokeBadge {
        user_id: String,
        badge_id: String,
    },
    Display {
        user_id: String,
        badge_id: String,
        displayed: bool,
    },
    Progress {
        user_id: String,
        achievement_id: String,
        progress: f64,
    },
    Complete {
        user_id: String,
        achievement_id: String,
    },
    /// 重新评估等级晋升
    Promote {
        user_id: String,
    },
}

impl ReplayEvent {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| ProgressionError::Validation(format!("事件解析失败: {}", e)))
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Action { user_id, .. }
            | Self::Points { user_id, .. }
            | Self::Badge { user_id, .. }
            | Self::RevokeBadge { user_id, .. }
            | Self::Display { user_id, .. }
            | Self::Progress { user_id, .. }
            | Self::Complete { user_id, .. }
            | Self::Promote { user_id } => user_id,
        }
    }
}

/// 回放结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub applied: usize,
    pub failed: usize,
    pub users: Vec<UserProgressStats>,
}

/// 事件回放器
pub struct Replayer {
    store: Arc<InMemoryStore>,
    orchestrator: MemoryOrchestrator,
    applied: usize,
    failed: usize,
}

impl Replayer {
    pub fn new(
        catalog: Arc<Catalog>,
        settings: &ProgressionSettings,
        notifier: NotificationSender,
    ) -> Result<Self> {
        let store = Arc::new(InMemoryStore::new());
        let orchestrator = RewardsOrchestrator::new(
            ProgressionRepositories::shared(store.clone()),
            catalog,
            settings,
            notifier,
        )?;
        Ok(Self {
            store,
            orchestrator,
            applied: 0,
            failed: 0,
        })
    }

    pub fn orchestrator(&self) -> &MemoryOrchestrator {
        &self.orchestrator
    }

    /// 执行单个事件，失败计数后原样返回错误
    pub async fn apply(&mut self, event: &ReplayEvent) -> Result<()> {
        let user_id = event.user_id();
        if self.store.register_user(user_id) {
            debug!(user_id = %user_id, "回放中注册新用户");
        }

        let result = self.dispatch(event).await;
        match &result {
            Ok(()) => self.applied += 1,
            Err(e) => {
                self.failed += 1;
                warn!(user_id = %user_id, error = %e, code = e.error_code(), "事件执行失败");
            }
        }
        result
    }

    /// 解析并执行一行；空行与 `#` 开头的注释行跳过，返回 false
    pub async fn apply_line(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(false);
        }
        let event = match ReplayEvent::parse(line) {
            Ok(event) => event,
            Err(e) => {
                self.failed += 1;
                return Err(e);
            }
        };
        self.apply(&event).await?;
        Ok(true)
    }

    async fn dispatch(&self, event: &ReplayEvent) -> Result<()> {
        let orchestrator = &self.orchestrator;
        match event {
            ReplayEvent::Action {
                user_id,
                activity_type,
                related,
            } => {
                orchestrator
                    .record_action(user_id, *activity_type, related.clone())
                    .await?;
            }
            ReplayEvent::Points {
                user_id,
                points,
                reason,
            } => {
                orchestrator.award_points(user_id, *points, reason).await?;
            }
            ReplayEvent::Badge { user_id, badge_id } => {
                orchestrator.award_badge(user_id, badge_id).await?;
            }
            ReplayEvent::RevokeBadge { user_id, badge_id } => {
                orchestrator.badges().revoke_badge(user_id, badge_id).await?;
            }
            ReplayEvent::Display {
                user_id,
                badge_id,
                displayed,
            } => {
                orchestrator
                    .badges()
                    .set_display_status(user_id, badge_id, *displayed)
                    .await?;
            }
            ReplayEvent::Progress {
                user_id,
                achievement_id,
                progress,
            } => {
                orchestrator
                    .record_achievement_progress(user_id, achievement_id, *progress)
                    .await?;
            }
            ReplayEvent::Complete {
                user_id,
                achievement_id,
            } => {
                orchestrator
                    .complete_achievement(user_id, achievement_id)
                    .await?;
            }
            ReplayEvent::Promote { user_id } => {
                orchestrator.promotion().evaluate_and_promote(user_id).await?;
            }
        }
        Ok(())
    }

    /// 汇总所有出现过的用户
    pub async fn finish(self) -> Result<ReplayReport> {
        let mut users = Vec::new();
        for user_id in self.store.user_ids() {
            users.push(self.orchestrator.user_stats(&user_id).await?);
        }
        Ok(ReplayReport {
            applied: self.applied,
            failed: self.failed,
            users,
        })
    }
}
