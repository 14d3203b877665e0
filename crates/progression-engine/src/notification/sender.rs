//! 通知发送器
//!
//! `NotificationSender` 是一个轻量级封装，可以被注入到各个业务服务中。
//! 它负责：
//! - 根据业务事件创建通知
//! - 非阻塞投递（通道已满或已关闭时丢弃并告警）

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{EventKind, ProgressionEvent};
use crate::models::{AchievementDefinition, BadgeDefinition, PromotionRecord};

/// 通知发送器
///
/// 克隆后共享同一通道；未接入通道时所有发送都是空操作
#[derive(Clone, Default)]
pub struct NotificationSender {
    tx: Option<mpsc::Sender<ProgressionEvent>>,
}

impl NotificationSender {
    /// 创建发送器及对应的接收端
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// 不投递任何事件的发送器
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// 发送徽章获得通知
    pub fn send_badge_awarded(&self, user_id: &str, badge: &BadgeDefinition) {
        self.send(ProgressionEvent::new(
            user_id,
            EventKind::BadgeAwarded {
                badge_id: badge.badge_id.clone(),
                badge_name: badge.name.clone(),
            },
        ));
    }

    /// 发送徽章撤销通知
    pub fn send_badge_revoked(&self, user_id: &str, badge_id: &str) {
        self.send(ProgressionEvent::new(
            user_id,
            EventKind::BadgeRevoked {
                badge_id: badge_id.to_string(),
            },
        ));
    }

    /// 发送成就完成通知
    pub fn send_achievement_completed(&self, user_id: &str, achievement: &AchievementDefinition) {
        self.send(ProgressionEvent::new(
            user_id,
            EventKind::AchievementCompleted {
                achievement_id: achievement.achievement_id.clone(),
                title: achievement.title.clone(),
                reward_points: achievement.reward_points,
            },
        ));
    }

    /// 发送等级晋升通知
    pub fn send_tier_promoted(&self, record: &PromotionRecord) {
        self.send(ProgressionEvent::new(
            record.user_id.clone(),
            EventKind::TierPromoted {
                tier: record.tier,
                total_points: record.total_points,
            },
        ));
    }

    /// 非阻塞投递（fire-and-forget）
    fn send(&self, event: ProgressionEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    event_id = %event.event_id,
                    user_id = %event.user_id,
                    event = event.kind.name(),
                    "通知通道已满，事件被丢弃"
                );
            }
            Err(TrySendError::Closed(event)) => {
                debug!(
                    event_id = %event.event_id,
                    event = event.kind.name(),
                    "通知通道已关闭，事件被丢弃"
                );
            }
        }
    }
}

/// 启动日志消费任务
///
/// 逐条记录收到的事件，所有发送端关闭后结束，返回处理的事件数
pub fn spawn_log_consumer(mut rx: mpsc::Receiver<ProgressionEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut handled = 0usize;
        while let Some(event) = rx.recv().await {
            info!(
                event_id = %event.event_id,
                user_id = %event.user_id,
                event = event.kind.name(),
                occurred_at = %event.occurred_at,
                "进阶事件"
            );
            handled += 1;
        }
        handled
    })
}
