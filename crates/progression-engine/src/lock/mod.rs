//! 进程内键控锁模块
//!
//! 为同一用户的记账、同一 (用户, 徽章) 的发放撤销、同一用户的展示设置、
//! 同一 (用户, 成就) 的进度更新提供串行化。
//!
//! ## 设计理念
//!
//! - **按键加锁**: 不同键之间互不阻塞，同一键上的操作按获取顺序串行执行
//! - **RAII 模式**: 通过 `LockGuard` 确保锁的自动释放，空闲条目随之回收
//! - **取消安全**: `run_exclusive` 在独立任务中执行临界区，调用方取消不会中断多步操作
//!
//! ## 加锁顺序
//!
//! 成就键 -> 用户键，成就键 -> 徽章键；持有徽章键时不得再获取用户键。
//! 展示键不与其他键嵌套。
//!
//! ## 使用示例
//!
//! ```ignore
//! let locks = LockManager::new(LockConfig::default());
//!
//! let total = locks
//!     .run_exclusive(lock_keys::user("user-1"), async move { credit().await })
//!     .await?;
//! ```

mod lock_manager;

pub use lock_manager::{LockConfig, LockGuard, LockManager};

/// 锁键构造
pub mod lock_keys {
    pub fn user(user_id: &str) -> String {
        format!("user:{}", user_id)
    }

    pub fn badge(user_id: &str, badge_id: &str) -> String {
        format!("badge:{}:{}", user_id, badge_id)
    }

    /// 同一用户的展示设置（展示数量上限需要整体判断）
    pub fn display(user_id: &str) -> String {
        format!("display:{}", user_id)
    }

    pub fn achievement(user_id: &str, achievement_id: &str) -> String {
        format!("achievement:{}:{}", user_id, achievement_id)
    }
}
