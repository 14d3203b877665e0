//! 积分进阶引擎
//!
//! 社区用户的积分、徽章、成就与等级晋升规则核心，以库的形式被业务功能在进程内调用。
//!
//! ## 核心功能
//!
//! - **积分流水**：只追加的活动流水是积分的唯一来源，记账与总积分递增原子完成
//! - **徽章发放**：同一用户同一徽章最多一条记录，重复发放是带标记的成功结果
//! - **成就追踪**：进度单调递增，完成时恰好一次地发放奖励积分与奖励徽章
//! - **等级计算**：积分到等级的纯函数映射
//! - **等级晋升**：积分达到阈值时授予社区等级角色，只授予不移除
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `catalog`: 徽章与成就目录
//! - `repository`: 存储接口及内存、PostgreSQL 实现
//! - `service`: 业务服务层
//! - `cascade`: 成就完成奖励级联
//! - `lock`: 进程内键控锁
//! - `notification`: 进阶事件通知
//! - `settings`: 引擎配置
//! - `cli`: 命令行入口

pub mod cascade;
pub mod catalog;
pub mod cli;
pub mod error;
pub mod lock;
pub mod models;
pub mod notification;
pub mod repository;
pub mod service;
pub mod settings;

pub use catalog::{Catalog, CatalogDocument};
pub use error::{ProgressionError, Result};
pub use lock::{LockConfig, LockGuard, LockManager};
pub use models::*;
pub use notification::{EventKind, NotificationSender, ProgressionEvent};
pub use repository::InMemoryStore;
pub use service::{
    AchievementTracker, ActivityLedger, BadgeAwardTracker, LeaderboardEntry, LevelCalculator,
    LevelCurve, LevelInfo, ProgressionRepositories, RewardsOrchestrator, TierPromotionEvaluator,
    TierThresholds, dto,
};
pub use settings::{EngineConfig, ProgressionSettings};
