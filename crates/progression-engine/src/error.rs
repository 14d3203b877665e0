//! 进阶引擎错误类型
//!
//! 定义服务层的业务错误和系统错误。
//! "已经发放过" 之类的幂等结果不是错误，由各操作的返回值携带标记。

use thiserror::Error;

/// 进阶引擎错误类型
#[derive(Debug, Error)]
pub enum ProgressionError {
    // === 校验错误（任何状态变更之前拒绝） ===
    #[error("积分值非法: {0}（不允许为负数）")]
    InvalidPointsValue(i64),

    #[error(
        "成就进度不允许回退: user_id={user_id}, achievement_id={achievement_id}, current={current}, requested={requested}"
    )]
    InvalidProgressRegression {
        user_id: String,
        achievement_id: String,
        current: f64,
        requested: f64,
    },

    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 业务状态错误 ===
    #[error("用户未持有徽章: user_id={user_id}, badge_id={badge_id}")]
    BadgeNotHeld { user_id: String, badge_id: String },

    #[error("展示徽章数量已达上限: user_id={user_id}, limit={limit}")]
    DisplayLimitReached { user_id: String, limit: usize },

    #[error("用户不存在: {0}")]
    UserNotFound(String),

    #[error("徽章定义不存在: {0}")]
    BadgeNotFound(String),

    #[error("成就定义不存在: {0}")]
    AchievementNotFound(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("持久化失败: {0}")]
    Persistence(String),

    #[error("资源锁获取超时: {resource}")]
    LockConflict { resource: String },

    #[error("配置错误: {0}")]
    Config(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 进阶引擎 Result 类型别名
pub type Result<T> = std::result::Result<T, ProgressionError>;

impl ProgressionError {
    /// 检查是否为持久化层失败（对核心逻辑不透明，原样上抛）
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Persistence(_))
    }

    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Persistence(_) | Self::LockConflict { .. }
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Persistence(_)
                | Self::LockConflict { .. }
                | Self::Config(_)
                | Self::Internal(_)
        )
    }

    /// 获取错误码（供调用方记录或映射到接口响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPointsValue(_) => "INVALID_POINTS_VALUE",
            Self::InvalidProgressRegression { .. } => "INVALID_PROGRESS_REGRESSION",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BadgeNotHeld { .. } => "BADGE_NOT_HELD",
            Self::DisplayLimitReached { .. } => "DISPLAY_LIMIT_REACHED",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::BadgeNotFound(_) => "BADGE_NOT_FOUND",
            Self::AchievementNotFound(_) => "ACHIEVEMENT_NOT_FOUND",
            Self::Database(_) => "PERSISTENCE_FAILURE",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
            Self::LockConflict { .. } => "LOCK_CONFLICT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn badge_not_held(user_id: &str, badge_id: &str) -> Self {
        Self::BadgeNotHeld {
            user_id: user_id.to_string(),
            badge_id: badge_id.to_string(),
        }
    }
}

impl From<config::ConfigError> for ProgressionError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
