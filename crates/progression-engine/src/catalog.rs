//! 徽章与成就目录
//!
//! 目录是启动时加载的只读配置数据，校验通过后以 `Arc<Catalog>` 在各服务间共享。
//! 文件格式为 JSON：
//!
//! ```json
//! {
//!   "badges": [{ "badgeId": "first_post", "name": "First Post", "points": 10 }],
//!   "achievements": [{ "achievementId": "content_creator", "title": "Content Creator",
//!                      "requiredProgress": 100, "rewardPoints": 50 }]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ProgressionError, Result};
use crate::models::{AchievementDefinition, BadgeDefinition};

/// 目录文件的原始结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    #[serde(default)]
    pub badges: Vec<BadgeDefinition>,
    #[serde(default)]
    pub achievements: Vec<AchievementDefinition>,
}

/// 已校验的目录
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    badges: HashMap<String, BadgeDefinition>,
    achievements: HashMap<String, AchievementDefinition>,
}

impl Catalog {
    /// 构建并校验目录
    ///
    /// 校验项：编码非空且不重复；积分非负；成就所需进度为非负有限数；
    /// 成就奖励徽章必须存在于徽章目录中。
    pub fn new(
        badges: Vec<BadgeDefinition>,
        achievements: Vec<AchievementDefinition>,
    ) -> Result<Self> {
        let mut badge_map = HashMap::with_capacity(badges.len());
        for badge in badges {
            if badge.badge_id.trim().is_empty() {
                return Err(invalid("徽章编码不能为空".to_string()));
            }
            if badge.points < 0 {
                return Err(invalid(format!(
                    "徽章 {} 的附带积分不能为负数: {}",
                    badge.badge_id, badge.points
                )));
            }
            if let Some(dup) = badge_map.insert(badge.badge_id.clone(), badge) {
                return Err(invalid(format!("徽章编码重复: {}", dup.badge_id)));
            }
        }

        let mut achievement_map = HashMap::with_capacity(achievements.len());
        for achievement in achievements {
            let id = achievement.achievement_id.clone();
            if id.trim().is_empty() {
                return Err(invalid("成就编码不能为空".to_string()));
            }
            if !achievement.required_progress.is_finite() || achievement.required_progress < 0.0 {
                return Err(invalid(format!(
                    "成就 {} 的所需进度非法: {}",
                    id, achievement.required_progress
                )));
            }
            if achievement.reward_points < 0 {
                return Err(invalid(format!(
                    "成就 {} 的奖励积分不能为负数: {}",
                    id, achievement.reward_points
                )));
            }
            if let Some(badge_id) = &achievement.reward_badge_id
                && !badge_map.contains_key(badge_id)
            {
                return Err(invalid(format!(
                    "成就 {} 引用了不存在的奖励徽章: {}",
                    id, badge_id
                )));
            }
            if achievement_map.insert(id.clone(), achievement).is_some() {
                return Err(invalid(format!("成就编码重复: {}", id)));
            }
        }

        Ok(Self {
            badges: badge_map,
            achievements: achievement_map,
        })
    }

    /// 空目录（所有徽章/成就查询都返回不存在）
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_document(document: CatalogDocument) -> Result<Self> {
        Self::new(document.badges, document.achievements)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(content)
            .map_err(|e| ProgressionError::Config(format!("目录解析失败: {}", e)))?;
        Self::from_document(document)
    }

    /// 从 JSON 文件加载目录
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProgressionError::Config(format!("无法读取目录文件 {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json_str(&content)?;

        info!(
            path = %path.display(),
            badges = catalog.badges.len(),
            achievements = catalog.achievements.len(),
            "目录加载完成"
        );
        Ok(catalog)
    }

    pub fn badge(&self, badge_id: &str) -> Option<&BadgeDefinition> {
        self.badges.get(badge_id)
    }

    /// 查找徽章定义，不存在返回 `BadgeNotFound`
    pub fn require_badge(&self, badge_id: &str) -> Result<&BadgeDefinition> {
        self.badge(badge_id)
            .ok_or_else(|| ProgressionError::BadgeNotFound(badge_id.to_string()))
    }

    pub fn achievement(&self, achievement_id: &str) -> Option<&AchievementDefinition> {
        self.achievements.get(achievement_id)
    }

    /// 查找成就定义，不存在返回 `AchievementNotFound`
    pub fn require_achievement(&self, achievement_id: &str) -> Result<&AchievementDefinition> {
        self.achievement(achievement_id)
            .ok_or_else(|| ProgressionError::AchievementNotFound(achievement_id.to_string()))
    }

    pub fn badges(&self) -> impl Iterator<Item = &BadgeDefinition> {
        self.badges.values()
    }

    pub fn achievements(&self) -> impl Iterator<Item = &AchievementDefinition> {
        self.achievements.values()
    }

    pub fn badge_count(&self) -> usize {
        self.badges.len()
    }

    pub fn achievement_count(&self) -> usize {
        self.achievements.len()
    }
}

fn invalid(message: String) -> ProgressionError {
    ProgressionError::Config(message)
}
