//! 命令执行器

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use progression_shared::database::Database;

use super::replay::Replayer;
use crate::catalog::Catalog;
use crate::notification::{NotificationSender, spawn_log_consumer};
use crate::repository::pg::MIGRATOR;
use crate::settings::EngineConfig;

/// 命令执行器
pub struct CommandRunner {
    config: EngineConfig,
}

impl CommandRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// 加载目录：命令行参数优先，其次配置，都没有时使用空目录
    fn load_catalog(&self, override_path: Option<&Path>) -> Result<Catalog> {
        let path = override_path
            .map(Path::to_path_buf)
            .or_else(|| self.config.progression.catalog_path.as_ref().map(PathBuf::from));

        match path {
            Some(path) => Catalog::from_file(&path)
                .with_context(|| format!("加载目录失败: {}", path.display())),
            None => {
                warn!("未配置目录文件，使用空目录");
                Ok(Catalog::empty())
            }
        }
    }

    /// 执行 replay 命令
    pub async fn run_replay(
        &self,
        catalog: Option<PathBuf>,
        events: PathBuf,
        fail_fast: bool,
    ) -> Result<()> {
        let catalog = Arc::new(self.load_catalog(catalog.as_deref())?);
        let settings = &self.config.progression;

        let (notifier, consumer) = if settings.notifications.enabled {
            let (sender, receiver) =
                NotificationSender::channel(settings.notifications.channel_capacity);
            (sender, Some(spawn_log_consumer(receiver)))
        } else {
            (NotificationSender::disabled(), None)
        };

        let mut replayer = Replayer::new(catalog, settings, notifier)?;

        let file = File::open(&events)
            .await
            .with_context(|| format!("无法打开事件文件: {}", events.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if let Err(e) = replayer.apply_line(&line).await {
                if fail_fast {
                    bail!("第 {} 行执行失败: {}", line_no, e);
                }
                warn!(line = line_no, error = %e, "跳过失败事件");
            }
        }

        let report = replayer.finish().await?;
        info!(
            applied = report.applied,
            failed = report.failed,
            users = report.users.len(),
            "回放完成"
        );

        if let Some(consumer) = consumer {
            let delivered = consumer.await.context("通知消费任务异常退出")?;
            info!(delivered, "通知已全部处理");
        }

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    /// 执行 check-config 命令
    pub fn run_check_config(&self, catalog: Option<PathBuf>) -> Result<()> {
        self.config.progression.validate()?;
        let catalog = self.load_catalog(catalog.as_deref())?;

        let tiers = &self.config.progression.tiers;
        println!("配置校验通过");
        println!(
            "  等级阈值: Expert={} Reviewer={} Author={} Master={}",
            tiers.expert, tiers.reviewer, tiers.author, tiers.master
        );
        println!(
            "  等级曲线: 每级 {} 积分，上限 {} 级",
            self.config.progression.levels.points_per_level,
            self.config.progression.levels.max_level
        );
        println!(
            "  目录: {} 个徽章，{} 个成就",
            catalog.badge_count(),
            catalog.achievement_count()
        );
        Ok(())
    }

    /// 执行 migrate 命令
    pub async fn run_migrate(&self) -> Result<()> {
        let db = Database::connect(&self.config.database).await?;
        db.migrate(&MIGRATOR).await?;
        db.close().await;
        Ok(())
    }
}
