//! 进阶引擎命令行入口

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use progression::cli::{Cli, CommandRunner, Commands};
use progression::settings::EngineConfig;
use progression_shared::observability;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 配置文件均为可选；文件内容非法时所有子命令都直接失败
    let config = EngineConfig::load().context("加载配置失败")?;

    let mut obs_config = config
        .observability
        .clone()
        .with_service_name(progression::settings::SERVICE_NAME);
    if let Some(level) = &cli.log_level {
        obs_config.log_level = level.clone();
    }
    let _guard = observability::init(&obs_config)?;

    info!(environment = %config.environment, "进阶引擎启动");

    let runner = CommandRunner::new(config);
    match cli.command {
        Commands::Replay {
            catalog,
            events,
            fail_fast,
        } => {
            runner.run_replay(catalog, events, fail_fast).await?;
        }
        Commands::CheckConfig { catalog } => {
            runner.run_check_config(catalog)?;
        }
        Commands::Migrate => {
            runner.run_migrate().await?;
        }
    }

    Ok(())
}
