//! CLI 命令定义

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// 进阶引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "progression-engine")]
#[command(version, about = "积分、徽章、成就与等级进阶引擎")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别，覆盖配置文件（RUST_LOG 优先）
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 回放事件流
    ///
    /// 每行一个 JSON 事件，未出现过的用户自动注册。
    /// 结束后以 JSON 输出每个用户的进阶概览。
    Replay {
        /// 目录文件，缺省时使用配置中的 catalog_path
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// 事件文件（JSON Lines）
        #[arg(short, long)]
        events: PathBuf,

        /// 遇到第一个失败事件即停止
        #[arg(long)]
        fail_fast: bool,
    },

    /// 校验配置与目录后退出
    CheckConfig {
        /// 目录文件，缺省时使用配置中的 catalog_path
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// 执行数据库迁移
    Migrate,
}
