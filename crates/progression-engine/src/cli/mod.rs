//! 命令行模块
//!
//! - `replay` - 在内存存储上回放 JSON Lines 事件流，输出各用户的进阶概览
//! - `check-config` - 校验配置与目录
//! - `migrate` - 对配置的数据库执行迁移
//!
//! ```bash
//! progression-engine replay --catalog config/catalog.json --events events.jsonl
//! progression-engine check-config
//! ```

pub mod commands;
pub mod replay;
pub mod runner;

pub use commands::{Cli, Commands};
pub use replay::{ReplayEvent, ReplayReport};
pub use runner::CommandRunner;
