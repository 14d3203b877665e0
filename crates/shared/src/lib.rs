//! 共享库
//!
//! 包含进阶引擎及其周边工具共用的配置加载、数据库连接、可观测性等基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod observability;
pub mod test_utils;
