//! 仓储层
//!
//! 提供引擎所依赖的外部协作方接口及两套参考实现。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 服务层依赖 trait 而非具体实现，单元测试使用 mockall 生成的 mock
//! - `InMemoryStore` 供测试与离线回放使用，`pg` 子模块基于 SQLx 实现

mod memory;
pub mod pg;
mod traits;

pub use memory::InMemoryStore;
pub use traits::*;
