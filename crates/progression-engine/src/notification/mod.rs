//! 进阶事件通知模块
//!
//! 徽章发放、成就完成、等级晋升等事件通过有界通道异步投递，
//! 不阻塞主业务流程，投递失败只记录日志。
//!
//! ## 使用示例
//!
//! ```ignore
//! let (sender, receiver) = NotificationSender::channel(1024);
//! let consumer = spawn_log_consumer(receiver);
//!
//! sender.send_tier_promoted(&record);
//! ```

pub mod sender;
pub mod types;

pub use sender::{NotificationSender, spawn_log_consumer};
pub use types::{EventKind, ProgressionEvent};
