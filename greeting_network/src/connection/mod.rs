//! 连接管理
//!
//! 会话登记表与 Reactor 指标。

pub mod metrics;
pub mod registry;

// 重新导出主要类型
pub use greeting_core::{ConnectionId, ConnectionIdGenerator, ConnectionInfo, SessionState};
pub use metrics::ReactorMetrics;
pub use registry::{Registration, SessionRegistry};
