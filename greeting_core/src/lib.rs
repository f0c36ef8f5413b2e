//! Greeting 核心类型
//!
//! 提供错误体系、连接标识与会话状态，供网络层和路由层共享。

pub mod connection;
pub mod error;

// 导出主要类型到 crate root
pub use crate::connection::{ConnectionId, ConnectionIdGenerator, ConnectionInfo, SessionState};
pub use crate::error::{ErrorContext, GreetingError, GreetingErrorKind, Result};

// 预导出
pub mod prelude {
    pub use crate::connection::{ConnectionId, ConnectionInfo, SessionState};
    pub use crate::error::{ErrorContext, GreetingError, GreetingErrorKind, Result};
}
