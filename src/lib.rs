//! # Greeting - 多线程事件循环 HTTP 问候服务
//!
//! 一个 acceptor 线程接受 TCP 连接，按轮询分配给固定数量的事件循环 worker；
//! 每个连接在所属 worker 上运行 读取 → 分发 → 写出 的会话循环。
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use greeting::Server;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> greeting::Result<()> {
//!     Server::bind("127.0.0.1:3000")
//!         .workers(4)
//!         .run()
//!         .await
//! }
//! ```
//!
//! ## 模块组织
//!
//! - `greeting_config` - ServerConfig / ReactorConfig
//! - `greeting_core` - 错误类型、连接 ID、会话状态
//! - `greeting_router` - 路由与问候处理器
//! - `greeting_network` - Acceptor、Worker 池、会话、HTTP 编解码
//! - `bench` - `greeting-bench` 压测客户端

pub mod bench;
pub mod logging;
pub mod server;

pub use crate::server::{Server, ServerBuilder, shutdown_signal};

// ============================================================================
// Crate Re-exports
// ============================================================================

pub use greeting_config;
pub use greeting_core;
pub use greeting_network;
pub use greeting_router;

// ============================================================================
// Prelude Module
// ============================================================================

/// 预导出常用类型
///
/// 通过 `use greeting::prelude::*;` 导入所有常用类型
pub mod prelude {
    pub use crate::server::{Server, ServerBuilder};
    pub use greeting_config::{ConfigError, ReactorConfig, ServerConfig};
    pub use greeting_network::prelude::*;
    pub use greeting_router::prelude::*;
}

// ============================================================================
// Error Types
// ============================================================================

/// Greeting 统一错误类型
pub type Result<T> = std::result::Result<T, Error>;

/// Greeting 统一错误枚举
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 核心错误
    #[error(transparent)]
    Core(#[from] greeting_core::GreetingError),

    /// 配置错误
    #[error(transparent)]
    Config(#[from] greeting_config::ConfigError),
}

// ============================================================================
// Version Information
// ============================================================================

/// Greeting 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Greeting 包名
pub const NAME: &str = env!("CARGO_PKG_NAME");
