//! Greeting 核心错误类型
//!
//! 定义服务器各层共享的错误类型。

use super::context::ErrorContext;
use std::io;
use thiserror::Error;

/// Greeting 核心错误类型
#[derive(Error, Debug)]
pub enum GreetingError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 网络错误（监听套接字、事件循环的建立失败等）
    #[error("网络错误: {0}")]
    Network(String),

    /// 协议错误（请求字节流无法解析）
    #[error("协议错误: {0}")]
    Protocol(String),

    /// 路由错误
    #[error("路由错误: {0}")]
    Router(String),

    /// 连接错误
    #[error("连接错误: {0}")]
    Connection(String),

    /// 带上下文的错误
    #[error("{1}: {0}")]
    WithContext(#[source] Box<GreetingError>, ErrorContext),
}

impl GreetingError {
    /// 获取错误类型
    ///
    /// 带上下文的错误返回内部错误的类型。
    pub fn kind(&self) -> GreetingErrorKind {
        match self {
            GreetingError::Io(_) => GreetingErrorKind::Io,
            GreetingError::Config(_) => GreetingErrorKind::Config,
            GreetingError::Network(_) => GreetingErrorKind::Network,
            GreetingError::Protocol(_) => GreetingErrorKind::Protocol,
            GreetingError::Router(_) => GreetingErrorKind::Router,
            GreetingError::Connection(_) => GreetingErrorKind::Connection,
            GreetingError::WithContext(inner, _) => inner.kind(),
        }
    }

    /// 添加上下文信息
    pub fn with_context<C>(self, context: C) -> Self
    where
        C: Into<ErrorContext>,
    {
        GreetingError::WithContext(Box::new(self), context.into())
    }

    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        GreetingError::Config(msg.into())
    }

    /// 创建网络错误
    pub fn network(msg: impl Into<String>) -> Self {
        GreetingError::Network(msg.into())
    }

    /// 创建协议错误
    pub fn protocol(msg: impl Into<String>) -> Self {
        GreetingError::Protocol(msg.into())
    }

    /// 创建路由错误
    pub fn router(msg: impl Into<String>) -> Self {
        GreetingError::Router(msg.into())
    }

    /// 创建连接错误
    pub fn connection(msg: impl Into<String>) -> Self {
        GreetingError::Connection(msg.into())
    }
}

/// 错误类型分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GreetingErrorKind {
    /// IO 错误
    Io,
    /// 配置错误
    Config,
    /// 网络错误
    Network,
    /// 协议错误
    Protocol,
    /// 路由错误
    Router,
    /// 连接错误
    Connection,
}
