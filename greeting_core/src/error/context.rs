//! 错误上下文
//!
//! 为错误附加定位信息：哪个连接、哪个 worker、哪个对端地址。

use crate::connection::ConnectionId;
use std::fmt;
use std::net::SocketAddr;

/// 错误上下文信息
#[derive(Debug, Clone)]
pub enum ErrorContext {
    /// 键值对上下文
    KeyValue(String, String),
    /// 发生错误的连接
    Connection(ConnectionId),
    /// 发生错误的 worker 序号
    Worker(usize),
    /// 对端地址
    Peer(SocketAddr),
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorContext::KeyValue(key, value) => write!(f, "{}: {}", key, value),
            ErrorContext::Connection(id) => write!(f, "conn#{}", id),
            ErrorContext::Worker(idx) => write!(f, "network_{}", idx),
            ErrorContext::Peer(addr) => write!(f, "peer {}", addr),
        }
    }
}

impl From<(&str, String)> for ErrorContext {
    fn from((key, value): (&str, String)) -> Self {
        ErrorContext::KeyValue(key.to_string(), value)
    }
}

impl From<(&str, &str)> for ErrorContext {
    fn from((key, value): (&str, &str)) -> Self {
        ErrorContext::KeyValue(key.to_string(), value.to_string())
    }
}

impl From<ConnectionId> for ErrorContext {
    fn from(id: ConnectionId) -> Self {
        ErrorContext::Connection(id)
    }
}

impl From<SocketAddr> for ErrorContext {
    fn from(addr: SocketAddr) -> Self {
        ErrorContext::Peer(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_tuple() {
        let ctx: ErrorContext = ("bind_addr", "0.0.0.0:3000").into();
        assert!(matches!(ctx, ErrorContext::KeyValue(_, _)));
        assert_eq!(ctx.to_string(), "bind_addr: 0.0.0.0:3000");
    }

    #[test]
    fn test_context_display() {
        assert_eq!(ErrorContext::from(ConnectionId::new(7)).to_string(), "conn#7");
        assert_eq!(ErrorContext::Worker(3).to_string(), "network_3");

        let addr: SocketAddr = "127.0.0.1:3000".parse().unwrap();
        assert_eq!(ErrorContext::from(addr).to_string(), "peer 127.0.0.1:3000");
    }
}
