//! 请求上下文
//!
//! 传给请求处理器的已解析请求：方法、路径、查询串与来源连接。

use crate::query;
use greeting_core::ConnectionId;
use std::fmt;
use std::net::SocketAddr;

/// HTTP 请求方法
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
    Trace,
    Connect,
    /// 扩展方法
    Other(String),
}

impl Method {
    /// 从请求行中的方法字段解析
    ///
    /// 方法名区分大小写；未知但合法的 token 作为 [`Method::Other`] 保留。
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            other => Method::Other(other.to_string()),
        }
    }

    /// 方法名
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Other(s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 请求上下文
///
/// 每个请求新建一个，不在请求之间复用。
#[derive(Debug, Clone)]
pub struct Context {
    /// 连接 ID
    pub connection_id: ConnectionId,
    /// 远程地址
    pub peer_addr: SocketAddr,
    /// 请求方法
    pub method: Method,
    /// 请求路径
    pub path: String,
    /// 原始（未解码）查询串
    pub query: String,
    /// 请求时间戳
    pub timestamp: std::time::Instant,
}

impl Context {
    /// 创建新的上下文
    pub fn new(
        connection_id: ConnectionId,
        peer_addr: SocketAddr,
        method: Method,
        path: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            connection_id,
            peer_addr,
            method,
            path: path.into(),
            query: query.into(),
            timestamp: std::time::Instant::now(),
        }
    }

    /// 获取连接 ID
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// 获取远程地址
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// 获取请求方法
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// 获取请求路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取原始查询串
    pub fn query(&self) -> &str {
        &self.query
    }

    /// 获取第一个名为 `key` 的查询参数（已解码）
    pub fn param(&self, key: &str) -> Option<String> {
        query::find_param(&self.query, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(query: &str) -> Context {
        Context::new(
            ConnectionId::new(1),
            "127.0.0.1:40000".parse().unwrap(),
            Method::Get,
            "/greeting",
            query,
        )
    }

    #[test]
    fn test_context_creation() {
        let ctx = context("name=World");

        assert_eq!(ctx.connection_id(), ConnectionId::new(1));
        assert_eq!(ctx.method(), &Method::Get);
        assert_eq!(ctx.path(), "/greeting");
        assert_eq!(ctx.query(), "name=World");
    }

    #[test]
    fn test_context_param() {
        let ctx = context("foo=bar&name=John+Doe");
        assert_eq!(ctx.param("name"), Some("John Doe".to_string()));
        assert_eq!(ctx.param("missing"), None);
    }

    #[test]
    fn test_method_from_token() {
        assert_eq!(Method::from_token("GET"), Method::Get);
        assert_eq!(Method::from_token("POST"), Method::Post);
        assert_eq!(Method::from_token("get"), Method::Other("get".to_string()));
        assert_eq!(Method::from_token("PURGE").as_str(), "PURGE");
    }
}
