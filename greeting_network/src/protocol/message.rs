//! HTTP/1.x 消息
//!
//! 请求、响应与协议错误类型。

use bytes::{BufMut, Bytes, BytesMut};
use greeting_core::GreetingError;
use greeting_router::{Method, Reply, StatusCode};
use std::fmt;
use thiserror::Error;

/// HTTP 协议错误
///
/// 这些错误都表示连接上的字节流已经无法继续解析，会话收到后直接关闭连接。
#[derive(Error, Debug)]
pub enum HttpError {
    /// 传输层 IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 请求行格式错误
    #[error("请求行格式错误")]
    BadRequestLine,

    /// 头部格式错误
    #[error("头部格式错误: {0}")]
    BadHeader(String),

    /// 不支持的 HTTP 版本
    #[error("不支持的 HTTP 版本: {0}")]
    UnsupportedVersion(String),

    /// Content-Length 非法或重复
    #[error("Content-Length 非法")]
    BadContentLength,

    /// 不支持的传输编码
    #[error("不支持的 Transfer-Encoding: {0}")]
    UnsupportedTransferEncoding(String),

    /// 请求头过大
    #[error("请求头超过 {limit} 字节")]
    HeadTooLarge { limit: usize },

    /// 请求体过大
    #[error("请求体 {size} 字节，超过上限 {limit} 字节")]
    BodyTooLarge { size: usize, limit: usize },
}

impl From<HttpError> for GreetingError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Io(e) => GreetingError::Io(e),
            other => GreetingError::protocol(other.to_string()),
        }
    }
}

/// HTTP 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// 从请求行中的版本字段解析
    pub fn from_token(token: &str) -> Result<Self, HttpError> {
        match token {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            other => Err(HttpError::UnsupportedVersion(other.to_string())),
        }
    }

    /// 版本字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP 请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// 请求方法
    pub method: Method,
    /// 请求目标（路径 + 查询串，原样保留）
    pub target: String,
    /// HTTP 版本
    pub version: Version,
    /// 头部列表，保持到达顺序
    pub headers: Vec<(String, String)>,
    /// 请求体
    pub body: Bytes,
}

impl HttpRequest {
    /// 查找头部（名称不区分大小写）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 客户端是否希望保持连接
    ///
    /// `Connection: close` 总是关闭；HTTP/1.0 需要显式 `Connection: keep-alive`。
    pub fn keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;
        for (_, value) in self
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("connection"))
        {
            for token in value.split(',').map(str::trim) {
                if token.eq_ignore_ascii_case("close") {
                    close = true;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    keep_alive = true;
                }
            }
        }

        if close {
            return false;
        }
        match self.version {
            Version::Http11 => true,
            Version::Http10 => keep_alive,
        }
    }
}

/// HTTP 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP 版本（与请求一致）
    pub version: Version,
    /// 状态码
    pub status: StatusCode,
    /// 内容类型
    pub content_type: Option<&'static str>,
    /// 响应体
    pub body: String,
    /// 写完后是否保持连接
    pub keep_alive: bool,
}

impl HttpResponse {
    /// 由处理器的响应内容构建
    pub fn from_reply(reply: Reply, version: Version, keep_alive: bool) -> Self {
        Self {
            version,
            status: reply.status,
            content_type: reply.content_type,
            body: reply.body,
            keep_alive,
        }
    }

    /// 空的 400 响应
    pub fn bad_request(version: Version, keep_alive: bool) -> Self {
        Self::from_reply(Reply::bad_request(), version, keep_alive)
    }

    /// 写入线路格式
    ///
    /// 总是带 `Content-Length`，使空响应体在长连接上也能正确分帧。
    pub fn write_to(&self, dst: &mut BytesMut) {
        let reason = self.status.reason();
        dst.reserve(128 + self.body.len());

        dst.put_slice(self.version.as_str().as_bytes());
        dst.put_slice(format!(" {} {}\r\n", self.status.as_u16(), reason).as_bytes());
        if let Some(content_type) = self.content_type {
            dst.put_slice(b"Content-Type: ");
            dst.put_slice(content_type.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        match (self.version, self.keep_alive) {
            (_, false) => dst.put_slice(b"Connection: close\r\n"),
            (Version::Http10, true) => dst.put_slice(b"Connection: keep-alive\r\n"),
            (Version::Http11, true) => {}
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(self.body.as_bytes());
    }
}
