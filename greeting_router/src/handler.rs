//! 请求处理能力
//!
//! 处理器是纯函数：输入已解析的请求上下文，输出响应内容或“请求畸形”。

use crate::context::Context;
use std::fmt;

/// 纯文本响应的内容类型
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// HTTP 状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// 数字状态码
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// 标准原因短语
    pub fn reason(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

/// 处理器产生的响应内容
///
/// 与传输无关：HTTP 版本、Content-Length 与连接头由网络层补齐。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// 状态码
    pub status: StatusCode,
    /// 内容类型
    pub content_type: Option<&'static str>,
    /// 响应体
    pub body: String,
}

impl Reply {
    /// 200 纯文本响应
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: Some(TEXT_PLAIN_UTF8),
            body: body.into(),
        }
    }

    /// 400 空响应
    pub fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            content_type: None,
            body: String::new(),
        }
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status.as_u16())
    }
}

/// 处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// 正常响应
    Reply(Reply),
    /// 请求畸形，由路由器转换为 400
    Malformed,
}

/// 请求处理器
///
/// 实现不得保存任何连接相关的状态；同一个处理器会被所有 worker 线程并发调用。
pub trait RequestHandler: Send + Sync + 'static {
    /// 处理一个请求
    fn handle(&self, ctx: &Context) -> HandlerOutcome;
}

impl<F> RequestHandler for F
where
    F: Fn(&Context) -> HandlerOutcome + Send + Sync + 'static,
{
    fn handle(&self, ctx: &Context) -> HandlerOutcome {
        self(ctx)
    }
}

/// 问候处理器
///
/// 返回 `"Hello " + name`，缺少 `name` 参数时使用空字符串。
#[derive(Debug, Clone, Copy, Default)]
pub struct GreetingHandler;

impl GreetingHandler {
    /// 组装问候语
    pub fn greeting(name: &str) -> String {
        format!("Hello {}", name)
    }
}

impl RequestHandler for GreetingHandler {
    fn handle(&self, ctx: &Context) -> HandlerOutcome {
        let name = ctx.param("name").unwrap_or_default();
        HandlerOutcome::Reply(Reply::text(Self::greeting(&name)))
    }
}
