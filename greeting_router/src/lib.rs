//! Greeting 请求处理能力
//!
//! 提供路由器、请求上下文、查询串解析和问候处理器。

pub mod context;
pub mod handler;
pub mod query;
pub mod router;

pub use crate::context::{Context, Method};
pub use crate::handler::{GreetingHandler, HandlerOutcome, Reply, RequestHandler, StatusCode};
pub use crate::router::{GREETING_PATH, Router};

// 重新导出错误类型
pub use greeting_core::{GreetingError, Result};

// 预导出
pub mod prelude {
    pub use crate::context::{Context, Method};
    pub use crate::handler::{HandlerOutcome, Reply, RequestHandler};
    pub use crate::router::Router;
    pub use greeting_core::{GreetingError, Result};
}
